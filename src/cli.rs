//! Command-line plumbing shared by the converter binaries

use crate::error::{ConvertError, Result};
use crate::pipeline::ConversionReport;
use crate::version;
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::debug;
use std::path::PathBuf;

/// Start logging; `--debug` raises the level, `RUST_LOG` applies otherwise
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    let _ = builder.format_timestamp(None).try_init();
}

/// Arguments of a converter binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub input: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub per_group: bool,
    pub debug: bool,
    pub json: bool,
}

/// Flags a binary accepts on top of the input file
#[derive(Debug, Clone, Copy, Default)]
pub struct CliFlags {
    pub output_dir: bool,
    pub per_group: bool,
    pub json: bool,
}

/// Literal usage line printed on a wrong argument count
pub fn usage(bin: &str, placeholder: &str) -> String {
    format!("Usage: {bin} <{placeholder}>")
}

fn command(bin: &'static str, about: &'static str, flags: CliFlags) -> Command {
    let mut command = Command::new(bin)
        .version(version())
        .about(about)
        .arg(
            Arg::new("file")
                .help("Input file")
                .num_args(0..)
                .index(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug output and detailed parsing information")
                .action(ArgAction::SetTrue),
        );
    if flags.output_dir {
        command = command.arg(
            Arg::new("output-dir")
                .long("output-dir")
                .help("Directory for output files (default: same as input file)")
                .value_name("DIR"),
        );
    }
    if flags.per_group {
        command = command.arg(
            Arg::new("per-group")
                .long("per-group")
                .help("Write one sheet per channel group instead of a combined sheet")
                .action(ArgAction::SetTrue),
        );
    }
    if flags.json {
        command = command.arg(
            Arg::new("json")
                .long("json")
                .help("Print the summary as JSON")
                .action(ArgAction::SetTrue),
        );
    }
    command
}

fn args_from_matches(matches: &ArgMatches, flags: CliFlags) -> Option<CliArgs> {
    let files: Vec<&String> = matches
        .get_many::<String>("file")
        .map(|values| values.collect())
        .unwrap_or_default();
    let [input] = files.as_slice() else {
        return None;
    };
    Some(CliArgs {
        input: PathBuf::from(input.as_str()),
        output_dir: flags
            .output_dir
            .then(|| matches.get_one::<String>("output-dir").map(PathBuf::from))
            .flatten(),
        per_group: flags.per_group && matches.get_flag("per-group"),
        debug: matches.get_flag("debug"),
        json: flags.json && matches.get_flag("json"),
    })
}

/// Parse `args` without exiting
///
/// A wrong input count, like any clap error, is a `Usage` error.
pub fn try_parse_from<I, T>(
    bin: &'static str,
    placeholder: &str,
    about: &'static str,
    flags: CliFlags,
    args: I,
) -> Result<CliArgs>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = command(bin, about, flags)
        .try_get_matches_from(args)
        .map_err(|e| usage_error(bin, placeholder, &e))?;
    args_from_matches(&matches, flags).ok_or_else(|| ConvertError::Usage(usage(bin, placeholder)))
}

/// Help and version output pass through; every other clap error becomes
/// the usage line
fn usage_error(bin: &str, placeholder: &str, err: &clap::Error) -> ConvertError {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ConvertError::Usage(err.to_string()),
        _ => ConvertError::Usage(usage(bin, placeholder)),
    }
}

/// Parse the process arguments
///
/// Prints the usage line and exits with code 1 unless exactly one input
/// file is given. `--help` and `--version` exit as usual.
pub fn parse_args(bin: &'static str, placeholder: &str, about: &'static str, flags: CliFlags) -> CliArgs {
    let matches = match command(bin, about, flags).try_get_matches() {
        Ok(matches) => matches,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            debug!("Argument error: {e}");
            println!("{}", usage(bin, placeholder));
            std::process::exit(1);
        }
    };
    match args_from_matches(&matches, flags).ok_or_else(|| ConvertError::Usage(usage(bin, placeholder))) {
        Ok(args) => {
            init_logging(args.debug);
            args
        }
        Err(e) => {
            println!("{e}");
            std::process::exit(1);
        }
    }
}

/// Print the success line or the error line of a conversion
pub fn print_outcome(kind: &str, result: Result<ConversionReport>) {
    match result {
        Ok(report) => {
            println!("{}", report.status_message());
            if let Some(note) = &report.placeholder {
                println!("Note: the output only holds a message: {note}");
            }
        }
        Err(e) => eprintln!("Error converting {kind} file: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: CliFlags = CliFlags {
        output_dir: true,
        per_group: true,
        json: true,
    };

    #[test]
    fn test_single_input() {
        let args = try_parse_from("mdf_to_xlsx", "f", "", ALL, ["mdf_to_xlsx", "trip.mf4"]).unwrap();
        assert_eq!(args.input, PathBuf::from("trip.mf4"));
        assert_eq!(args.output_dir, None);
        assert!(!args.per_group);
    }

    #[test]
    fn test_flags() {
        let args = try_parse_from(
            "mdf_to_xlsx",
            "f",
            "",
            ALL,
            ["mdf_to_xlsx", "--per-group", "--output-dir", "out", "trip.mf4", "--debug"],
        )
        .unwrap();
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert!(args.per_group);
        assert!(args.debug);
    }

    #[test]
    fn test_wrong_input_count() {
        for args in [vec!["x"], vec!["x", "a", "b"]] {
            match try_parse_from("x", "file_path", "", CliFlags::default(), args) {
                Err(ConvertError::Usage(line)) => assert_eq!(line, "Usage: x <file_path>"),
                other => panic!("expected usage error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_flag_not_offered_is_rejected() {
        let result = try_parse_from("x", "f", "", CliFlags::default(), ["x", "--per-group", "a"]);
        match result {
            Err(ConvertError::Usage(line)) => assert_eq!(line, "Usage: x <f>"),
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_flag_prints_usage_line() {
        let result = try_parse_from("x", "f", "", ALL, ["x", "--bogus", "a"]);
        match result {
            Err(ConvertError::Usage(line)) => assert_eq!(line, "Usage: x <f>"),
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn test_help_is_not_the_usage_line() {
        match try_parse_from("x", "f", "", ALL, ["x", "--help"]) {
            Err(ConvertError::Usage(text)) => assert!(text.contains("--per-group")),
            other => panic!("expected help text, got {other:?}"),
        }
    }

    #[test]
    fn test_usage_line() {
        assert_eq!(
            usage("csv_to_xlsx", "csv_file_path"),
            "Usage: csv_to_xlsx <csv_file_path>"
        );
    }
}
