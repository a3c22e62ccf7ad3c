//! Write a demo MDF file with three channel groups at 100, 10 and 1 Hz

use anyhow::{Context, Result};
use clap::{Arg, Command};
use mdf_convert::cli::init_logging;
use mdf_convert::synth::{sample_measurement, MdfVersion};
use mdf_convert::version;
use std::path::PathBuf;

fn main() -> Result<()> {
    let matches = Command::new("generate_sample")
        .version(version())
        .about("Write a synthetic MDF measurement for trying the converters")
        .arg(
            Arg::new("output")
                .help("Output file (default: sample.mf4, or sample.mdf with --mdf3)")
                .index(1),
        )
        .arg(
            Arg::new("mdf3")
                .long("mdf3")
                .help("Write MDF 3.30 instead of MDF 4.10")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("seconds")
                .long("seconds")
                .help("Length of the measurement in seconds")
                .value_name("N")
                .value_parser(clap::value_parser!(u32).range(1..=3600))
                .default_value("10"),
        )
        .get_matches();

    init_logging(false);

    let version = if matches.get_flag("mdf3") {
        MdfVersion::V3
    } else {
        MdfVersion::V4
    };
    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| match version {
            MdfVersion::V3 => PathBuf::from("sample.mdf"),
            MdfVersion::V4 => PathBuf::from("sample.mf4"),
        });
    let seconds = matches.get_one::<u32>("seconds").copied().unwrap_or(10);

    let writer = sample_measurement(version, seconds);
    writer
        .write(&output)
        .with_context(|| format!("Failed to write sample file: {output:?}"))?;

    println!(
        "Wrote {} channel groups ({} s) to {}",
        writer.groups.len(),
        seconds,
        output.display()
    );
    Ok(())
}
