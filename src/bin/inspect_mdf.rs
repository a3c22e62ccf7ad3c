//! Print the structure of an MDF measurement file

use anyhow::Result;
use mdf_convert::cli::{parse_args, CliFlags};
use mdf_convert::{ContainerSummary, MdfContainer};

fn main() -> Result<()> {
    let args = parse_args(
        "inspect_mdf",
        "mdf_file_path",
        "Print a summary of an MDF file: version, groups and channels",
        CliFlags {
            json: cfg!(feature = "json"),
            ..Default::default()
        },
    );

    let summary = match MdfContainer::open(&args.input) {
        Ok(container) => ContainerSummary::from_container(&container),
        Err(e) => {
            eprintln!("Error reading MDF file: {e}");
            return Ok(());
        }
    };

    #[cfg(feature = "json")]
    if args.json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    print!("{}", summary.render());
    Ok(())
}
