//! Convert an MDF measurement file to a single CSV table

use anyhow::Result;
use mdf_convert::cli::{parse_args, print_outcome, CliFlags};
use mdf_convert::{ConvertOptions, Converter, OutputFormat};

fn main() -> Result<()> {
    let args = parse_args(
        "mdf_to_csv",
        "mdf_file_path",
        "Convert an MDF 3.x/4.x file to CSV (same name, .csv extension)",
        CliFlags {
            output_dir: true,
            ..Default::default()
        },
    );

    let options = ConvertOptions {
        output_dir: args.output_dir,
        format: OutputFormat::Csv,
        ..Default::default()
    };
    print_outcome("MDF", Converter::new(options).convert_mdf(&args.input));
    Ok(())
}
