//! Convert a CSV file to an XLSX workbook with one sheet

use anyhow::Result;
use mdf_convert::cli::{parse_args, print_outcome, CliFlags};
use mdf_convert::{ConvertOptions, Converter};

fn main() -> Result<()> {
    let args = parse_args(
        "csv_to_xlsx",
        "csv_file_path",
        "Convert a CSV file to XLSX (same name, .xlsx extension)",
        CliFlags {
            output_dir: true,
            ..Default::default()
        },
    );

    let options = ConvertOptions {
        output_dir: args.output_dir,
        ..Default::default()
    };
    print_outcome("CSV", Converter::new(options).convert_csv(&args.input));
    Ok(())
}
