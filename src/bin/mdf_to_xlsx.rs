//! Convert an MDF measurement file to an XLSX workbook

use anyhow::Result;
use mdf_convert::cli::{parse_args, print_outcome, CliFlags};
use mdf_convert::{ConvertOptions, Converter, SheetLayout};

fn main() -> Result<()> {
    let args = parse_args(
        "mdf_to_xlsx",
        "mdf_file_path",
        "Convert an MDF 3.x/4.x file to XLSX (same name, .xlsx extension)",
        CliFlags {
            output_dir: true,
            per_group: true,
            json: false,
        },
    );

    let options = ConvertOptions {
        output_dir: args.output_dir,
        layout: if args.per_group {
            SheetLayout::PerGroup
        } else {
            SheetLayout::Combined
        },
        ..Default::default()
    };
    print_outcome("MDF", Converter::new(options).convert_mdf(&args.input));
    Ok(())
}
