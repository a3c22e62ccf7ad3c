//! Integration tests for file conversion
//!
//! Measurement files are generated with the synthetic writer into a temp
//! directory, converted, and read back with calamine:
//! - Combined layout on a shared time axis
//! - Per-group layout with one sheet per channel group
//! - Placeholder workbooks for empty files and unreadable samples
//! - CSV input and CSV output
//! - Overwriting an existing output
//! - Corrupt inputs and unwritable output locations

use calamine::{open_workbook, Data, Reader, Xlsx};
use mdf_convert::synth::{sample_measurement, MdfVersion, MdfWriter, SynthChannel, SynthGroup};
use mdf_convert::{
    ConversionState, ConvertError, ConvertOptions, Converter, OutputFormat, SheetLayout,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_sample(dir: &TempDir, name: &str, version: MdfVersion) -> PathBuf {
    let path = dir.path().join(name);
    sample_measurement(version, 1)
        .write(&path)
        .expect("Failed to write sample measurement");
    path
}

fn sheet_names(path: &Path) -> Vec<String> {
    let workbook: Xlsx<_> = open_workbook(path).expect("Failed to open workbook");
    workbook.sheet_names().to_vec()
}

fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<Data>> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("Failed to open workbook");
    let range = workbook
        .worksheet_range(sheet)
        .expect("Sheet should exist");
    range.rows().map(|row| row.to_vec()).collect()
}

fn header(rows: &[Vec<Data>]) -> Vec<String> {
    rows[0].iter().map(|cell| cell.to_string()).collect()
}

#[test]
fn test_combined_layout_single_sheet() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "trip_001.mf4", MdfVersion::V4);

    let report = Converter::new(ConvertOptions::default())
        .convert_mdf(&input)
        .expect("Conversion should succeed");

    assert_eq!(report.output, dir.path().join("trip_001.xlsx"));
    assert_eq!(report.sheets, vec!["All_Channels".to_string()]);
    assert!(report.placeholder.is_none());
    assert_eq!(sheet_names(&report.output), vec!["All_Channels".to_string()]);

    let rows = read_sheet(&report.output, "All_Channels");
    assert_eq!(
        header(&rows),
        vec![
            "timestamps",
            "EngineSpeed [rpm]",
            "ThrottlePosition [%]",
            "VehicleSpeed [km/h]",
            "AmbientTemperature [degC]",
        ]
    );
    // 100 Hz engine samples cover every 10 Hz and 1 Hz timestamp
    assert_eq!(rows.len(), 101);
    assert_eq!(report.rows, 100);

    // the ambient group has one sample at t=0 and is held for the whole second
    let last = &rows[100];
    assert_eq!(last[0], Data::Float(0.99));
    assert_eq!(last[4], Data::Float(21.5));
    // vehicle speed at t=0.95 is the 0.9 s sample
    let at_095 = &rows[96];
    assert_eq!(at_095[0], Data::Float(0.95));
    assert_eq!(at_095[3], Data::Float(50.0 + 2.5 * 0.9));
}

#[test]
fn test_combined_layout_is_deterministic() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "trip.mf4", MdfVersion::V4);
    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");

    let mut outputs = Vec::new();
    for out in [&first_dir, &second_dir] {
        let options = ConvertOptions {
            output_dir: Some(out.clone()),
            ..Default::default()
        };
        let report = Converter::new(options).convert_mdf(&input).unwrap();
        outputs.push(read_sheet(&report.output, "All_Channels"));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_per_group_layout_mdf3() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "bench.mdf", MdfVersion::V3);

    let options = ConvertOptions {
        layout: SheetLayout::PerGroup,
        ..Default::default()
    };
    let report = Converter::new(options).convert_mdf(&input).unwrap();

    let names = sheet_names(&report.output);
    assert_eq!(
        names,
        vec!["Channel Group 0", "Channel Group 1", "Channel Group 2"]
    );

    let engine = read_sheet(&report.output, "Channel Group 0");
    assert_eq!(header(&engine), vec!["time [s]", "EngineSpeed [rpm]", "ThrottlePosition [%]"]);
    assert_eq!(engine.len(), 101);

    let vehicle = read_sheet(&report.output, "Channel Group 1");
    assert_eq!(header(&vehicle), vec!["time [s]", "VehicleSpeed [km/h]"]);
    assert_eq!(vehicle.len(), 11);

    let ambient = read_sheet(&report.output, "Channel Group 2");
    assert_eq!(ambient.len(), 2);
    assert_eq!(ambient[1][1], Data::Float(21.5));
}

#[test]
fn test_empty_measurement_writes_info_sheet() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("empty.mf4");
    MdfWriter::new(MdfVersion::V4).write(&input).unwrap();

    for layout in [SheetLayout::Combined, SheetLayout::PerGroup] {
        let options = ConvertOptions {
            layout,
            ..Default::default()
        };
        let report = Converter::new(options).convert_mdf(&input).unwrap();
        assert_eq!(
            report.placeholder.as_deref(),
            Some("No data found in the MDF file.")
        );

        let rows = read_sheet(&report.output, "Info");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Data::String("Message".to_string()));
        assert_eq!(
            rows[1][0],
            Data::String("No data found in the MDF file.".to_string())
        );
    }
}

#[test]
fn test_unreadable_samples_write_error_sheet() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut bytes = MdfWriter::new(MdfVersion::V4)
        .with_group(SynthGroup::new("broken").with_channel(SynthChannel::master(vec![0.1, 0.2])))
        .to_bytes()
        .unwrap();

    // Declare one-byte record ids; the first byte of the data then names
    // a record id no channel group uses.
    let dg = bytes
        .windows(4)
        .position(|w| w == b"##DG")
        .expect("file holds a data group");
    bytes[dg + 24 + 4 * 8] = 1;
    let input = dir.path().join("broken.mf4");
    fs::write(&input, bytes).unwrap();

    let mut states = Vec::new();
    let report = Converter::new(ConvertOptions::default())
        .with_progress(|state, _| states.push(state))
        .convert_mdf(&input)
        .expect("Build errors still produce an output file");

    let message = report.placeholder.expect("Output is a placeholder");
    assert!(message.starts_with("Error: "), "{message}");
    assert_eq!(states.last(), Some(&ConversionState::Done));

    let rows = read_sheet(&report.output, "Info");
    assert_eq!(rows[1][0], Data::String(message));
}

#[test]
fn test_missing_input_creates_no_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("nothing.mf4");

    let result = Converter::new(ConvertOptions::default()).convert_mdf(&input);
    assert!(matches!(result, Err(ConvertError::FileFormat(_))));
    assert!(!dir.path().join("nothing.xlsx").exists());
}

#[test]
fn test_not_an_mdf_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("notes.mf4");
    fs::write(&input, "just some text that is long enough to hold an id block ...").unwrap();

    let mut converter = Converter::new(ConvertOptions::default());
    assert!(converter.convert_mdf(&input).is_err());
    assert_eq!(converter.state(), ConversionState::Failed);
    assert!(!dir.path().join("notes.xlsx").exists());
}

#[test]
fn test_corrupt_link_count_is_format_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut bytes = sample_measurement(MdfVersion::V4, 1).to_bytes().unwrap();
    let cg = bytes
        .windows(4)
        .position(|w| w == b"##CG")
        .expect("file holds a channel group");
    bytes[cg + 16..cg + 24].copy_from_slice(&(1u64 << 61).to_le_bytes());
    let input = dir.path().join("corrupt.mf4");
    fs::write(&input, bytes).unwrap();

    let mut converter = Converter::new(ConvertOptions::default());
    let result = converter.convert_mdf(&input);
    assert!(matches!(result, Err(ConvertError::FileFormat(_))), "{result:?}");
    assert_eq!(converter.state(), ConversionState::Failed);
    assert!(!dir.path().join("corrupt.xlsx").exists());
}

#[test]
fn test_output_dir_is_a_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "trip.mf4", MdfVersion::V4);
    let blocker = dir.path().join("out");
    fs::write(&blocker, "not a directory").unwrap();

    for format in [OutputFormat::Xlsx, OutputFormat::Csv] {
        let mut converter = Converter::new(ConvertOptions {
            output_dir: Some(blocker.clone()),
            format,
            ..Default::default()
        });
        let result = converter.convert_mdf(&input);
        assert!(matches!(result, Err(ConvertError::Write(_))), "{result:?}");
        assert_eq!(converter.state(), ConversionState::Failed);
    }
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
}

#[test]
fn test_output_dir_below_a_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("trip.csv");
    fs::write(&input, "a\n1\n").unwrap();
    let blocker = dir.path().join("out");
    fs::write(&blocker, "not a directory").unwrap();

    let mut converter = Converter::new(ConvertOptions {
        output_dir: Some(blocker.join("nested")),
        ..Default::default()
    });
    let result = converter.convert_csv(&input);
    assert!(matches!(result, Err(ConvertError::Write(_))), "{result:?}");
    assert_eq!(converter.state(), ConversionState::Failed);
}

#[test]
fn test_overwrite_existing_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "trip.mf4", MdfVersion::V4);
    let output = dir.path().join("trip.xlsx");
    fs::write(&output, "stale").unwrap();

    let first = Converter::new(ConvertOptions::default()).convert_mdf(&input).unwrap();
    let first_rows = read_sheet(&first.output, "All_Channels");
    let second = Converter::new(ConvertOptions::default()).convert_mdf(&input).unwrap();

    assert_eq!(first.output, output);
    assert_eq!(second.output, output);
    assert_eq!(read_sheet(&output, "All_Channels"), first_rows);
}

#[test]
fn test_csv_to_xlsx_trip() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("trip_001.csv");
    fs::write(
        &input,
        "time,speed,gear,driver\n0.0,12.5,1,anna\n0.5,14.0,2,anna\n1.0,,2,\n",
    )
    .unwrap();

    let report = Converter::new(ConvertOptions::default())
        .convert_csv(&input)
        .unwrap();
    assert_eq!(report.output, dir.path().join("trip_001.xlsx"));
    assert_eq!(
        report.status_message(),
        format!(
            "Successfully converted {} to {}",
            input.display(),
            report.output.display()
        )
    );

    let rows = read_sheet(&report.output, "Sheet1");
    assert_eq!(header(&rows), vec!["time", "speed", "gear", "driver"]);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][1], Data::Float(12.5));
    assert_eq!(rows[2][2], Data::Float(2.0));
    assert_eq!(rows[2][3], Data::String("anna".to_string()));
    assert_eq!(rows[3][1], Data::Empty);
}

#[test]
fn test_csv_output_into_new_directory() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "trip.mf4", MdfVersion::V4);
    let out_dir = dir.path().join("nested").join("out");

    let options = ConvertOptions {
        output_dir: Some(out_dir.clone()),
        format: OutputFormat::Csv,
        ..Default::default()
    };
    let report = Converter::new(options).convert_mdf(&input).unwrap();
    assert_eq!(report.output, out_dir.join("trip.csv"));

    let text = fs::read_to_string(&report.output).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("timestamps,EngineSpeed [rpm],ThrottlePosition [%],VehicleSpeed [km/h],AmbientTemperature [degC]")
    );
    assert_eq!(lines.count(), 100);
}

#[test]
fn test_per_group_csv_falls_back_to_combined() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = write_sample(&dir, "trip.mf4", MdfVersion::V3);

    let options = ConvertOptions {
        layout: SheetLayout::PerGroup,
        format: OutputFormat::Csv,
        ..Default::default()
    };
    let report = Converter::new(options).convert_mdf(&input).unwrap();
    assert_eq!(report.sheets, vec!["All_Channels".to_string()]);
}
