//! CLI Integration Tests
//!
//! Runs the converter binaries with assert_cmd against files generated in a
//! temp directory.

#![cfg(feature = "cli")]
#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use mdf_convert::synth::{sample_measurement, MdfVersion};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn sample_file(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    sample_measurement(MdfVersion::V4, 1).write(&path).unwrap();
    path
}

#[test]
fn test_usage_without_input() {
    Command::cargo_bin("mdf_to_xlsx")
        .unwrap()
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage: mdf_to_xlsx <mdf_file_path>"));
}

#[test]
fn test_usage_with_two_inputs() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.csv");
    fs::write(&first, "x\n1\n").unwrap();

    Command::cargo_bin("csv_to_xlsx")
        .unwrap()
        .arg(&first)
        .arg(dir.path().join("b.csv"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage: csv_to_xlsx <csv_file_path>"));
    assert!(!dir.path().join("a.xlsx").exists());
}

#[test]
fn test_mdf_to_xlsx_success() {
    let dir = TempDir::new().unwrap();
    let input = sample_file(&dir, "trip_001.mf4");

    Command::cargo_bin("mdf_to_xlsx")
        .unwrap()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully converted"))
        .stdout(predicate::str::contains("trip_001.xlsx"));
    assert!(dir.path().join("trip_001.xlsx").exists());
}

#[test]
fn test_mdf_to_xlsx_per_group_into_output_dir() {
    let dir = TempDir::new().unwrap();
    let input = sample_file(&dir, "trip.mf4");
    let out = dir.path().join("out");

    Command::cargo_bin("mdf_to_xlsx")
        .unwrap()
        .arg("--per-group")
        .arg("--output-dir")
        .arg(&out)
        .arg(&input)
        .assert()
        .success();
    assert!(out.join("trip.xlsx").exists());
}

#[test]
fn test_missing_input_reports_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("missing.mf4");

    Command::cargo_bin("mdf_to_xlsx")
        .unwrap()
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("Error converting MDF file:"));
    assert!(!dir.path().join("missing.xlsx").exists());
}

#[test]
fn test_mdf_to_csv() {
    let dir = TempDir::new().unwrap();
    let input = sample_file(&dir, "trip.mf4");

    Command::cargo_bin("mdf_to_csv")
        .unwrap()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("trip.csv"));

    let text = fs::read_to_string(dir.path().join("trip.csv")).unwrap();
    assert!(text.starts_with("timestamps,EngineSpeed [rpm]"));
}

#[test]
fn test_csv_to_xlsx_bad_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ragged.csv");
    fs::write(&input, "a,b\n1,2,3\n").unwrap();

    Command::cargo_bin("csv_to_xlsx")
        .unwrap()
        .arg(&input)
        .assert()
        .stderr(predicate::str::contains("Error converting CSV file:"));
    assert!(!dir.path().join("ragged.xlsx").exists());
}

#[test]
fn test_inspect_mdf() {
    let dir = TempDir::new().unwrap();
    let input = sample_file(&dir, "trip.mf4");

    Command::cargo_bin("inspect_mdf")
        .unwrap()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("MDF version: 4.10"))
        .stdout(predicate::str::contains("VehicleSpeed [km/h]"));
}

#[test]
fn test_generate_sample_mdf3() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("demo.mdf");

    Command::cargo_bin("generate_sample")
        .unwrap()
        .arg("--mdf3")
        .arg("--seconds")
        .arg("2")
        .arg(&output)
        .assert()
        .success();

    Command::cargo_bin("inspect_mdf")
        .unwrap()
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("MDF version: 3.30"));
}

#[test]
fn test_unknown_flag_prints_usage() {
    Command::cargo_bin("mdf_to_xlsx")
        .unwrap()
        .arg("--bogus")
        .arg("trip.mf4")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Usage: mdf_to_xlsx <mdf_file_path>"));
}

#[test]
fn test_output_dir_is_a_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("trip.csv");
    fs::write(&input, "a\n1\n").unwrap();
    let blocker = dir.path().join("out");
    fs::write(&blocker, "not a directory").unwrap();

    Command::cargo_bin("csv_to_xlsx")
        .unwrap()
        .arg("--output-dir")
        .arg(&blocker)
        .arg(&input)
        .assert()
        .stderr(predicate::str::contains("Error converting CSV file:"));
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
}
