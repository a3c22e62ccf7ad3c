//! MDF Convert Library
//!
//! A Rust library for converting ASAM MDF measurement files (versions 3.x and
//! 4.x) and CSV files into XLSX workbooks or flat CSV tables.
//!
//! # Features
//!
//! - **`cli`** (default): Build the command-line binaries
//! - **`gui`**: Build the desktop converter (`mdf_converter_gui`)
//! - **`json`**: JSON output for `inspect_mdf`
//! - **`serde`**: Enable serialization of the data types
//!
//! # Quick Start
//!
//! Convert a measurement file to a single combined sheet:
//! ```rust,no_run
//! use mdf_convert::{ConvertOptions, Converter};
//! use std::path::Path;
//!
//! let report = Converter::new(ConvertOptions::default())
//!     .convert_mdf(Path::new("trip_001.mf4"))
//!     .unwrap();
//! println!("{}", report.status_message());
//! ```
//!
//! Read channel groups directly:
//! ```rust,no_run
//! use mdf_convert::{build_per_group, BuildOutcome, MdfContainer};
//! use std::path::Path;
//!
//! let mut container = MdfContainer::open(Path::new("trip_001.mf4")).unwrap();
//! if let BuildOutcome::Built(tables) = build_per_group(&mut container, |_, _| {}) {
//!     for (id, table) in &tables {
//!         println!("group {}: {} rows x {} columns", id, table.row_count(), table.column_count());
//!     }
//! }
//! ```
//!
//! # Public API
//!
//! ## Reading
//! - [`MdfContainer`] - Opened measurement file exposing its channel groups
//! - [`read_csv_table`] - Read a CSV file into a [`Table`]
//! - [`ContainerSummary`] - Structure summary used by `inspect_mdf`
//!
//! ## Building tables
//! - [`build_per_group`] - One table per channel group
//! - [`build_combined`] - All channels on a shared time axis
//! - [`BuildOutcome`] - Built tables, empty container, or a failure message
//!
//! ## Writing
//! - [`SpreadsheetWriter`] - Trait implemented by [`XlsxWriter`] and [`CsvWriter`]
//! - [`compute_output_path`] - Helper for consistent path computation
//!
//! ## Orchestration
//! - [`Converter`] - Open, build and write with progress reporting
//! - [`ConvertOptions`] - Output directory, sheet layout and format
//! - [`ConversionReport`] - Result of a conversion with the output path
//! - [`ConversionWorker`] - Runs one conversion at a time on a background thread

// Module declarations
pub mod builder;
#[cfg(feature = "cli")]
pub mod cli;
pub mod conversion;
pub mod error;
pub mod export;
#[cfg(feature = "gui")]
pub mod gui;
pub mod inspect;
pub mod parser;
pub mod pipeline;
pub mod synth;
pub mod types;
pub mod worker;

#[allow(ambiguous_glob_reexports)]
pub use builder::*;
#[allow(ambiguous_glob_reexports)]
pub use conversion::*;
#[allow(ambiguous_glob_reexports)]
pub use error::*;
#[allow(ambiguous_glob_reexports)]
pub use export::*;
pub use inspect::ContainerSummary;
pub use parser::{read_csv_table, Identification, MdfContainer};
#[allow(ambiguous_glob_reexports)]
pub use pipeline::*;
#[allow(ambiguous_glob_reexports)]
pub use types::*;
pub use worker::{ConversionWorker, SourceKind, WorkerResult};

/// Package version with the git revision it was built from
pub fn version() -> &'static str {
    static VERSION: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION.get_or_init(|| {
        format_version(env!("CARGO_PKG_VERSION"), option_env!("VERGEN_GIT_SHA"))
    })
}

/// Emitted by vergen in place of the sha when git is unavailable
const IDEMPOTENT_SHA: &str = "VERGEN_IDEMPOTENT_OUTPUT";

fn format_version(package: &str, sha: Option<&str>) -> String {
    match sha {
        Some(sha) if !sha.is_empty() && sha != IDEMPOTENT_SHA => {
            let short = sha.get(..8).unwrap_or(sha);
            format!("{package} ({short})")
        }
        _ => package.to_string(),
    }
}
