//! Conversion orchestration: open, build, write

use crate::builder::{build_combined, build_per_group, BuildOutcome};
use crate::error::{ConvertError, Result};
use crate::export::{compute_output_path, CsvWriter, SpreadsheetWriter, XlsxWriter};
use crate::parser::{read_csv_table, MdfContainer};
use crate::types::Table;
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

/// Message of the placeholder sheet written for containers without data
pub const NO_DATA_MESSAGE: &str = "No data found in the MDF file.";

/// Share of the progress bar spent reading groups
const BUILD_PROGRESS_START: f32 = 0.1;
const BUILD_PROGRESS_END: f32 = 0.8;

/// Stage of a single conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionState {
    #[default]
    Idle,
    Opening,
    Building,
    Writing,
    Done,
    Failed,
}

impl ConversionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionState::Done | ConversionState::Failed)
    }
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConversionState::Idle => "Idle",
            ConversionState::Opening => "Opening",
            ConversionState::Building => "Building tables",
            ConversionState::Writing => "Writing",
            ConversionState::Done => "Done",
            ConversionState::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// How channel groups map to sheets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SheetLayout {
    /// One `All_Channels` sheet aligned on a shared time axis
    #[default]
    Combined,
    /// One `Channel Group {i}` sheet per group
    PerGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Csv,
}

impl OutputFormat {
    pub fn writer(&self) -> Box<dyn SpreadsheetWriter> {
        match self {
            OutputFormat::Xlsx => Box::new(XlsxWriter),
            OutputFormat::Csv => Box::new(CsvWriter),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.writer().extension()
    }
}

/// Options for a conversion
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Output directory, the input's own directory when `None`
    pub output_dir: Option<PathBuf>,
    pub layout: SheetLayout,
    pub format: OutputFormat,
}

impl ConvertOptions {
    pub fn output_path(&self, input: &Path) -> PathBuf {
        compute_output_path(input, self.output_dir.as_deref(), self.format.extension())
    }
}

/// Result of a finished conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Sheet names in output order
    pub sheets: Vec<String>,
    /// Data rows written, summed over sheets
    pub rows: usize,
    /// Set when the output only holds an informational placeholder
    pub placeholder: Option<String>,
}

impl ConversionReport {
    pub fn status_message(&self) -> String {
        format!(
            "Successfully converted {} to {}",
            self.input.display(),
            self.output.display()
        )
    }
}

type ProgressFn<'a> = Box<dyn FnMut(ConversionState, f32) + 'a>;

/// Runs one conversion at a time through its states
///
/// The progress callback receives every state change and a completion
/// fraction between 0 and 1.
pub struct Converter<'a> {
    options: ConvertOptions,
    state: ConversionState,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Converter<'a> {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            state: ConversionState::Idle,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: impl FnMut(ConversionState, f32) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    fn report(&mut self, state: ConversionState, fraction: f32) {
        if state != self.state {
            info!("{}", state);
        }
        self.state = state;
        if let Some(progress) = self.progress.as_mut() {
            progress(state, fraction.clamp(0.0, 1.0));
        }
    }

    fn fail(&mut self, err: ConvertError) -> ConvertError {
        warn!("Conversion failed: {}", err);
        self.report(ConversionState::Failed, 1.0);
        err
    }

    /// Convert an MDF file to the configured output format
    ///
    /// Opening errors abort the conversion. Errors while reading samples
    /// still produce an output file holding the error message.
    pub fn convert_mdf(&mut self, input: &Path) -> Result<ConversionReport> {
        self.report(ConversionState::Opening, 0.0);
        let mut container = match MdfContainer::open(input) {
            Ok(container) => container,
            Err(e) => return Err(self.fail(e)),
        };

        let mut layout = self.options.layout;
        if layout == SheetLayout::PerGroup && self.options.format == OutputFormat::Csv {
            warn!("CSV output holds a single table, using the combined layout");
            layout = SheetLayout::Combined;
        }

        self.report(ConversionState::Building, BUILD_PROGRESS_START);
        let outcome = {
            let mut on_group = |done: usize, total: usize| {
                let share = done as f32 / total.max(1) as f32;
                let fraction =
                    BUILD_PROGRESS_START + (BUILD_PROGRESS_END - BUILD_PROGRESS_START) * share;
                self.report(ConversionState::Building, fraction);
            };
            match layout {
                SheetLayout::Combined => build_combined(&mut container, &mut on_group)
                    .map(|table| vec![(table.name.clone(), table)]),
                SheetLayout::PerGroup => build_per_group(&mut container, &mut on_group)
                    .map(|tables| {
                        tables
                            .into_values()
                            .map(|table| (table.name.clone(), table))
                            .collect::<Vec<_>>()
                    }),
            }
        };
        container.close();

        let (sheets, placeholder) = match outcome {
            BuildOutcome::Built(sheets) => (sheets, None),
            BuildOutcome::Empty => {
                info!("{}", NO_DATA_MESSAGE);
                placeholder_sheets(NO_DATA_MESSAGE.to_string())
            }
            BuildOutcome::Failed(message) => placeholder_sheets(format!("Error: {message}")),
        };

        self.write(input, sheets, placeholder)
    }

    /// Convert a CSV file to the configured output format, as one sheet
    pub fn convert_csv(&mut self, input: &Path) -> Result<ConversionReport> {
        self.report(ConversionState::Opening, 0.0);
        let table = match read_csv_table(input) {
            Ok(table) => table,
            Err(e) => return Err(self.fail(e)),
        };
        self.report(ConversionState::Building, BUILD_PROGRESS_END);
        let sheets = vec![(table.name.clone(), table)];
        self.write(input, sheets, None)
    }

    fn write(
        &mut self,
        input: &Path,
        sheets: Vec<(String, Table)>,
        placeholder: Option<String>,
    ) -> Result<ConversionReport> {
        self.report(ConversionState::Writing, BUILD_PROGRESS_END);
        let output = self.options.output_path(input);
        let writer = self.options.format.writer();
        if let Err(e) = writer.write(&output, &sheets) {
            return Err(self.fail(e));
        }

        let report = ConversionReport {
            input: input.to_path_buf(),
            output,
            sheets: sheets.iter().map(|(name, _)| name.clone()).collect(),
            rows: sheets.iter().map(|(_, table)| table.row_count()).sum(),
            placeholder,
        };
        self.report(ConversionState::Done, 1.0);
        info!("{}", report.status_message());
        Ok(report)
    }
}

fn placeholder_sheets(message: String) -> (Vec<(String, Table)>, Option<String>) {
    let table = Table::placeholder(message.clone());
    (vec![(table.name.clone(), table)], Some(message))
}
