use std::path::{Path, PathBuf};

use crate::pipeline::{ConvertOptions, SheetLayout};
use crate::worker::WorkerResult;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Modal message shown after a conversion finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

/// The full UI state, independent of rendering.
#[derive(Debug)]
pub struct AppState {
    /// Selected measurement file.
    pub input: Option<PathBuf>,

    /// Output folder, the input's folder when `None`.
    pub output_dir: Option<PathBuf>,

    /// One sheet per channel group instead of the combined sheet.
    pub per_group: bool,

    /// Status line under the progress bar.
    pub status: String,

    pub show_about: bool,

    pub dialog: Option<Dialog>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: None,
            per_group: true,
            status: "Select an MDF file to convert.".to_string(),
            show_about: false,
            dialog: None,
        }
    }
}

impl AppState {
    /// Folder the file picker opens in: ~/Downloads when it exists.
    pub fn default_directory() -> Option<PathBuf> {
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
        let downloads = Path::new(&home).join("Downloads");
        downloads.is_dir().then_some(downloads)
    }

    pub fn set_input(&mut self, path: PathBuf) {
        self.status = format!("Selected {}", path.display());
        self.input = Some(path);
    }

    pub fn can_convert(&self, busy: bool) -> bool {
        self.input.is_some() && !busy
    }

    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            output_dir: self.output_dir.clone(),
            layout: if self.per_group {
                SheetLayout::PerGroup
            } else {
                SheetLayout::Combined
            },
            ..ConvertOptions::default()
        }
    }

    /// Turn a finished conversion into the status line and a dialog.
    pub fn finish(&mut self, result: WorkerResult) {
        self.dialog = Some(match result {
            Ok(report) => {
                let mut message = report.status_message();
                if let Some(note) = &report.placeholder {
                    message.push_str(&format!("\n\nThe workbook only holds a message: {note}"));
                }
                self.status = "Conversion complete.".to_string();
                Dialog {
                    title: "Success".to_string(),
                    message,
                    is_error: false,
                }
            }
            Err(e) => {
                self.status = "Conversion failed.".to_string();
                Dialog {
                    title: "Error".to_string(),
                    message: format!("Error converting MDF file: {e}"),
                    is_error: true,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ConversionReport;

    #[test]
    fn test_defaults_to_per_group() {
        let state = AppState::default();
        assert!(state.per_group);
        assert_eq!(state.options().layout, SheetLayout::PerGroup);
        assert!(!state.can_convert(false));
    }

    #[test]
    fn test_busy_blocks_convert() {
        let mut state = AppState::default();
        state.set_input(PathBuf::from("trip.mf4"));
        assert!(state.can_convert(false));
        assert!(!state.can_convert(true));
    }

    #[test]
    fn test_finish_success_and_error() {
        let mut state = AppState::default();
        state.finish(Ok(ConversionReport {
            input: PathBuf::from("a.mf4"),
            output: PathBuf::from("a.xlsx"),
            sheets: vec!["All_Channels".to_string()],
            rows: 10,
            placeholder: None,
        }));
        let dialog = state.dialog.take().unwrap();
        assert!(!dialog.is_error);
        assert_eq!(dialog.message, "Successfully converted a.mf4 to a.xlsx");

        state.finish(Err("bad magic".to_string()));
        let dialog = state.dialog.unwrap();
        assert!(dialog.is_error);
        assert_eq!(dialog.message, "Error converting MDF file: bad magic");
    }
}
