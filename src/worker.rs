//! Background conversion on a dedicated thread
//!
//! At most one conversion runs per [`ConversionWorker`]. The worker thread
//! is the only writer of the shared progress and status; the owner polls
//! them and collects the result once the thread has finished.

use crate::error::Result;
use crate::pipeline::{ConversionReport, ConversionState, ConvertOptions, Converter};
use log::{error, info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Outcome handed back to the owner, errors already rendered as text
pub type WorkerResult = std::result::Result<ConversionReport, String>;

const FAILED_STATUS: &str = "Conversion failed.";

/// What the worker converts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mdf,
    Csv,
}

#[derive(Debug, Default)]
struct Shared {
    /// Completion in per-mille
    progress: AtomicU32,
    status: Mutex<String>,
    busy: AtomicBool,
}

#[derive(Debug, Default)]
pub struct ConversionWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<WorkerResult>>,
}

impl ConversionWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start converting `input`; returns false while another conversion runs
    pub fn start(&mut self, input: PathBuf, kind: SourceKind, options: ConvertOptions) -> bool {
        self.spawn(options, move |converter| {
            info!("Worker converting {}", input.display());
            let result = match kind {
                SourceKind::Mdf => converter.convert_mdf(&input),
                SourceKind::Csv => converter.convert_csv(&input),
            };
            if let Err(e) = &result {
                error!("Conversion of {} failed: {}", input.display(), e);
            }
            result
        })
    }

    fn spawn<F>(&mut self, options: ConvertOptions, job: F) -> bool
    where
        F: FnOnce(&mut Converter<'static>) -> Result<ConversionReport> + Send + 'static,
    {
        if self.handle.is_some() || self.shared.busy.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shared.progress.store(0, Ordering::SeqCst);
        set_status(&self.shared, ConversionState::Idle.to_string());

        let shared = Arc::clone(&self.shared);
        self.handle = Some(std::thread::spawn(move || {
            // released on return and on unwind
            let _busy = BusyGuard(Arc::clone(&shared));
            let progress_shared = Arc::clone(&shared);
            let mut converter = Converter::new(options).with_progress(move |state, fraction| {
                progress_shared
                    .progress
                    .store((fraction * 1000.0).round() as u32, Ordering::SeqCst);
                set_status(&progress_shared, format!("{state}..."));
            });

            match job(&mut converter) {
                Ok(report) => {
                    set_status(&shared, report.status_message());
                    Ok(report)
                }
                Err(e) => {
                    set_status(&shared, FAILED_STATUS.to_string());
                    Err(e.to_string())
                }
            }
        }));
        true
    }

    /// True from `start` until the result has been collected by `poll`
    pub fn is_busy(&self) -> bool {
        self.handle.is_some()
    }

    /// Completion between 0 and 1
    pub fn progress(&self) -> f32 {
        self.shared.progress.load(Ordering::SeqCst) as f32 / 1000.0
    }

    pub fn status(&self) -> String {
        self.shared
            .status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// Collect the result when the thread has finished, without blocking
    pub fn poll(&mut self) -> Option<WorkerResult> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        self.wait()
    }

    /// Block until the running conversion finishes
    pub fn wait(&mut self) -> Option<WorkerResult> {
        let handle = self.handle.take()?;
        Some(handle.join().unwrap_or_else(|_| {
            error!("Conversion worker panicked");
            set_status(&self.shared, FAILED_STATUS.to_string());
            Err("conversion worker panicked".to_string())
        }))
    }
}

/// Clears the busy flag when the worker thread ends, panics included
struct BusyGuard(Arc<Shared>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.progress.store(1000, Ordering::SeqCst);
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

fn set_status(shared: &Shared, text: String) {
    if let Ok(mut status) = shared.status.lock() {
        *status = text;
    }
}
