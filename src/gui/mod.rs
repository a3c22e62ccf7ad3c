//! Desktop front-end for MDF conversion
//!
//! The conversion runs on a [`ConversionWorker`](crate::worker::ConversionWorker)
//! thread; the UI polls its progress every frame.

pub mod app;
pub mod panels;
pub mod state;

pub use app::MdfConverterApp;
pub use state::AppState;
