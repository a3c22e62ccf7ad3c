use std::time::Duration;

use eframe::egui;

use crate::gui::panels;
use crate::gui::state::AppState;
use crate::worker::ConversionWorker;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MdfConverterApp {
    pub state: AppState,
    pub worker: ConversionWorker,
}

impl eframe::App for MdfConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(result) = self.worker.poll() {
            self.state.finish(result);
        }
        if self.worker.is_busy() {
            self.state.status = self.worker.status();
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::menu_bar(ui, &mut self.state);
        });

        // ---- Central panel: converter ----
        egui::CentralPanel::default().show(ctx, |ui| {
            panels::converter_panel(ui, &mut self.state, &mut self.worker);
        });

        panels::about_window(ctx, &mut self.state);
        panels::result_dialog(ctx, &mut self.state);
    }
}
