use std::path::PathBuf;

use eframe::egui::{self, Button, RichText, Ui};

use crate::gui::state::AppState;
use crate::worker::{ConversionWorker, SourceKind};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the File / Help menu.
pub fn menu_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Exit").clicked() {
                ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                ui.close_menu();
            }
        });
        ui.menu_button("Help", |ui: &mut Ui| {
            if ui.button("About").clicked() {
                state.show_about = true;
                ui.close_menu();
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// File selection, options, convert button and progress.
pub fn converter_panel(ui: &mut Ui, state: &mut AppState, worker: &mut ConversionWorker) {
    let busy = worker.is_busy();

    ui.heading("MDF to XLSX Converter");
    ui.add_space(8.0);

    ui.horizontal(|ui: &mut Ui| {
        if ui.add_enabled(!busy, Button::new("Select MDF File")).clicked() {
            if let Some(path) = pick_input_file() {
                state.set_input(path);
            }
        }
        match &state.input {
            Some(path) => ui.label(path.display().to_string()),
            None => ui.weak("No file selected"),
        };
    });

    ui.horizontal(|ui: &mut Ui| {
        if ui.add_enabled(!busy, Button::new("Output Folder")).clicked() {
            if let Some(dir) = pick_output_dir() {
                state.output_dir = Some(dir);
            }
        }
        match &state.output_dir {
            Some(dir) => ui.label(dir.display().to_string()),
            None => ui.weak("Same folder as the input file"),
        };
    });

    ui.add_enabled(
        !busy,
        egui::Checkbox::new(&mut state.per_group, "One sheet per channel group"),
    );
    ui.add_space(8.0);

    if ui
        .add_enabled(state.can_convert(busy), Button::new("Convert to XLSX"))
        .clicked()
    {
        start_conversion(state, worker);
    }

    ui.add_space(4.0);
    ui.add(egui::ProgressBar::new(worker.progress()).show_percentage());
    ui.label(&state.status);
}

fn start_conversion(state: &mut AppState, worker: &mut ConversionWorker) {
    let Some(input) = state.input.clone() else {
        return;
    };
    if worker.start(input, SourceKind::Mdf, state.options()) {
        state.status = "Starting conversion...".to_string();
    } else {
        log::warn!("Conversion already running");
    }
}

fn pick_input_file() -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new()
        .set_title("Select MDF file")
        .add_filter("MDF files", &["mdf", "mf4", "dat"])
        .add_filter("All files", &["*"]);
    if let Some(dir) = AppState::default_directory() {
        dialog = dialog.set_directory(dir);
    }
    dialog.pick_file()
}

fn pick_output_dir() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select output folder")
        .pick_folder()
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

pub fn about_window(ctx: &egui::Context, state: &mut AppState) {
    let mut open = state.show_about;
    egui::Window::new("About")
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .show(ctx, |ui: &mut Ui| {
            ui.strong(format!("MDF to XLSX Converter {}", crate::version()));
            ui.label("Converts ASAM MDF 3.x and 4.x measurement files to Excel workbooks.");
        });
    state.show_about = open;
}

/// Success or error message of the last conversion; OK dismisses it.
pub fn result_dialog(ctx: &egui::Context, state: &mut AppState) {
    let Some(dialog) = &state.dialog else {
        return;
    };
    let mut dismissed = false;
    egui::Window::new(dialog.title.as_str())
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui: &mut Ui| {
            let mut text = RichText::new(dialog.message.as_str());
            if dialog.is_error {
                text = text.color(ui.visuals().error_fg_color);
            }
            ui.label(text);
            ui.add_space(8.0);
            if ui.button("OK").clicked() {
                dismissed = true;
            }
        });
    if dismissed {
        state.dialog = None;
    }
}
