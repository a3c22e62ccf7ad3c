use eframe::egui;
use mdf_convert::gui::MdfConverterApp;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 300.0])
            .with_min_inner_size([400.0, 260.0]),
        ..Default::default()
    };

    eframe::run_native(
        "MDF to XLSX Converter",
        options,
        Box::new(|_cc| Ok(Box::new(MdfConverterApp::default()))),
    )
}
