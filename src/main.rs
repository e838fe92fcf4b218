mod app;

use std::path::PathBuf;

use eframe::egui;
use log::warn;

use eye_annotate::settings::Settings;

use crate::app::{EyeAnnotateApp, TITLE};

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let images: Vec<PathBuf> = std::env::args_os()
        .skip(1)
        .map(PathBuf::from)
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!("file not found: {}", path.display());
            }
            exists
        })
        .collect();

    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path).unwrap_or_else(|err| {
        warn!("ignoring unreadable settings {}: {err}", settings_path.display());
        Settings::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(TITLE),
        ..Default::default()
    };

    eframe::run_native(
        TITLE,
        options,
        Box::new(move |cc| Ok(Box::new(EyeAnnotateApp::new(cc, images, settings, settings_path)))),
    )
    .map_err(|err| anyhow::anyhow!("failed to run eframe: {err}"))
}
