//! Application entry point for the closed-string viewer.
//!
//! This binary sets up logging and eframe/egui and delegates all
//! interactive logic and rendering to [`Viewer`] from the `viewer` module.

mod viewer;

use string_core::SimConfig;
use viewer::Viewer;

/// Reads the optional JSON config named by the first argument.
///
/// A missing argument gives [`SimConfig::default`]. A file that cannot be
/// loaded is logged and replaced by the defaults as well.
fn load_config() -> SimConfig {
    let Some(path) = std::env::args().nth(1) else {
        return SimConfig::default();
    };
    match SimConfig::load(&path) {
        Ok(cfg) => {
            log::info!("loaded config from {path}");
            cfg
        }
        Err(err) => {
            log::error!("failed to load {path}: {err}; using defaults");
            SimConfig::default()
        }
    }
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if eframe fails to create the native window or event loop, or the
///   engine rejects the configuration.
fn main() -> eframe::Result<()> {
    env_logger::init();

    let cfg = load_config();
    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Closed Strings",
        options,
        Box::new(|_cc| Ok(Box::new(Viewer::new(cfg)?))),
    )
}
