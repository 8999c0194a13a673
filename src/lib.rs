//! Session engine for a self-administered vision screening: camera-based distance
//! calibration, a two-eye tumbling-E acuity test, an astigmatism questionnaire and
//! result persistence. Camera capture, the detector and the classifier live behind traits.

pub mod acuity;
pub mod astigmatism;
pub mod db;
pub mod error;
pub mod models;
pub mod results;
pub mod screening;
pub mod settings;
pub mod vision;

pub use acuity::{AcuitySessionEngine, Classifier, SessionState};
pub use db::{Database, ResultStore};
pub use error::EngineError;
pub use screening::ScreeningController;
pub use settings::{EngineSettings, SettingsStore};
pub use vision::VisionSource;

/// Install the global logger. Reads `RUST_LOG`, defaulting to info.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
