pub mod cleansing;
pub mod config;
pub mod constants;
pub mod domain;
pub mod logging;
pub mod routes;
pub mod sampler;
pub mod services;

use services::detector::Detector;

/// Shared, read-only state handed to every request
pub struct AppState {
    pub detector: Detector,
}
