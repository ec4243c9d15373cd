//! Environment-driven runtime configuration

use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_OCR_LANGS, DEFAULT_PORT, MAX_UPLOAD_SIZE};
use crate::sampler::{OcrFailurePolicy, SamplerConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub model_dir: PathBuf,
    pub model_repo: Option<String>,
    pub ocr_langs: String,
    pub tesseract_bin: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub max_upload_bytes: usize,
    pub ocr_failure: OcrFailurePolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Invalid or empty values fall back to their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            port: lookup("PORT")
                .and_then(|s| s.trim().parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_PORT),
            model_dir: PathBuf::from(text("MODEL_DIR", ".")),
            model_repo: lookup("MODEL_REPO")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            ocr_langs: text("OCR_LANGS", DEFAULT_OCR_LANGS),
            tesseract_bin: text("TESSERACT_BIN", "tesseract"),
            ffmpeg_bin: text("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: text("FFPROBE_BIN", "ffprobe"),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|s| s.trim().parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(MAX_UPLOAD_SIZE),
            ocr_failure: lookup("OCR_FAILURE_POLICY")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig {
            ocr_failure: self.ocr_failure,
            ..SamplerConfig::default()
        }
    }
}
