//! OCR through the Tesseract command line tool

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Stdio};

/// Recognizes text fragments in an image file, in reading order
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<Vec<String>>;
}

pub struct TesseractOcr {
    binary: String,
    languages: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            languages: languages.into(),
        }
    }

    /// Fail fast at startup if the binary or a language pack is missing
    pub fn ensure_available(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--list-langs")
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.binary))?;

        if !output.status.success() {
            bail!("{} --list-langs exited with {}", self.binary, output.status);
        }

        // Older releases print the list on stderr
        let listing = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let installed: Vec<&str> = listing.lines().map(str::trim).collect();
        for lang in self.languages.split('+') {
            if !installed.contains(&lang) {
                bail!("Tesseract language pack '{}' is not installed", lang);
            }
        }

        tracing::info!("[ocr] Tesseract ready ({})", self.languages);
        Ok(())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &Path) -> Result<Vec<String>> {
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.languages])
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract failed on {}: {}", image.display(), stderr.trim());
        }

        Ok(parse_fragments(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// One fragment per non-blank line of Tesseract's plain-text output
pub fn parse_fragments(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
