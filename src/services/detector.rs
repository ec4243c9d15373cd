//! Detection service: text, image and video entry points over the shared
//! tokenizer, classifier, OCR engine and frame decoder.
//!
//! All methods block; route handlers call them from `spawn_blocking`.

use image::{ImageFormat, ImageReader};
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use crate::constants::{
    MSG_IMAGE_REQUIRED, MSG_IMAGE_UNREADABLE, MSG_NO_TEXT_FOUND, MSG_TEXT_REQUIRED,
    MSG_VIDEO_REQUIRED,
};
use crate::domain::sequence;
use crate::domain::verdict::Verdict;
use crate::sampler::{SamplerConfig, ScanReport, VideoSampler};

use super::classifier::Classifier;
use super::error::DetectError;
use super::ocr::OcrEngine;
use super::tokenizer::Tokenizer;
use super::video::FrameDecoder;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDetection {
    pub ocr_text: String,
    pub verdict: Verdict,
}

pub struct Detector {
    tokenizer: Arc<dyn Tokenizer>,
    classifier: Arc<dyn Classifier>,
    ocr: Arc<dyn OcrEngine>,
    decoder: Arc<dyn FrameDecoder>,
    sampler: SamplerConfig,
}

impl Detector {
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        classifier: Arc<dyn Classifier>,
        ocr: Arc<dyn OcrEngine>,
        decoder: Arc<dyn FrameDecoder>,
        sampler: SamplerConfig,
    ) -> Self {
        Self {
            tokenizer,
            classifier,
            ocr,
            decoder,
            sampler,
        }
    }

    /// Tokenize, pad to the model length, classify
    pub fn score_text(&self, text: &str) -> anyhow::Result<f32> {
        let sequence = sequence::normalize(self.tokenizer.as_ref(), text);
        self.classifier.score(&sequence)
    }

    pub fn detect_text(&self, text: &str) -> Result<Verdict, DetectError> {
        if text.is_empty() {
            return Err(DetectError::InvalidInput(MSG_TEXT_REQUIRED.to_string()));
        }

        let score = self.score_text(text).map_err(DetectError::Inference)?;
        Ok(Verdict::from_score(score))
    }

    pub fn detect_image(&self, data: &[u8]) -> Result<ImageDetection, DetectError> {
        if data.is_empty() {
            return Err(DetectError::InvalidInput(MSG_IMAGE_REQUIRED.to_string()));
        }

        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                tracing::debug!("[image] Failed to decode upload: {}", e);
                DetectError::InvalidInput(MSG_IMAGE_UNREADABLE.to_string())
            })?;

        // Re-encoded as PNG so the OCR engine never sees an exotic format
        let image_file = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(".png")
            .tempfile()?;
        img.save_with_format(image_file.path(), ImageFormat::Png)
            .map_err(DetectError::media)?;
        drop(img);

        let fragments = self.ocr.recognize(image_file.path());
        image_file.close()?;

        let ocr_text = fragments.map_err(DetectError::Inference)?.join(" ");
        if ocr_text.trim().is_empty() {
            return Err(DetectError::NoTextFound(MSG_NO_TEXT_FOUND.to_string()));
        }

        let score = self.score_text(&ocr_text).map_err(DetectError::Inference)?;
        Ok(ImageDetection {
            ocr_text,
            verdict: Verdict::from_score(score),
        })
    }

    /// `extension` picks the temp file suffix so the decoder can sniff the container
    pub fn detect_video(&self, data: &[u8], extension: &str) -> Result<ScanReport, DetectError> {
        if data.is_empty() {
            return Err(DetectError::InvalidInput(MSG_VIDEO_REQUIRED.to_string()));
        }

        let mut video_file = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        video_file.write_all(data)?;
        video_file.flush()?;

        // Dropping video_file on any early return removes it as well
        let report = self.scan_file(video_file.path());
        video_file.close()?;

        let report = report?;
        tracing::info!(
            "[video] {} after {} frames ({} sampled)",
            report.verdict.label.as_status(),
            report.frames_checked,
            report.frames_sampled
        );
        Ok(report)
    }

    fn scan_file(&self, path: &Path) -> Result<ScanReport, DetectError> {
        let mut stream = self
            .decoder
            .open(path, self.sampler.max_frames)
            .map_err(DetectError::Inference)?;

        let scorer = |text: &str| self.score_text(text);
        VideoSampler::new(&self.sampler, self.ocr.as_ref(), &scorer).scan(stream.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verdict::Label;
    use crate::services::mock::{
        FixedOcr, FrameIndexOcr, ScriptedClassifier, SyntheticDecoder, WordLengthTokenizer,
    };
    use image::{Rgb, RgbImage};
    use std::sync::atomic::Ordering;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn detector(
        classifier: Arc<ScriptedClassifier>,
        ocr: Arc<dyn OcrEngine>,
        decoder: Arc<SyntheticDecoder>,
    ) -> Detector {
        Detector::new(
            Arc::new(WordLengthTokenizer),
            classifier,
            ocr,
            decoder,
            SamplerConfig::default(),
        )
    }

    #[test]
    fn test_detect_text_rejects_empty_input() {
        let classifier = Arc::new(ScriptedClassifier::constant(0.9));
        let detector = detector(
            classifier.clone(),
            Arc::new(FixedOcr::new(&[])),
            Arc::new(SyntheticDecoder::new(0)),
        );

        let err = detector.detect_text("").unwrap_err();
        assert!(matches!(err, DetectError::InvalidInput(ref msg) if msg == MSG_TEXT_REQUIRED));
        assert_eq!(classifier.calls(), 0);
    }

    #[test]
    fn test_detect_text_scores_positive() {
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.83)),
            Arc::new(FixedOcr::new(&[])),
            Arc::new(SyntheticDecoder::new(0)),
        );

        let verdict = detector.detect_text("promo slot gacor menang terus").unwrap();
        assert_eq!(verdict.label, Label::Positive);
        assert_eq!(verdict.confidence, "83.00%");
        assert_eq!(verdict.raw, 0.83);
    }

    #[test]
    fn test_detect_text_tie_is_negative() {
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.5)),
            Arc::new(FixedOcr::new(&[])),
            Arc::new(SyntheticDecoder::new(0)),
        );

        let verdict = detector.detect_text("bonus").unwrap();
        assert_eq!(verdict.label, Label::Negative);
        assert_eq!(verdict.confidence, "50.00%");
    }

    #[test]
    fn test_detect_image_joins_fragments() {
        let ocr = Arc::new(FixedOcr::new(&["SLOT GACOR", "DEPO 10RB"]));
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.77)),
            ocr.clone(),
            Arc::new(SyntheticDecoder::new(0)),
        );

        let detection = detector.detect_image(&png_bytes()).unwrap();
        assert_eq!(detection.ocr_text, "SLOT GACOR DEPO 10RB");
        assert!(detection.verdict.is_positive());
        assert_eq!(detection.verdict.confidence, "77.00%");

        let paths = ocr.paths();
        assert_eq!(paths.len(), 1);
        assert!(!paths[0].exists(), "temporary image should be deleted");
    }

    #[test]
    fn test_detect_image_without_text() {
        let classifier = Arc::new(ScriptedClassifier::constant(0.9));
        let ocr = Arc::new(FixedOcr::new(&[]));
        let detector = detector(classifier.clone(), ocr.clone(), Arc::new(SyntheticDecoder::new(0)));

        let err = detector.detect_image(&png_bytes()).unwrap_err();
        assert!(matches!(err, DetectError::NoTextFound(ref msg) if msg == MSG_NO_TEXT_FOUND));
        assert_eq!(classifier.calls(), 0);
        assert!(!ocr.paths()[0].exists());
    }

    #[test]
    fn test_detect_image_whitespace_only_text() {
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.9)),
            Arc::new(FixedOcr::new(&["  ", "\t"])),
            Arc::new(SyntheticDecoder::new(0)),
        );

        assert!(matches!(
            detector.detect_image(&png_bytes()),
            Err(DetectError::NoTextFound(_))
        ));
    }

    #[test]
    fn test_detect_image_rejects_garbage() {
        let ocr = Arc::new(FixedOcr::new(&["x"]));
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.9)),
            ocr.clone(),
            Arc::new(SyntheticDecoder::new(0)),
        );

        assert!(matches!(
            detector.detect_image(b"definitely not an image"),
            Err(DetectError::InvalidInput(_))
        ));
        assert!(matches!(
            detector.detect_image(&[]),
            Err(DetectError::InvalidInput(ref msg)) if msg == MSG_IMAGE_REQUIRED
        ));
        assert!(ocr.paths().is_empty());
    }

    #[test]
    fn test_detect_video_early_exit_deletes_upload() {
        let decoder = Arc::new(SyntheticDecoder::new(45));
        let ocr = Arc::new(FrameIndexOcr::new([(0, vec!["promo"]), (30, vec!["slot", "gacor"])]));
        let detector = detector(
            Arc::new(ScriptedClassifier::new([0.2, 0.9])),
            ocr.clone(),
            decoder.clone(),
        );

        let report = detector.detect_video(b"fake mp4 bytes", "mp4").unwrap();
        assert!(report.verdict.is_positive());
        assert_eq!(report.verdict.confidence, "90.00%");
        assert_eq!(report.frames_checked, 31);
        assert_eq!(decoder.reads.load(Ordering::SeqCst), 31);

        let opened = decoder.opened();
        assert_eq!(opened.len(), 1);
        let (path, existed) = &opened[0];
        assert!(*existed);
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp4"));
        assert!(!path.exists(), "uploaded video should be deleted");
        assert!(ocr.paths().iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_detect_video_without_detection_deletes_upload() {
        let decoder = Arc::new(SyntheticDecoder::new(45));
        let detector = detector(
            Arc::new(ScriptedClassifier::new([0.3, 0.1])),
            Arc::new(FrameIndexOcr::new([(0, vec!["a"]), (30, vec!["b"])])),
            decoder.clone(),
        );

        let report = detector.detect_video(b"fake webm bytes", "webm").unwrap();
        assert!(!report.verdict.is_positive());
        assert_eq!(report.verdict.confidence, "0.00%");
        assert_eq!(report.verdict.raw, 0.0);
        assert_eq!(report.frames_checked, 45);
        assert!(!decoder.opened()[0].0.exists());
    }

    #[test]
    fn test_detect_video_failure_deletes_upload() {
        let decoder = Arc::new(SyntheticDecoder::failing_open());
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.9)),
            Arc::new(FixedOcr::new(&[])),
            decoder.clone(),
        );

        let err = detector.detect_video(b"garbage", "mp4").unwrap_err();
        assert!(matches!(err, DetectError::Inference(_)));
        assert!(!decoder.opened()[0].0.exists());
    }

    #[test]
    fn test_detect_video_decode_failure_is_not_a_clean_verdict() {
        let decoder = Arc::new(SyntheticDecoder::new(45).failing_at(10));
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.1)),
            Arc::new(FrameIndexOcr::new([(0, vec!["halo"])])),
            decoder.clone(),
        );

        let err = detector.detect_video(b"corrupt mp4", "mp4").unwrap_err();
        assert!(matches!(err, DetectError::MediaIo(_)));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!decoder.opened()[0].0.exists());
    }

    #[test]
    fn test_detect_video_rejects_empty_upload() {
        let decoder = Arc::new(SyntheticDecoder::new(10));
        let detector = detector(
            Arc::new(ScriptedClassifier::constant(0.9)),
            Arc::new(FixedOcr::new(&[])),
            decoder.clone(),
        );

        assert!(matches!(
            detector.detect_video(&[], "mp4"),
            Err(DetectError::InvalidInput(ref msg)) if msg == MSG_VIDEO_REQUIRED
        ));
        assert!(decoder.opened().is_empty());
    }
}
