//! Video scanning state machine.
//!
//! Reads frames sequentially, runs OCR on every Nth frame through a scoped
//! temporary PNG, scores the recognized text, and stops at the first frame
//! that crosses the detection threshold.

use image::{ImageFormat, RgbImage};
use std::str::FromStr;

use crate::constants::{FRAME_SAMPLE_INTERVAL, MAX_VIDEO_FRAMES};
use crate::domain::verdict::{Label, Verdict};
use crate::services::error::DetectError;
use crate::services::ocr::OcrEngine;
use crate::services::video::FrameStream;

/// What to do when OCR fails on one sampled frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OcrFailurePolicy {
    /// Log and move on to the next frame
    #[default]
    Skip,
    /// Fail the whole scan
    Abort,
}

impl FromStr for OcrFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OcrFailurePolicy::Skip),
            "abort" => Ok(OcrFailurePolicy::Abort),
            other => Err(format!("unknown OCR failure policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub sample_every: usize,
    pub max_frames: usize,
    pub ocr_failure: OcrFailurePolicy,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_every: FRAME_SAMPLE_INTERVAL,
            max_frames: MAX_VIDEO_FRAMES,
            ocr_failure: OcrFailurePolicy::default(),
        }
    }
}

/// A decoded frame and its ordinal position in the stream
pub struct FrameSample {
    pub index: usize,
    pub image: RgbImage,
}

/// Scan progress. Failures leave the machine through `Err` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Scanning { frame_index: usize },
    Detected { frame_index: usize, score: f32 },
    Exhausted { frames_read: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub verdict: Verdict,
    /// Frames read from the stream, including the detecting one
    pub frames_checked: usize,
    pub frames_sampled: usize,
}

pub type TextScorer<'a> = dyn Fn(&str) -> anyhow::Result<f32> + 'a;

pub struct VideoSampler<'a> {
    config: &'a SamplerConfig,
    ocr: &'a dyn OcrEngine,
    scorer: &'a TextScorer<'a>,
    frames_sampled: usize,
}

impl<'a> VideoSampler<'a> {
    pub fn new(config: &'a SamplerConfig, ocr: &'a dyn OcrEngine, scorer: &'a TextScorer<'a>) -> Self {
        Self {
            config,
            ocr,
            scorer,
            frames_sampled: 0,
        }
    }

    pub fn scan(mut self, stream: &mut dyn FrameStream) -> Result<ScanReport, DetectError> {
        let mut state = ScanState::Scanning { frame_index: 0 };
        while let ScanState::Scanning { frame_index } = state {
            state = self.step(stream, frame_index)?;
        }

        let report = match state {
            ScanState::Detected { frame_index, score } => ScanReport {
                verdict: Verdict::from_score(score),
                frames_checked: frame_index + 1,
                frames_sampled: self.frames_sampled,
            },
            ScanState::Exhausted { frames_read } => ScanReport {
                verdict: Verdict::undetected(),
                frames_checked: frames_read,
                frames_sampled: self.frames_sampled,
            },
            ScanState::Scanning { .. } => unreachable!("loop exits only on a terminal state"),
        };
        Ok(report)
    }

    /// One transition, evaluated once per frame read
    fn step(&mut self, stream: &mut dyn FrameStream, frame_index: usize) -> Result<ScanState, DetectError> {
        if frame_index >= self.config.max_frames {
            return Ok(ScanState::Exhausted {
                frames_read: frame_index,
            });
        }

        let Some(image) = stream.next_frame()? else {
            return Ok(ScanState::Exhausted {
                frames_read: frame_index,
            });
        };

        if frame_index % self.config.sample_every == 0 {
            let sample = FrameSample {
                index: frame_index,
                image,
            };
            if let Some(score) = self.score_frame(&sample)? {
                if Label::from_score(score) == Label::Positive {
                    tracing::info!("[video] Detected at frame {} (score {:.4})", frame_index, score);
                    return Ok(ScanState::Detected { frame_index, score });
                }
            }
        }

        Ok(ScanState::Scanning {
            frame_index: frame_index + 1,
        })
    }

    /// `None` when the frame carries no usable text, or OCR failed under Skip
    fn score_frame(&mut self, sample: &FrameSample) -> Result<Option<f32>, DetectError> {
        self.frames_sampled += 1;

        let fragments = match self.recognize(sample)? {
            Ok(fragments) => fragments,
            Err(e) => match self.config.ocr_failure {
                OcrFailurePolicy::Skip => {
                    tracing::warn!("[video] OCR failed on frame {}, skipping: {:#}", sample.index, e);
                    return Ok(None);
                }
                OcrFailurePolicy::Abort => {
                    return Err(DetectError::Inference(
                        e.context(format!("OCR failed on frame {}", sample.index)),
                    ));
                }
            },
        };

        let text = fragments.join(" ");
        if text.trim().is_empty() {
            return Ok(None);
        }

        let score = (self.scorer)(&text).map_err(DetectError::Inference)?;
        tracing::debug!("[video] Frame {} scored {:.4}", sample.index, score);
        Ok(Some(score))
    }

    /// Write the frame to a scoped temp PNG, OCR it, delete it.
    /// The outer Result carries media I/O failures, the inner one OCR failures.
    fn recognize(&self, sample: &FrameSample) -> Result<anyhow::Result<Vec<String>>, DetectError> {
        let frame_file = tempfile::Builder::new()
            .prefix("frame_")
            .suffix(".png")
            .tempfile()?;
        sample
            .image
            .save_with_format(frame_file.path(), ImageFormat::Png)
            .map_err(DetectError::media)?;

        let fragments = self.ocr.recognize(frame_file.path());
        frame_file.close()?;

        Ok(fragments)
    }
}
