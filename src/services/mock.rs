//! In-memory collaborators for tests

use anyhow::{Result, anyhow, bail};
use image::{Rgb, RgbImage};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::classifier::Classifier;
use super::ocr::OcrEngine;
use super::tokenizer::Tokenizer;
use super::video::{FrameDecoder, FrameStream};

/// Each whitespace-separated word becomes its byte length
pub struct WordLengthTokenizer;

impl Tokenizer for WordLengthTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace().map(|word| word.len() as u32).collect()
    }
}

/// Returns queued scores in call order, then `fallback`
pub struct ScriptedClassifier {
    scores: Mutex<VecDeque<f32>>,
    fallback: f32,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(scores: impl IntoIterator<Item = f32>) -> Self {
        Self {
            scores: Mutex::new(scores.into_iter().collect()),
            fallback: 0.0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(score: f32) -> Self {
        Self {
            scores: Mutex::new(VecDeque::new()),
            fallback: score,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ScriptedClassifier {
    fn score(&self, sequence: &[u32]) -> Result<f32> {
        if sequence.is_empty() {
            bail!("empty sequence");
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.scores.lock().unwrap().pop_front();
        Ok(next.unwrap_or(self.fallback))
    }
}

/// Frames whose first pixel encodes their stream index
pub struct SyntheticFrames {
    total: usize,
    next: usize,
    fail_at: Option<usize>,
    pub reads: Arc<AtomicUsize>,
}

impl SyntheticFrames {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            next: 0,
            fail_at: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }
}

impl FrameStream for SyntheticFrames {
    fn next_frame(&mut self) -> io::Result<Option<RgbImage>> {
        if self.next >= self.total {
            return Ok(None);
        }
        if self.fail_at == Some(self.next) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "decoder died"));
        }
        let index = self.next;
        self.next += 1;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Some(encode_index(index)))
    }
}

fn encode_index(index: usize) -> RgbImage {
    let pixel = Rgb([(index % 256) as u8, (index / 256) as u8, 0]);
    RgbImage::from_pixel(2, 2, pixel)
}

fn decode_index(image: &Path) -> Result<usize> {
    let frame = image::open(image)?.to_rgb8();
    let Rgb([low, high, _]) = *frame.get_pixel(0, 0);
    Ok(high as usize * 256 + low as usize)
}

/// OCR that reads the frame index back out of the PNG it was handed
pub struct FrameIndexOcr {
    texts: HashMap<usize, Vec<String>>,
    fail_on: HashSet<usize>,
    sampled: Mutex<Vec<usize>>,
    paths: Mutex<Vec<PathBuf>>,
}

impl FrameIndexOcr {
    pub fn new<const N: usize>(texts: [(usize, Vec<&str>); N]) -> Self {
        Self {
            texts: texts
                .into_iter()
                .map(|(index, fragments)| {
                    (index, fragments.into_iter().map(str::to_string).collect())
                })
                .collect(),
            fail_on: HashSet::new(),
            sampled: Mutex::new(Vec::new()),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.fail_on.extend(indices);
        self
    }

    pub fn sampled(&self) -> Vec<usize> {
        self.sampled.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

impl OcrEngine for FrameIndexOcr {
    fn recognize(&self, image: &Path) -> Result<Vec<String>> {
        self.paths.lock().unwrap().push(image.to_path_buf());
        let index = decode_index(image)?;
        self.sampled.lock().unwrap().push(index);

        if self.fail_on.contains(&index) {
            return Err(anyhow!("OCR crashed on frame {}", index));
        }
        Ok(self.texts.get(&index).cloned().unwrap_or_default())
    }
}

/// OCR with a fixed answer that checks it was handed a readable image
pub struct FixedOcr {
    fragments: Vec<String>,
    paths: Mutex<Vec<PathBuf>>,
}

impl FixedOcr {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

impl OcrEngine for FixedOcr {
    fn recognize(&self, image: &Path) -> Result<Vec<String>> {
        self.paths.lock().unwrap().push(image.to_path_buf());
        image::open(image)?;
        Ok(self.fragments.clone())
    }
}

/// Decoder yielding synthetic frames; remembers the files it opened
pub struct SyntheticDecoder {
    frames: usize,
    fail_open: bool,
    fail_at: Option<usize>,
    pub reads: Arc<AtomicUsize>,
    opened: Mutex<Vec<(PathBuf, bool)>>,
}

impl SyntheticDecoder {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            fail_open: false,
            fail_at: None,
            reads: Arc::new(AtomicUsize::new(0)),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(0)
        }
    }

    /// Streams that break with an I/O error when reaching `index`
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Opened paths, with whether the file existed at open time
    pub fn opened(&self) -> Vec<(PathBuf, bool)> {
        self.opened.lock().unwrap().clone()
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn open(&self, path: &Path, frame_limit: usize) -> Result<Box<dyn FrameStream>> {
        self.opened
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        if self.fail_open {
            bail!("not a video");
        }
        let mut stream = SyntheticFrames::new(self.frames.min(frame_limit));
        stream.reads = Arc::clone(&self.reads);
        stream.fail_at = self.fail_at;
        Ok(Box::new(stream))
    }
}
