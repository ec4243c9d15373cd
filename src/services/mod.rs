pub mod classifier;
pub mod detector;
pub mod error;
pub mod models;
pub mod ocr;
pub mod tokenizer;
pub mod video;

#[cfg(test)]
pub mod mock;
