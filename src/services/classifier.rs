use anyhow::{Context, Result, anyhow};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::rnn::{GRU, GRUConfig, LSTM, LSTMConfig, RNN};
use candle_nn::{Embedding, Linear, VarBuilder};
use serde::Deserialize;
use std::path::Path;

/// Scores a fixed-length id sequence, returns probability of a gambling ad
pub trait Classifier: Send + Sync {
    fn score(&self, sequence: &[u32]) -> Result<f32>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    Lstm,
    Gru,
}

/// Shape of the exported model, read from `config.json`
#[derive(Debug, Clone, Deserialize)]
pub struct RecurrentConfig {
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub hidden_size: usize,
    #[serde(default)]
    pub cell: CellKind,
    /// Embedding was trained with `mask_zero`: padding steps are skipped
    #[serde(default)]
    pub mask_zero: bool,
}

enum Recurrent {
    Lstm(LSTM),
    Gru(GRU),
}

impl Recurrent {
    /// Hidden state after the last time step, shape (1, hidden)
    fn last_hidden(&self, input: &Tensor) -> Result<Tensor> {
        let hidden = match self {
            Recurrent::Lstm(lstm) => lstm.seq(input)?.last().map(|state| state.h().clone()),
            Recurrent::Gru(gru) => gru.seq(input)?.last().map(|state| state.h().clone()),
        };
        hidden.ok_or_else(|| anyhow!("recurrent layer produced no states"))
    }
}

/// Embedding -> LSTM/GRU -> dense -> sigmoid, weights from safetensors
pub struct RecurrentClassifier {
    embedding: Embedding,
    rnn: Recurrent,
    dense: Linear,
    mask_zero: bool,
    device: Device,
}

impl RecurrentClassifier {
    pub fn load(weights_path: &Path, config_path: &Path) -> Result<Self> {
        #[cfg(feature = "metal")]
        let device = Device::new_metal(0).unwrap_or(Device::Cpu);
        #[cfg(not(feature = "metal"))]
        let device = Device::Cpu;

        tracing::info!("[classifier] Loading {} on {:?}", weights_path.display(), device);

        let config: RecurrentConfig = serde_json::from_str(
            &std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?,
        )
        .with_context(|| format!("Invalid model config {}", config_path.display()))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };
        let classifier = Self::from_var_builder(&config, vb, device)?;

        tracing::info!(
            "[classifier] Model loaded ({:?}, vocab={}, embedding={}, hidden={})",
            config.cell,
            config.vocab_size,
            config.embedding_dim,
            config.hidden_size
        );
        Ok(classifier)
    }

    pub fn from_var_builder(config: &RecurrentConfig, vb: VarBuilder, device: Device) -> Result<Self> {
        let embedding =
            candle_nn::embedding(config.vocab_size, config.embedding_dim, vb.pp("embedding"))?;
        let rnn = match config.cell {
            CellKind::Lstm => Recurrent::Lstm(candle_nn::rnn::lstm(
                config.embedding_dim,
                config.hidden_size,
                LSTMConfig::default(),
                vb.pp("rnn"),
            )?),
            CellKind::Gru => Recurrent::Gru(candle_nn::rnn::gru(
                config.embedding_dim,
                config.hidden_size,
                GRUConfig::default(),
                vb.pp("rnn"),
            )?),
        };
        let dense = candle_nn::linear(config.hidden_size, 1, vb.pp("dense"))?;

        Ok(Self {
            embedding,
            rnn,
            dense,
            mask_zero: config.mask_zero,
            device,
        })
    }
}

/// Steps fed to the recurrent layer. With masking, trailing padding is
/// dropped; at least one step is always kept.
pub fn effective_len(sequence: &[u32], mask_zero: bool) -> usize {
    if !mask_zero {
        return sequence.len();
    }
    let used = sequence.iter().rposition(|&id| id != 0).map_or(0, |pos| pos + 1);
    used.max(1).min(sequence.len())
}

impl Classifier for RecurrentClassifier {
    fn score(&self, sequence: &[u32]) -> Result<f32> {
        if sequence.is_empty() {
            return Err(anyhow!("cannot score an empty sequence"));
        }
        let steps = &sequence[..effective_len(sequence, self.mask_zero)];

        let ids = Tensor::new(steps, &self.device)?.unsqueeze(0)?;
        let embedded = self.embedding.forward(&ids)?;
        let hidden = self.rnn.last_hidden(&embedded)?;
        let logits = self.dense.forward(&hidden)?;
        let probs: Vec<f32> = candle_nn::ops::sigmoid(&logits)?.flatten_all()?.to_vec1()?;

        let score = probs
            .first()
            .copied()
            .ok_or_else(|| anyhow!("classifier returned no output"))?;
        Ok(score.clamp(0.0, 1.0))
    }
}
