//! Locating the classifier weights, its config and the tokenizer export.

use anyhow::{Context, Result, bail};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::{Path, PathBuf};

use crate::constants::{MODEL_CONFIG_FILE, MODEL_WEIGHTS_FILE, TOKENIZER_FILE};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub weights: PathBuf,
    pub config: PathBuf,
    pub vocabulary: PathBuf,
}

impl ModelFiles {
    /// Files expected side by side in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            weights: dir.join(MODEL_WEIGHTS_FILE),
            config: dir.join(MODEL_CONFIG_FILE),
            vocabulary: dir.join(TOKENIZER_FILE),
        }
    }

    /// Download (or reuse the cached copy of) the three files from a hub repo
    pub fn from_hub(repo_id: &str) -> Result<Self> {
        let api = Api::new().context("Failed to create hub client")?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let fetch = |name: &str| {
            repo.get(name)
                .with_context(|| format!("Failed to fetch {} from {}", name, repo_id))
        };

        Ok(Self {
            weights: fetch(MODEL_WEIGHTS_FILE)?,
            config: fetch(MODEL_CONFIG_FILE)?,
            vocabulary: fetch(TOKENIZER_FILE)?,
        })
    }

    /// Hub repo when given, otherwise the local directory
    pub fn resolve(dir: &Path, repo_id: Option<&str>) -> Result<Self> {
        let files = match repo_id {
            Some(repo_id) => {
                tracing::info!("[startup] Fetching model files from {}", repo_id);
                Self::from_hub(repo_id)?
            }
            None => Self::in_dir(dir),
        };
        files.ensure_present()?;
        Ok(files)
    }

    pub fn ensure_present(&self) -> Result<()> {
        for path in [&self.weights, &self.config, &self.vocabulary] {
            if !path.is_file() {
                bail!("Model file not found: {}", path.display());
            }
        }
        Ok(())
    }
}
