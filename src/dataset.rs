//! Prompt datasets: named batches of prompts loaded from YAML files.

use crate::XpiaResult;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDataset {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub prompts: Vec<String>,
}

impl PromptDataset {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> XpiaResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read dataset file {:?}", path.as_ref()))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> XpiaResult<Self> {
        let dataset: Self = serde_yaml::from_str(raw).context("Malformed dataset YAML")?;
        if dataset.prompts.is_empty() {
            bail!("Dataset '{}' contains no prompts", dataset.name);
        }
        Ok(dataset)
    }
}
