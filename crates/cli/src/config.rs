use anyhow::{Context, Result};
use nomap_mapping::{BuilderConfig, ScoringConfig};
use nomap_reconcile::{NormalizerConfig, ValidatorConfig};
use nomap_taxonomy::{Tokenizer, DEFAULT_DEPTH_LENGTHS, FLAT_CODE_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HierarchyConfig {
    /// Code length at each depth, depth 1 first
    pub depth_lengths: Vec<usize>,
    /// Digits in a flat code
    pub flat_code_length: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            depth_lengths: DEFAULT_DEPTH_LENGTHS.to_vec(),
            flat_code_length: FLAT_CODE_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Added to the built-in stop words
    pub extra_stop_words: Vec<String>,
}

/// Everything a pipeline run can be tuned with. Every section is optional in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub hierarchy: HierarchyConfig,
    pub text: TextConfig,
    pub scoring: ScoringConfig,
    pub builder: BuilderConfig,
    pub normalizer: NormalizerConfig,
    pub validator: ValidatorConfig,
}

impl PipelineConfig {
    /// Read `path` when given, otherwise use defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml_str(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), String> {
        let depths = &self.hierarchy.depth_lengths;
        if depths.is_empty() {
            return Err("hierarchy.depth_lengths must not be empty".to_string());
        }
        if depths[0] == 0 || depths.windows(2).any(|w| w[0] >= w[1]) {
            return Err("hierarchy.depth_lengths must be positive and strictly increasing".to_string());
        }
        if depths.len() > usize::from(u8::MAX) {
            return Err("hierarchy.depth_lengths has too many levels".to_string());
        }
        if self.hierarchy.flat_code_length == 0 {
            return Err("hierarchy.flat_code_length must be > 0".to_string());
        }
        self.scoring.validate()?;
        self.builder.validate()?;
        self.normalizer.validate()?;
        self.validator.validate()?;
        Ok(())
    }

    #[must_use]
    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::with_extra_stop_words(&self.text.extra_stop_words)
    }
}
