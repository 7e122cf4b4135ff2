use crate::core::convert::fragment::FragmentationMethod;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("'block_embedding_size' cannot be combined with per-segment block embedding sizes")]
    ConflictingBlockEmbeddings,
    #[error("Per-segment block embeddings need both sizes, only '{0}' is set")]
    IncompleteBlockEmbeddings(&'static str),
    #[error("'{0}' must be greater than zero")]
    ZeroSize(&'static str),
    #[error("'{field}' must be in [0, 1), got {value}")]
    InvalidDropout { field: &'static str, value: f64 },
    #[error("Failed to parse model configuration: {0}")]
    Parse(String),
    #[error("Failed to serialize model configuration: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Nonlinearity {
    #[default]
    Relu,
    Gelu,
    Elu,
}

impl Nonlinearity {
    pub fn apply(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Relu => xs.relu(),
            Self::Gelu => xs.gelu_erf(),
            Self::Elu => xs.elu(1.0),
        }
    }
}

/// Denoising noise levels of a pretraining model. All zero for prediction models.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub atom_noise: f64,
    pub translation_noise: f64,
    pub rotation_noise: f64,
    pub torsion_noise: f64,
}

impl NoiseConfig {
    pub fn is_zero(&self) -> bool {
        self.atom_noise == 0.0
            && self.translation_noise == 0.0
            && self.rotation_noise == 0.0
            && self.torsion_noise == 0.0
    }
}

/// Hyperparameters of the two-level encoder shared by pretraining and prediction models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub atom_hidden_size: usize,
    pub hidden_size: usize,
    pub edge_size: usize,
    pub k_neighbors: usize,
    pub n_layers: usize,
    pub dropout: f64,
    pub fragmentation_method: Option<FragmentationMethod>,
    pub bottom_global_message_passing: bool,
    pub global_message_passing: bool,
    pub noise: NoiseConfig,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            atom_hidden_size: 32,
            hidden_size: 32,
            edge_size: 16,
            k_neighbors: 8,
            n_layers: 4,
            dropout: 0.0,
            fragmentation_method: None,
            bottom_global_message_passing: false,
            global_message_passing: false,
            noise: NoiseConfig::default(),
        }
    }
}

/// How externally computed block embeddings are fused into block representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEmbeddingMode {
    None,
    /// One projector and mixing network for every block.
    Shared { size: usize },
    /// Separate networks for segment 0 and segment 1 blocks.
    PerSegment { size0: usize, size1: usize },
}

/// Energy head and block-embedding fusion settings of the affinity predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadConfig {
    pub nonlinearity: Nonlinearity,
    pub num_affinity_pred_layers: usize,
    pub affinity_pred_dropout: f64,
    pub affinity_pred_hidden_size: usize,
    pub num_projector_layers: usize,
    pub projector_hidden_size: usize,
    pub projector_dropout: f64,
    pub block_embedding_size: Option<usize>,
    pub block_embedding0_size: Option<usize>,
    pub block_embedding1_size: Option<usize>,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            nonlinearity: Nonlinearity::Relu,
            num_affinity_pred_layers: 2,
            affinity_pred_dropout: 0.0,
            affinity_pred_hidden_size: 32,
            num_projector_layers: 2,
            projector_hidden_size: 32,
            projector_dropout: 0.0,
            block_embedding_size: None,
            block_embedding0_size: None,
            block_embedding1_size: None,
        }
    }
}

impl HeadConfig {
    pub fn block_embedding_mode(&self) -> Result<BlockEmbeddingMode, ConfigError> {
        match (
            self.block_embedding_size,
            self.block_embedding0_size,
            self.block_embedding1_size,
        ) {
            (None, None, None) => Ok(BlockEmbeddingMode::None),
            (Some(size), None, None) => Ok(BlockEmbeddingMode::Shared { size }),
            (None, Some(size0), Some(size1)) => Ok(BlockEmbeddingMode::PerSegment { size0, size1 }),
            (Some(_), _, _) => Err(ConfigError::ConflictingBlockEmbeddings),
            (None, Some(_), None) => Err(ConfigError::IncompleteBlockEmbeddings(
                "block_embedding0_size",
            )),
            (None, None, Some(_)) => Err(ConfigError::IncompleteBlockEmbeddings(
                "block_embedding1_size",
            )),
        }
    }
}

/// Full configuration of an [`AffinityPredictor`](super::affinity::AffinityPredictor).
///
/// Persisted as TOML with `[encoder]`, `[encoder.noise]` and `[head]` tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityConfig {
    pub encoder: EncoderConfig,
    pub head: HeadConfig,
}

fn check_size(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroSize(field));
    }
    Ok(())
}

fn check_dropout(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..1.0).contains(&value) {
        return Err(ConfigError::InvalidDropout { field, value });
    }
    Ok(())
}

impl AffinityConfig {
    /// Checks sizes, dropout rates and the block-embedding options.
    pub fn validate(&self) -> Result<BlockEmbeddingMode, ConfigError> {
        let e = &self.encoder;
        check_size("atom_hidden_size", e.atom_hidden_size)?;
        check_size("hidden_size", e.hidden_size)?;
        check_size("edge_size", e.edge_size)?;
        check_size("k_neighbors", e.k_neighbors)?;
        check_dropout("dropout", e.dropout)?;

        let h = &self.head;
        check_size("affinity_pred_hidden_size", h.affinity_pred_hidden_size)?;
        check_size("projector_hidden_size", h.projector_hidden_size)?;
        check_dropout("affinity_pred_dropout", h.affinity_pred_dropout)?;
        check_dropout("projector_dropout", h.projector_dropout)?;

        let mode = h.block_embedding_mode()?;
        match mode {
            BlockEmbeddingMode::Shared { size } => check_size("block_embedding_size", size)?,
            BlockEmbeddingMode::PerSegment { size0, size1 } => {
                check_size("block_embedding0_size", size0)?;
                check_size("block_embedding1_size", size1)?;
            }
            BlockEmbeddingMode::None => {}
        }
        Ok(mode)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_embedding_modes_are_exclusive() {
        let mut head = HeadConfig::default();
        assert_eq!(head.block_embedding_mode(), Ok(BlockEmbeddingMode::None));

        head.block_embedding_size = Some(16);
        assert_eq!(
            head.block_embedding_mode(),
            Ok(BlockEmbeddingMode::Shared { size: 16 })
        );

        head.block_embedding0_size = Some(8);
        assert_eq!(
            head.block_embedding_mode(),
            Err(ConfigError::ConflictingBlockEmbeddings)
        );

        head.block_embedding_size = None;
        assert_eq!(
            head.block_embedding_mode(),
            Err(ConfigError::IncompleteBlockEmbeddings("block_embedding0_size"))
        );

        head.block_embedding1_size = Some(4);
        assert_eq!(
            head.block_embedding_mode(),
            Ok(BlockEmbeddingMode::PerSegment { size0: 8, size1: 4 })
        );
    }

    #[test]
    fn validation_rejects_zero_sizes_and_bad_dropout() {
        let mut config = AffinityConfig::default();
        assert!(config.validate().is_ok());

        config.encoder.hidden_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroSize("hidden_size")));

        config.encoder.hidden_size = 32;
        config.head.projector_dropout = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDropout {
                field: "projector_dropout",
                ..
            })
        ));
    }

    #[test]
    fn toml_uses_nested_tables_and_defaults() {
        let text = r#"
[encoder]
hidden_size = 64
k_neighbors = 9
fragmentation_method = "motif"
global_message_passing = true

[head]
nonlinearity = "gelu"
block_embedding_size = 128
"#;
        let config = AffinityConfig::from_toml_str(text).unwrap();
        assert_eq!(config.encoder.hidden_size, 64);
        assert_eq!(config.encoder.atom_hidden_size, 32);
        assert_eq!(
            config.encoder.fragmentation_method,
            Some(FragmentationMethod::Motif)
        );
        assert!(config.encoder.noise.is_zero());
        assert_eq!(config.head.nonlinearity, Nonlinearity::Gelu);
        assert_eq!(config.head.block_embedding_size, Some(128));

        let reparsed = AffinityConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn unknown_nonlinearity_is_a_parse_error() {
        let result = AffinityConfig::from_toml_str("[head]\nnonlinearity = \"tanh\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
