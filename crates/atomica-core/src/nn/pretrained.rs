use super::affinity::{AffinityPredictor, CONFIG_FILE, WEIGHTS_FILE};
use super::config::{AffinityConfig, ConfigError, EncoderConfig, HeadConfig, NoiseConfig};
use super::error::ModelError;
use super::params::{LoadReport, ParamGroup};
use candle_core::{Device, Tensor};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Anything that can seed an [`AffinityPredictor`] with encoder hyperparameters and
/// named weights.
pub trait ProvidesEncoderWeights {
    fn encoder_config(&self) -> &EncoderConfig;
    fn named_tensors(&self) -> HashMap<String, Tensor>;
}

impl ProvidesEncoderWeights for AffinityPredictor {
    fn encoder_config(&self) -> &EncoderConfig {
        &self.get_config().encoder
    }

    fn named_tensors(&self) -> HashMap<String, Tensor> {
        let vars = self.varmap().data().lock();
        let vars = match vars {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        vars.iter()
            .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
            .collect()
    }
}

/// Encoder settings and weights read from a checkpoint directory, e.g. a pretraining run.
#[derive(Debug, Clone)]
pub struct PretrainedCheckpoint {
    config: EncoderConfig,
    tensors: HashMap<String, Tensor>,
}

#[derive(Deserialize)]
struct StoredConfig {
    #[serde(default)]
    encoder: EncoderConfig,
}

impl PretrainedCheckpoint {
    pub fn new(config: EncoderConfig, tensors: HashMap<String, Tensor>) -> Self {
        Self { config, tensors }
    }

    /// Reads the `[encoder]` table of `config.toml` and every tensor of
    /// `model.safetensors`. Other tables are ignored.
    #[instrument(skip_all, name = "load_checkpoint", fields(dir = %dir.display()))]
    pub fn load(dir: &Path, device: &Device) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
        let stored: StoredConfig =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let tensors = candle_core::safetensors::load(dir.join(WEIGHTS_FILE), device)?;
        info!(tensors = tensors.len(), "Loaded pretrained checkpoint");
        Ok(Self::new(stored.encoder, tensors))
    }

    pub fn tensors_mut(&mut self) -> &mut HashMap<String, Tensor> {
        &mut self.tensors
    }
}

impl ProvidesEncoderWeights for PretrainedCheckpoint {
    fn encoder_config(&self) -> &EncoderConfig {
        &self.config
    }

    fn named_tensors(&self) -> HashMap<String, Tensor> {
        self.tensors.clone()
    }
}

/// Overrides and head settings for fine-tuning a pretrained encoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinetuneOptions {
    pub k_neighbors: Option<usize>,
    pub dropout: Option<f64>,
    pub bottom_global_message_passing: Option<bool>,
    pub global_message_passing: Option<bool>,
    pub head: HeadConfig,
    /// Train only the energy head (plus edge embeddings of newly enabled global levels).
    pub partial_finetune: bool,
}

impl AffinityPredictor {
    /// Builds a predictor with the pretrained encoder architecture and transfers its
    /// weights.
    ///
    /// Backbone parameters must match in shape; head parameters are copied only when
    /// present with the same shape. Noise levels of the source are discarded.
    #[instrument(skip_all, name = "from_pretrained")]
    pub fn from_pretrained(
        source: &impl ProvidesEncoderWeights,
        options: FinetuneOptions,
        device: &Device,
    ) -> Result<(Self, LoadReport), ModelError> {
        let pretrained = source.encoder_config();
        let mut encoder = pretrained.clone();
        encoder.noise = NoiseConfig::default();

        if let Some(k) = options.k_neighbors {
            if k != pretrained.k_neighbors {
                warn!(
                    pretrained = pretrained.k_neighbors,
                    requested = k,
                    "k_neighbors differs from the pretrained model, using the requested value"
                );
            }
            encoder.k_neighbors = k;
        }
        if let Some(dropout) = options.dropout {
            encoder.dropout = dropout;
        }
        if let Some(flag) = options.bottom_global_message_passing {
            encoder.bottom_global_message_passing = flag;
        }
        if let Some(flag) = options.global_message_passing {
            encoder.global_message_passing = flag;
        }
        let newly_bottom =
            encoder.bottom_global_message_passing && !pretrained.bottom_global_message_passing;
        let newly_top = encoder.global_message_passing && !pretrained.global_message_passing;

        let config = AffinityConfig {
            encoder,
            head: options.head,
        };
        let mut model = Self::new(config, device)?;
        let report = model.transfer_from(&source.named_tensors())?;
        info!(
            transferred = report.transferred.len(),
            missing = report.missing.len(),
            fresh = report.fresh.len(),
            unexpected = report.unexpected.len(),
            "Transferred pretrained weights"
        );

        if options.partial_finetune {
            let mut groups = BTreeSet::from([ParamGroup::EnergyFfn]);
            if newly_bottom {
                groups.insert(ParamGroup::EdgeEmbeddingBottom);
            }
            if newly_top {
                groups.insert(ParamGroup::EdgeEmbeddingTop);
            }
            model.set_trainable(groups);
        }
        if newly_bottom {
            warn!(
                "bottom_global_message_passing is enabled but was off during pretraining, \
                 training edge_embedding_bottom"
            );
        }
        if newly_top {
            warn!(
                "global_message_passing is enabled but was off during pretraining, \
                 training edge_embedding_top"
            );
        }
        Ok((model, report))
    }
}
