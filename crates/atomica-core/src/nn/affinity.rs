use super::backbone::Backbone;
use super::batch::Batch;
use super::config::{AffinityConfig, BlockEmbeddingMode, HeadConfig};
use super::error::ModelError;
use super::layers::{Mlp, index_tensor, reassemble, scatter_sum};
use super::params::ParamGroup;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::PoisonError;
use tracing::{debug, info, instrument};

pub const CONFIG_FILE: &str = "config.toml";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Output of a forward pass.
#[derive(Debug, Clone)]
pub struct PredictionReturnValue {
    /// Mean squared error against the batch labels, when the batch is labelled.
    pub loss: Option<Tensor>,
    /// Predicted energy per sample, shape `[num_samples]`.
    pub pred_energy: Tensor,
}

/// Projects external block embeddings to the hidden size and mixes them into the
/// block representations.
#[derive(Debug, Clone)]
struct MixingPath {
    projector: Mlp,
    mixing: Mlp,
}

impl MixingPath {
    fn new(
        embedding_size: usize,
        hidden_size: usize,
        head: &HeadConfig,
        projector: VarBuilder,
        mixing: VarBuilder,
    ) -> candle_core::Result<Self> {
        Ok(Self {
            projector: Mlp::new(
                embedding_size,
                head.projector_hidden_size,
                hidden_size,
                head.num_projector_layers,
                head.projector_dropout,
                head.nonlinearity,
                projector,
            )?,
            mixing: Mlp::new(
                2 * hidden_size,
                2 * hidden_size,
                hidden_size,
                head.num_projector_layers,
                head.projector_dropout,
                head.nonlinearity,
                mixing,
            )?,
        })
    }

    fn forward(&self, h: &Tensor, embeddings: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let projected = self.projector.forward(embeddings, train)?;
        self.mixing.forward(&Tensor::cat(&[h, &projected], 1)?, train)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Pre,
    Post,
}

#[derive(Debug, Clone)]
enum Mixing {
    None,
    Shared {
        pre: MixingPath,
        post: MixingPath,
    },
    PerSegment {
        pre: [MixingPath; 2],
        post: [MixingPath; 2],
    },
}

/// Block embeddings of a batch as device tensors, in the layout the mixing mode needs.
enum MixingInputs {
    None,
    Shared(Tensor),
    PerSegment([(Vec<u32>, Tensor); 2]),
}

fn rows_tensor(
    name: &'static str,
    rows: Option<&Vec<Vec<f32>>>,
    size: usize,
    device: &Device,
) -> Result<Tensor, ModelError> {
    let rows = rows.ok_or(ModelError::MissingBlockEmbeddings(name))?;
    if let Some(row) = rows.iter().find(|row| row.len() != size) {
        return Err(ModelError::InvalidBatch(format!(
            "'{name}' rows have width {}, the model expects {size}",
            row.len()
        )));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(flat, (rows.len(), size), device)?)
}

impl Mixing {
    fn new(
        mode: BlockEmbeddingMode,
        hidden_size: usize,
        head: &HeadConfig,
        vb: &VarBuilder,
    ) -> candle_core::Result<Self> {
        let path = |size: usize, projector: &str, mixing: &str| {
            MixingPath::new(size, hidden_size, head, vb.pp(projector), vb.pp(mixing))
        };
        Ok(match mode {
            BlockEmbeddingMode::None => Self::None,
            BlockEmbeddingMode::Shared { size } => Self::Shared {
                pre: path(size, "pre_projector", "pre_mixing_ffn")?,
                post: path(size, "post_projector", "post_mixing_ffn")?,
            },
            BlockEmbeddingMode::PerSegment { size0, size1 } => Self::PerSegment {
                pre: [
                    path(size0, "pre_projector0", "pre_mixing_ffn0")?,
                    path(size1, "pre_projector1", "pre_mixing_ffn1")?,
                ],
                post: [
                    path(size0, "post_projector0", "post_mixing_ffn0")?,
                    path(size1, "post_projector1", "post_mixing_ffn1")?,
                ],
            },
        })
    }

    fn inputs(
        &self,
        mode: BlockEmbeddingMode,
        batch: &Batch,
        device: &Device,
    ) -> Result<MixingInputs, ModelError> {
        Ok(match mode {
            BlockEmbeddingMode::None => MixingInputs::None,
            BlockEmbeddingMode::Shared { size } => MixingInputs::Shared(rows_tensor(
                "block_embeddings",
                batch.block_embeddings.as_ref(),
                size,
                device,
            )?),
            BlockEmbeddingMode::PerSegment { size0, size1 } => {
                let rows_of = |segment: u8| -> Vec<u32> {
                    (0..batch.num_blocks())
                        .filter(|&i| batch.segment_ids[i] == segment)
                        .map(|i| i as u32)
                        .collect()
                };
                MixingInputs::PerSegment([
                    (
                        rows_of(0),
                        rows_tensor(
                            "block_embeddings0",
                            batch.block_embeddings0.as_ref(),
                            size0,
                            device,
                        )?,
                    ),
                    (
                        rows_of(1),
                        rows_tensor(
                            "block_embeddings1",
                            batch.block_embeddings1.as_ref(),
                            size1,
                            device,
                        )?,
                    ),
                ])
            }
        })
    }

    fn apply(
        &self,
        stage: Stage,
        h: Tensor,
        inputs: &MixingInputs,
        train: bool,
    ) -> candle_core::Result<Tensor> {
        match (self, inputs) {
            (Self::Shared { pre, post }, MixingInputs::Shared(embeddings)) => {
                let path = match stage {
                    Stage::Pre => pre,
                    Stage::Post => post,
                };
                path.forward(&h, embeddings, train)
            }
            (Self::PerSegment { pre, post }, MixingInputs::PerSegment(segments)) => {
                let paths = match stage {
                    Stage::Pre => pre,
                    Stage::Post => post,
                };
                // Each segment is mixed separately and written back to its own rows.
                let mut parts = Vec::with_capacity(2);
                for (path, (rows, embeddings)) in paths.iter().zip(segments) {
                    if rows.is_empty() {
                        continue;
                    }
                    let selected = h.index_select(&index_tensor(rows, h.device())?, 0)?;
                    parts.push((rows.as_slice(), path.forward(&selected, embeddings, train)?));
                }
                let (n_rows, width) = h.dims2()?;
                reassemble(&parts, n_rows, width, h.device())
            }
            _ => Ok(h),
        }
    }
}

/// Block-level binding affinity regressor on top of the two-level encoder.
///
/// The predicted energy of a sample is the sum of per-block energies. With top-level
/// global message passing disabled, global blocks contribute nothing.
pub struct AffinityPredictor {
    config: AffinityConfig,
    mode: BlockEmbeddingMode,
    varmap: VarMap,
    device: Device,
    backbone: Backbone,
    mixing: Mixing,
    energy_ffn: Mlp,
    trainable: BTreeSet<ParamGroup>,
    training: bool,
}

impl std::fmt::Debug for AffinityPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityPredictor")
            .field("config", &self.config)
            .field("device", &self.device)
            .field("trainable", &self.trainable)
            .field("training", &self.training)
            .finish()
    }
}

impl AffinityPredictor {
    /// Builds a freshly initialized model. Starts in evaluation mode.
    pub fn new(config: AffinityConfig, device: &Device) -> Result<Self, ModelError> {
        let noise = &config.encoder.noise;
        if !noise.is_zero() {
            return Err(ModelError::NoisyPredictionModel {
                atom: noise.atom_noise,
                translation: noise.translation_noise,
                rotation: noise.rotation_noise,
                torsion: noise.torsion_noise,
            });
        }
        let mode = config.validate()?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let hidden_size = config.encoder.hidden_size;
        let head = &config.head;

        let backbone = Backbone::new(&config.encoder, vb.clone())?;
        let mixing = Mixing::new(mode, hidden_size, head, &vb)?;
        let energy_ffn = Mlp::new(
            hidden_size,
            head.affinity_pred_hidden_size,
            1,
            head.num_affinity_pred_layers,
            head.affinity_pred_dropout,
            head.nonlinearity,
            vb.pp("energy_ffn"),
        )?;

        let mut model = Self {
            config,
            mode,
            varmap,
            device: device.clone(),
            backbone,
            mixing,
            energy_ffn,
            trainable: BTreeSet::new(),
            training: false,
        };
        model.trainable = model.param_groups();
        debug!(
            parameters = model.varmap.all_vars().len(),
            "Initialized affinity predictor"
        );
        Ok(model)
    }

    pub fn get_config(&self) -> &AffinityConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn train(&mut self) {
        self.training = true;
    }

    pub fn eval(&mut self) {
        self.training = false;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    fn named_vars(&self) -> std::sync::MutexGuard<'_, HashMap<String, Var>> {
        self.varmap
            .data()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Every group that owns at least one parameter of this model.
    pub fn param_groups(&self) -> BTreeSet<ParamGroup> {
        self.named_vars()
            .keys()
            .filter_map(|name| ParamGroup::of(name))
            .collect()
    }

    pub fn is_trainable(&self, group: ParamGroup) -> bool {
        self.trainable.contains(&group)
    }

    pub fn trainable_groups(&self) -> &BTreeSet<ParamGroup> {
        &self.trainable
    }

    pub(crate) fn set_trainable(&mut self, groups: BTreeSet<ParamGroup>) {
        self.trainable = groups;
    }

    /// Parameters an optimizer should update, sorted by name.
    pub fn trainable_vars(&self) -> Vec<Var> {
        let vars = self.named_vars();
        let mut names: Vec<&String> = vars
            .keys()
            .filter(|name| ParamGroup::of(name).is_some_and(|g| self.trainable.contains(&g)))
            .collect();
        names.sort();
        names.into_iter().map(|name| vars[name].clone()).collect()
    }

    pub(crate) fn transfer_from(
        &self,
        source: &HashMap<String, Tensor>,
    ) -> Result<super::params::LoadReport, ModelError> {
        super::params::transfer(&self.named_vars(), source)
    }

    pub fn forward(&self, batch: &Batch) -> Result<PredictionReturnValue, ModelError> {
        batch.validate()?;
        let layout = batch.layout();
        let device = &self.device;
        let train = self.training;
        let n_blocks = batch.num_blocks();

        let inputs = self.mixing.inputs(self.mode, batch, device)?;
        let block_types = index_tensor(&batch.b, device)?;
        let top_h = self.backbone.embed_blocks(&block_types)?;
        let top_h = self.mixing.apply(Stage::Pre, top_h, &inputs, train)?;

        let block_repr = self.backbone.encode(batch, &layout, &top_h, train)?;
        let block_repr = self.mixing.apply(Stage::Post, block_repr, &inputs, train)?;

        let mut block_energy = self.energy_ffn.forward(&block_repr, train)?.squeeze(1)?;
        if !self.config.encoder.global_message_passing {
            let keep: Vec<f32> = layout
                .is_global_block
                .iter()
                .map(|&global| if global { 0.0 } else { 1.0 })
                .collect();
            block_energy = (block_energy * Tensor::from_vec(keep, n_blocks, device)?)?;
        }
        let pred_energy = scatter_sum(&block_energy, &layout.batch_id, batch.num_samples())?;

        // Labels are pK values while the summed energy is on an RT*ln(Kd) scale; no
        // conversion between the two is applied.
        let loss = match &batch.labels {
            Some(labels) => {
                let labels: Vec<f32> = labels.iter().map(|&l| l as f32).collect();
                let labels = Tensor::from_vec(labels, batch.num_samples(), device)?;
                Some(candle_nn::loss::mse(&pred_energy, &labels)?)
            }
            None => None,
        };
        Ok(PredictionReturnValue { loss, pred_energy })
    }

    /// Switches to evaluation mode and returns the detached per-sample energies.
    pub fn infer(&mut self, batch: &Batch) -> Result<Tensor, ModelError> {
        self.eval();
        Ok(self.forward(batch)?.pred_energy.detach())
    }

    /// Writes `config.toml` and `model.safetensors` into `dir`.
    #[instrument(skip_all, name = "save_model", fields(dir = %dir.display()))]
    pub fn save(&self, dir: &Path) -> Result<(), ModelError> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(CONFIG_FILE), self.config.to_toml_string()?)?;
        self.varmap.save(dir.join(WEIGHTS_FILE))?;
        info!("Saved affinity predictor");
        Ok(())
    }

    /// Rebuilds a model from a directory written by [`save`](Self::save).
    #[instrument(skip_all, name = "load_model", fields(dir = %dir.display()))]
    pub fn load(dir: &Path, device: &Device) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
        let config = AffinityConfig::from_toml_str(&text)?;
        let mut model = Self::new(config, device)?;
        model.varmap.load(dir.join(WEIGHTS_FILE))?;
        info!("Loaded affinity predictor");
        Ok(model)
    }
}
