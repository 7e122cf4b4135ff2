use super::error::ModelError;
use candle_core::{Tensor, Var};
use std::collections::HashMap;
use tracing::warn;

/// Named parameter groups of the affinity predictor, keyed by parameter-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamGroup {
    BlockEmbedding,
    EdgeEmbeddingBottom,
    EdgeEmbeddingTop,
    Encoder,
    TopEncoder,
    AtomBlockAttn,
    AtomBlockAttnNorm,
    EnergyFfn,
    PreProjector,
    PreMixingFfn,
    PostProjector,
    PostMixingFfn,
    PreProjector0,
    PreProjector1,
    PreMixingFfn0,
    PreMixingFfn1,
    PostProjector0,
    PostProjector1,
    PostMixingFfn0,
    PostMixingFfn1,
}

impl ParamGroup {
    pub const ALL: [ParamGroup; 20] = [
        Self::BlockEmbedding,
        Self::EdgeEmbeddingBottom,
        Self::EdgeEmbeddingTop,
        Self::Encoder,
        Self::TopEncoder,
        Self::AtomBlockAttn,
        Self::AtomBlockAttnNorm,
        Self::EnergyFfn,
        Self::PreProjector,
        Self::PreMixingFfn,
        Self::PostProjector,
        Self::PostMixingFfn,
        Self::PreProjector0,
        Self::PreProjector1,
        Self::PreMixingFfn0,
        Self::PreMixingFfn1,
        Self::PostProjector0,
        Self::PostProjector1,
        Self::PostMixingFfn0,
        Self::PostMixingFfn1,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::BlockEmbedding => "block_embedding",
            Self::EdgeEmbeddingBottom => "edge_embedding_bottom",
            Self::EdgeEmbeddingTop => "edge_embedding_top",
            Self::Encoder => "encoder",
            Self::TopEncoder => "top_encoder",
            Self::AtomBlockAttn => "atom_block_attn",
            Self::AtomBlockAttnNorm => "atom_block_attn_norm",
            Self::EnergyFfn => "energy_ffn",
            Self::PreProjector => "pre_projector",
            Self::PreMixingFfn => "pre_mixing_ffn",
            Self::PostProjector => "post_projector",
            Self::PostMixingFfn => "post_mixing_ffn",
            Self::PreProjector0 => "pre_projector0",
            Self::PreProjector1 => "pre_projector1",
            Self::PreMixingFfn0 => "pre_mixing_ffn0",
            Self::PreMixingFfn1 => "pre_mixing_ffn1",
            Self::PostProjector0 => "post_projector0",
            Self::PostProjector1 => "post_projector1",
            Self::PostMixingFfn0 => "post_mixing_ffn0",
            Self::PostMixingFfn1 => "post_mixing_ffn1",
        }
    }

    /// Backbone groups must be transferred from a pretrained model; heads may be
    /// freshly initialized.
    pub fn is_backbone(&self) -> bool {
        matches!(
            self,
            Self::BlockEmbedding
                | Self::EdgeEmbeddingBottom
                | Self::EdgeEmbeddingTop
                | Self::Encoder
                | Self::TopEncoder
                | Self::AtomBlockAttn
                | Self::AtomBlockAttnNorm
        )
    }

    /// The group a parameter name belongs to.
    pub fn of(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| {
            name.strip_prefix(group.prefix())
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Outcome of a pretrained weight transfer. All lists are sorted by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Parameters copied from the source.
    pub transferred: Vec<String>,
    /// Backbone parameters the source did not provide.
    pub missing: Vec<String>,
    /// Head parameters left at their fresh initialization.
    pub fresh: Vec<String>,
    /// Source tensors with no counterpart in the model.
    pub unexpected: Vec<String>,
}

enum Plan<'a> {
    Copy(&'a Var, &'a Tensor),
    Missing,
    Fresh,
}

/// Copies `source` tensors into `target` variables following the group rules.
///
/// All shapes are checked before anything is written, so a backbone shape mismatch
/// leaves the target untouched.
pub(crate) fn transfer(
    target: &HashMap<String, Var>,
    source: &HashMap<String, Tensor>,
) -> Result<LoadReport, ModelError> {
    let mut names: Vec<&String> = target.keys().collect();
    names.sort();

    let mut plans = Vec::with_capacity(names.len());
    for name in names {
        let var = &target[name];
        let backbone = ParamGroup::of(name).is_none_or(|g| g.is_backbone());
        let plan = match source.get(name) {
            Some(tensor) if tensor.dims() == var.dims() => Plan::Copy(var, tensor),
            Some(tensor) if backbone => {
                return Err(ModelError::ShapeMismatch {
                    name: name.clone(),
                    expected: var.dims().to_vec(),
                    found: tensor.dims().to_vec(),
                });
            }
            Some(_) => Plan::Fresh,
            None if backbone => Plan::Missing,
            None => Plan::Fresh,
        };
        plans.push((name, plan));
    }

    let mut report = LoadReport::default();
    for (name, plan) in plans {
        match plan {
            Plan::Copy(var, tensor) => {
                var.set(&tensor.to_dtype(var.dtype())?.to_device(var.device())?)?;
                report.transferred.push(name.clone());
            }
            Plan::Missing => {
                warn!(parameter = %name, "Pretrained weights lack a backbone parameter");
                report.missing.push(name.clone());
            }
            Plan::Fresh => report.fresh.push(name.clone()),
        }
    }

    report.unexpected = source
        .keys()
        .filter(|name| !target.contains_key(*name))
        .cloned()
        .collect();
    report.unexpected.sort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn var(dims: (usize, usize), value: f64) -> Var {
        let tensor = (Tensor::ones(dims, DType::F32, &Device::Cpu).unwrap() * value).unwrap();
        Var::from_tensor(&tensor).unwrap()
    }

    fn tensor(dims: (usize, usize), value: f64) -> Tensor {
        (Tensor::ones(dims, DType::F32, &Device::Cpu).unwrap() * value).unwrap()
    }

    #[test]
    fn groups_match_whole_prefix_segments() {
        assert_eq!(
            ParamGroup::of("atom_block_attn.q_proj.weight"),
            Some(ParamGroup::AtomBlockAttn)
        );
        assert_eq!(
            ParamGroup::of("atom_block_attn_norm.weight"),
            Some(ParamGroup::AtomBlockAttnNorm)
        );
        assert_eq!(
            ParamGroup::of("top_encoder.layers.0.norm.bias"),
            Some(ParamGroup::TopEncoder)
        );
        assert_eq!(
            ParamGroup::of("pre_projector1.0.weight"),
            Some(ParamGroup::PreProjector1)
        );
        assert_eq!(ParamGroup::of("denoise_head.weight"), None);
        assert!(ParamGroup::Encoder.is_backbone());
        assert!(!ParamGroup::EnergyFfn.is_backbone());
    }

    #[test]
    fn transfer_sorts_parameters_into_report_lists() {
        let target = HashMap::from([
            ("encoder.layers.0.w".to_string(), var((2, 2), 0.0)),
            ("top_encoder.layers.0.w".to_string(), var((2, 2), 0.0)),
            ("energy_ffn.0.weight".to_string(), var((3, 2), 0.0)),
            ("pre_projector.0.weight".to_string(), var((2, 2), 0.0)),
        ]);
        let source = HashMap::from([
            ("encoder.layers.0.w".to_string(), tensor((2, 2), 1.0)),
            ("energy_ffn.0.weight".to_string(), tensor((4, 2), 1.0)),
            ("noise_ffn.weight".to_string(), tensor((1, 1), 1.0)),
        ]);

        let report = transfer(&target, &source).unwrap();
        assert_eq!(report.transferred, vec!["encoder.layers.0.w"]);
        assert_eq!(report.missing, vec!["top_encoder.layers.0.w"]);
        assert_eq!(
            report.fresh,
            vec!["energy_ffn.0.weight", "pre_projector.0.weight"]
        );
        assert_eq!(report.unexpected, vec!["noise_ffn.weight"]);

        let copied = target["encoder.layers.0.w"].as_tensor().to_vec2::<f32>().unwrap();
        assert_eq!(copied, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);
    }

    #[test]
    fn backbone_shape_mismatch_fails_without_writing() {
        let target = HashMap::from([
            ("block_embedding.atom_embedding.weight".to_string(), var((2, 2), 0.0)),
            ("encoder.layers.0.w".to_string(), var((2, 2), 0.0)),
        ]);
        let source = HashMap::from([
            ("block_embedding.atom_embedding.weight".to_string(), tensor((2, 2), 1.0)),
            ("encoder.layers.0.w".to_string(), tensor((3, 2), 1.0)),
        ]);

        let result = transfer(&target, &source);
        assert!(matches!(
            result,
            Err(ModelError::ShapeMismatch { ref name, .. }) if name == "encoder.layers.0.w"
        ));
        let untouched = target["block_embedding.atom_embedding.weight"]
            .as_tensor()
            .to_vec2::<f32>()
            .unwrap();
        assert_eq!(untouched[0], vec![0.0, 0.0]);
    }
}
