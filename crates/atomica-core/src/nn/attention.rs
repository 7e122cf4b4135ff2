use candle_core::{Module, Result, Tensor};
use candle_nn::{Linear, VarBuilder, linear, ops::softmax_last_dim};

const MASK_PENALTY: f64 = 1e9;

/// Single-head attention from each block onto the atom representations of that block.
#[derive(Debug, Clone)]
pub struct AtomBlockAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    out: Linear,
    scale: f64,
}

impl AtomBlockAttention {
    pub fn new(hidden_size: usize, atom_hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            query: linear(hidden_size, hidden_size, vb.pp("q_proj"))?,
            key: linear(atom_hidden_size, hidden_size, vb.pp("k_proj"))?,
            value: linear(atom_hidden_size, hidden_size, vb.pp("v_proj"))?,
            out: linear(hidden_size, hidden_size, vb.pp("out_proj"))?,
            scale: 1.0 / (hidden_size as f64).sqrt(),
        })
    }

    /// `blocks` is `[G, H]`, `atoms` is `[G, L, Ha]` and `mask` is `[G, L]`; returns `[G, H]`.
    pub fn forward(&self, blocks: &Tensor, atoms: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let q = self.query.forward(blocks)?.unsqueeze(1)?;
        let k = self.key.forward(atoms)?;
        let v = self.value.forward(atoms)?;

        let scores = q
            .matmul(&k.transpose(1, 2)?.contiguous()?)?
            .squeeze(1)?
            .affine(self.scale, 0.0)?;
        let weights = masked_softmax(&scores, mask)?;
        let context = weights.unsqueeze(1)?.matmul(&v.contiguous()?)?.squeeze(1)?;
        self.out.forward(&context)
    }
}

/// Softmax over the last dimension restricted to `mask == 1`. Fully masked rows are zero.
pub(crate) fn masked_softmax(scores: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let penalty = mask.affine(MASK_PENALTY, -MASK_PENALTY)?;
    softmax_last_dim(&(scores + penalty)?)? * mask
}
