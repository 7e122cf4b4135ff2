use super::edges::EdgeTensors;
use candle_core::{D, Device, Module, Result, Tensor};
use candle_nn::{Dropout, LayerNorm, Linear, VarBuilder, layer_norm, linear};

const RBF_CENTERS: usize = 16;
const RBF_CUTOFF: f64 = 20.0;
const LAYER_NORM_EPS: f64 = 1e-5;

/// Gaussian expansion of edge lengths on evenly spaced centers over `[0, RBF_CUTOFF]`.
fn radial_basis(distances: &Tensor, device: &Device) -> Result<Tensor> {
    let spacing = RBF_CUTOFF / (RBF_CENTERS - 1) as f64;
    let centers: Vec<f32> = (0..RBF_CENTERS)
        .map(|i| (i as f64 * spacing) as f32)
        .collect();
    let centers = Tensor::from_vec(centers, (1, RBF_CENTERS), device)?;
    let gamma = 1.0 / (spacing * spacing);
    distances
        .broadcast_sub(&centers)?
        .sqr()?
        .affine(-gamma, 0.0)?
        .exp()
}

/// One rotation-invariant message-passing layer.
///
/// Messages are computed from both endpoint features, the radial expansion of the edge
/// length and the edge-kind embedding, summed at the receiving node and applied as a
/// residual update followed by layer normalization.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    edge_in: Linear,
    edge_out: Linear,
    node_in: Linear,
    node_out: Linear,
    norm: LayerNorm,
    dropout: Dropout,
    hidden_size: usize,
}

impl EncoderLayer {
    pub fn new(hidden_size: usize, edge_size: usize, dropout: f64, vb: VarBuilder) -> Result<Self> {
        let message_in = 2 * hidden_size + RBF_CENTERS + edge_size;
        Ok(Self {
            edge_in: linear(message_in, hidden_size, vb.pp("edge_mlp.0"))?,
            edge_out: linear(hidden_size, hidden_size, vb.pp("edge_mlp.1"))?,
            node_in: linear(2 * hidden_size, hidden_size, vb.pp("node_mlp.0"))?,
            node_out: linear(hidden_size, hidden_size, vb.pp("node_mlp.1"))?,
            norm: layer_norm(hidden_size, LAYER_NORM_EPS, vb.pp("norm"))?,
            dropout: Dropout::new(dropout as f32),
            hidden_size,
        })
    }

    pub(crate) fn forward(
        &self,
        h: &Tensor,
        positions: &Tensor,
        edges: &EdgeTensors,
        edge_attr: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let n = h.dim(0)?;
        let aggregated = if edges.len == 0 {
            Tensor::zeros((n, self.hidden_size), h.dtype(), h.device())?
        } else {
            let h_dst = h.index_select(&edges.dst, 0)?;
            let h_src = h.index_select(&edges.src, 0)?;
            let offsets = (positions.index_select(&edges.dst, 0)?
                - positions.index_select(&edges.src, 0)?)?;
            let distances = offsets.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
            let rbf = radial_basis(&distances, h.device())?;

            let message_in = Tensor::cat(&[&h_dst, &h_src, &rbf, edge_attr], 1)?;
            let messages = self.edge_in.forward(&message_in)?.silu()?;
            let messages = self.edge_out.forward(&messages)?.silu()?;
            Tensor::zeros((n, self.hidden_size), h.dtype(), h.device())?
                .index_add(&edges.dst, &messages, 0)?
        };

        let update = self
            .node_in
            .forward(&Tensor::cat(&[h, &aggregated], 1)?)?
            .silu()?;
        let update = self.node_out.forward(&update)?;
        let update = self.dropout.forward(&update, train)?;
        self.norm.forward(&(h + update)?)
    }
}

/// A stack of [`EncoderLayer`]s sharing one edge set, under `layers.{i}`.
#[derive(Debug, Clone)]
pub struct Encoder {
    layers: Vec<EncoderLayer>,
}

impl Encoder {
    pub fn new(
        hidden_size: usize,
        edge_size: usize,
        n_layers: usize,
        dropout: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        let vb = vb.pp("layers");
        let layers = (0..n_layers)
            .map(|i| EncoderLayer::new(hidden_size, edge_size, dropout, vb.pp(i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub(crate) fn forward(
        &self,
        h: &Tensor,
        positions: &Tensor,
        edges: &EdgeTensors,
        edge_attr: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let mut h = h.clone();
        for layer in &self.layers {
            h = layer.forward(&h, positions, edges, edge_attr, train)?;
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::edges::{EdgeKind, EdgeList};
    use candle_core::DType;
    use candle_nn::{Embedding, VarMap, embedding};

    fn setup(varmap: &VarMap) -> (Encoder, Embedding) {
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
        let encoder = Encoder::new(8, 4, 2, 0.0, vb.pp("encoder")).unwrap();
        let kinds = embedding(4, 4, vb.pp("edge_embedding")).unwrap();
        (encoder, kinds)
    }

    fn run(encoder: &Encoder, kinds: &Embedding, positions: &[[f32; 3]]) -> Tensor {
        let dev = Device::Cpu;
        let mut edges = EdgeList::default();
        edges.src = vec![0, 1, 1, 2];
        edges.dst = vec![1, 0, 2, 1];
        edges.kinds = vec![EdgeKind::Intra; 4];
        let edges = edges.to_tensors(&dev).unwrap();
        let attr = kinds.forward(&edges.kinds).unwrap();

        let h = Tensor::arange(0f32, 24.0, &dev)
            .unwrap()
            .reshape((3, 8))
            .unwrap()
            .affine(0.1, 0.0)
            .unwrap();
        let flat: Vec<f32> = positions.iter().flatten().copied().collect();
        let z = Tensor::from_vec(flat, (positions.len(), 3), &dev).unwrap();
        encoder.forward(&h, &z, &edges, &attr, false).unwrap()
    }

    #[test]
    fn output_is_invariant_to_rigid_translation() {
        let varmap = VarMap::new();
        let (encoder, kinds) = setup(&varmap);
        let base = [[0f32, 0.0, 0.0], [1.5, 0.0, 0.0], [1.5, 1.5, 0.0]];
        let moved = base.map(|p| [p[0] + 7.0, p[1] - 3.0, p[2] + 2.0]);

        let a = run(&encoder, &kinds, &base).to_vec2::<f32>().unwrap();
        let b = run(&encoder, &kinds, &moved).to_vec2::<f32>().unwrap();
        for (row_a, row_b) in a.iter().zip(&b) {
            for (x, y) in row_a.iter().zip(row_b) {
                assert!((x - y).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn empty_edge_set_keeps_shape() {
        let varmap = VarMap::new();
        let (encoder, _) = setup(&varmap);
        let dev = Device::Cpu;
        let edges = EdgeList::default().to_tensors(&dev).unwrap();
        let attr = Tensor::zeros((0, 4), DType::F32, &dev).unwrap();
        let h = Tensor::ones((2, 8), DType::F32, &dev).unwrap();
        let z = Tensor::zeros((2, 3), DType::F32, &dev).unwrap();
        let out = encoder.forward(&h, &z, &edges, &attr, false).unwrap();
        assert_eq!(out.dims(), &[2, 8]);
    }
}
