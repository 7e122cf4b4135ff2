use super::attention::AtomBlockAttention;
use super::batch::{Batch, BatchLayout};
use super::config::EncoderConfig;
use super::edges::{EdgeList, EdgeTensors, NUM_EDGE_KINDS, Units, atom_edges, block_edges};
use super::encoder::Encoder;
use super::layers::{batchify, index_tensor};
use crate::core::vocab::Vocab;
use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{Embedding, LayerNorm, VarBuilder, embedding, layer_norm};

fn positions_tensor(positions: &[[f64; 3]], device: &Device) -> Result<Tensor> {
    let flat: Vec<f32> = positions.iter().flatten().map(|&v| v as f32).collect();
    Tensor::from_vec(flat, (positions.len(), 3), device)
}

/// The pretrained part of the model: embeddings, both message-passing levels and the
/// atom-to-block attention that links them.
#[derive(Debug, Clone)]
pub struct Backbone {
    atom_embedding: Embedding,
    block_embedding: Embedding,
    edge_embedding_bottom: Embedding,
    edge_embedding_top: Embedding,
    encoder: Encoder,
    top_encoder: Encoder,
    atom_block_attn: AtomBlockAttention,
    atom_block_attn_norm: LayerNorm,
    config: EncoderConfig,
}

impl Backbone {
    pub fn new(config: &EncoderConfig, vb: VarBuilder) -> Result<Self> {
        let vocab = Vocab::global();
        let embeddings = vb.pp("block_embedding");
        Ok(Self {
            atom_embedding: embedding(
                vocab.num_atom_types(),
                config.atom_hidden_size,
                embeddings.pp("atom_embedding"),
            )?,
            block_embedding: embedding(
                vocab.num_block_types(),
                config.hidden_size,
                embeddings.pp("block_embedding"),
            )?,
            edge_embedding_bottom: embedding(
                NUM_EDGE_KINDS,
                config.edge_size,
                vb.pp("edge_embedding_bottom"),
            )?,
            edge_embedding_top: embedding(
                NUM_EDGE_KINDS,
                config.edge_size,
                vb.pp("edge_embedding_top"),
            )?,
            encoder: Encoder::new(
                config.atom_hidden_size,
                config.edge_size,
                config.n_layers,
                config.dropout,
                vb.pp("encoder"),
            )?,
            top_encoder: Encoder::new(
                config.hidden_size,
                config.edge_size,
                config.n_layers,
                config.dropout,
                vb.pp("top_encoder"),
            )?,
            atom_block_attn: AtomBlockAttention::new(
                config.hidden_size,
                config.atom_hidden_size,
                vb.pp("atom_block_attn"),
            )?,
            atom_block_attn_norm: layer_norm(
                config.hidden_size,
                1e-5,
                vb.pp("atom_block_attn_norm"),
            )?,
            config: config.clone(),
        })
    }

    /// Initial block representations from block types.
    pub(crate) fn embed_blocks(&self, block_types: &Tensor) -> Result<Tensor> {
        self.block_embedding.forward(block_types)
    }

    fn edge_features(
        &self,
        table: &Embedding,
        edges: &EdgeList,
        device: &Device,
    ) -> Result<(EdgeTensors, Tensor)> {
        let tensors = edges.to_tensors(device)?;
        let features = if edges.is_empty() {
            Tensor::zeros((0, self.config.edge_size), DType::F32, device)?
        } else {
            table.forward(&tensors.kinds)?
        };
        Ok((tensors, features))
    }

    /// Runs atom-level message passing, folds atoms into their blocks through attention
    /// and runs block-level message passing. Returns one row per block.
    pub(crate) fn encode(
        &self,
        batch: &Batch,
        layout: &BatchLayout,
        top_h: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let device = top_h.device();
        let k = self.config.k_neighbors;
        let n_blocks = batch.num_blocks();

        let atom_types = index_tensor(&batch.a, device)?;
        let bottom_h = self.atom_embedding.forward(&atom_types)?;
        let atom_positions = positions_tensor(&batch.x, device)?;
        let atom_units = Units {
            positions: &batch.x,
            batch_id: &layout.atom_batch_id,
            segment_ids: &layout.atom_segment_ids,
            is_global: &layout.is_global_atom,
        };
        let bottom_edges = atom_edges(
            &atom_units,
            &layout.block_id,
            &layout.is_global_block,
            k,
            self.config.bottom_global_message_passing,
        );
        let (edges, edge_attr) =
            self.edge_features(&self.edge_embedding_bottom, &bottom_edges, device)?;
        let bottom_repr = self
            .encoder
            .forward(&bottom_h, &atom_positions, &edges, &edge_attr, train)?;

        // Global atoms only join their block's attention when they took part in messaging.
        let kept: Vec<u32> = (0..batch.num_atoms())
            .filter(|&i| self.config.bottom_global_message_passing || !layout.is_global_atom[i])
            .map(|i| i as u32)
            .collect();
        let kept_blocks: Vec<u32> = kept
            .iter()
            .map(|&i| layout.block_id[i as usize])
            .collect();
        let kept_repr = if kept.len() == batch.num_atoms() {
            bottom_repr
        } else if kept.is_empty() {
            Tensor::zeros((0, self.config.atom_hidden_size), DType::F32, device)?
        } else {
            bottom_repr.index_select(&index_tensor(&kept, device)?, 0)?
        };
        let (padded, mask) = batchify(&kept_repr, &kept_blocks, n_blocks)?;
        let from_atoms = self.atom_block_attn.forward(top_h, &padded, &mask)?;
        let top_h = self.atom_block_attn_norm.forward(&(top_h + from_atoms)?)?;

        let block_positions = positions_tensor(&layout.block_positions, device)?;
        let block_units = Units {
            positions: &layout.block_positions,
            batch_id: &layout.batch_id,
            segment_ids: &batch.segment_ids,
            is_global: &layout.is_global_block,
        };
        let top_edges = block_edges(&block_units, k, self.config.global_message_passing);
        let (edges, edge_attr) =
            self.edge_features(&self.edge_embedding_top, &top_edges, device)?;
        self.top_encoder
            .forward(&top_h, &block_positions, &edges, &edge_attr, train)
    }
}
