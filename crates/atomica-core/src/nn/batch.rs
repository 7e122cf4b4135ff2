use super::error::ModelError;
use super::layers::lengths_to_ids;
use crate::core::graph::GraphData;
use crate::core::vocab::Vocab;

/// Several [`GraphData`] samples concatenated into one forward-pass input.
///
/// Per-block arrays (`b`, `block_lengths`, `segment_ids`) and per-atom arrays (`x`, `a`)
/// are concatenated in sample order; `lengths` holds the number of blocks per sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub x: Vec<[f64; 3]>,
    pub a: Vec<u32>,
    pub b: Vec<u32>,
    pub block_lengths: Vec<usize>,
    pub lengths: Vec<usize>,
    pub segment_ids: Vec<u8>,
    /// One label per sample, present only when every sample is labelled.
    pub labels: Option<Vec<f64>>,
    /// One embedding row per block.
    pub block_embeddings: Option<Vec<Vec<f32>>>,
    /// One embedding row per segment-0 block, in batch order.
    pub block_embeddings0: Option<Vec<Vec<f32>>>,
    /// One embedding row per segment-1 block, in batch order.
    pub block_embeddings1: Option<Vec<Vec<f32>>>,
}

fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::InvalidBatch(message.into())
}

fn check_embedding_rows(
    name: &str,
    rows: &[Vec<f32>],
    expected_rows: usize,
) -> Result<(), ModelError> {
    if rows.len() != expected_rows {
        return Err(invalid(format!(
            "'{name}' has {} rows but {expected_rows} blocks need one",
            rows.len()
        )));
    }
    if let Some(first) = rows.first() {
        if rows.iter().any(|row| row.len() != first.len()) {
            return Err(invalid(format!("'{name}' rows differ in width")));
        }
    }
    Ok(())
}

impl Batch {
    /// Concatenates samples. Labels are kept only when every sample has one.
    pub fn collate<'a, I>(items: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (&'a GraphData, Option<f64>)>,
    {
        let mut batch = Batch::default();
        let mut labels = Vec::new();
        let mut all_labelled = true;

        for (data, label) in items {
            batch.x.extend_from_slice(&data.x);
            batch.a.extend_from_slice(&data.a);
            batch.b.extend_from_slice(&data.b);
            batch.block_lengths.extend_from_slice(&data.block_lengths);
            batch.segment_ids.extend_from_slice(&data.segment_ids);
            batch.lengths.push(data.num_blocks());
            match label {
                Some(value) => labels.push(value),
                None => all_labelled = false,
            }
        }

        if batch.lengths.is_empty() {
            return Err(invalid("a batch needs at least one sample"));
        }
        batch.labels = all_labelled.then_some(labels);
        batch.validate()?;
        Ok(batch)
    }

    /// Attaches one shared-path embedding row per block.
    pub fn with_block_embeddings(mut self, rows: Vec<Vec<f32>>) -> Result<Self, ModelError> {
        check_embedding_rows("block_embeddings", &rows, self.num_blocks())?;
        self.block_embeddings = Some(rows);
        Ok(self)
    }

    /// Attaches per-segment embedding rows, each in the batch order of that segment's blocks.
    pub fn with_segment_block_embeddings(
        mut self,
        rows0: Vec<Vec<f32>>,
        rows1: Vec<Vec<f32>>,
    ) -> Result<Self, ModelError> {
        check_embedding_rows("block_embeddings0", &rows0, self.segment_len(0))?;
        check_embedding_rows("block_embeddings1", &rows1, self.segment_len(1))?;
        self.block_embeddings0 = Some(rows0);
        self.block_embeddings1 = Some(rows1);
        Ok(self)
    }

    pub fn num_samples(&self) -> usize {
        self.lengths.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.b.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.x.len()
    }

    pub fn segment_len(&self, segment: u8) -> usize {
        self.segment_ids.iter().filter(|&&s| s == segment).count()
    }

    /// Checks that the per-block, per-atom and per-sample arrays agree with each other.
    pub fn validate(&self) -> Result<(), ModelError> {
        let vocab = Vocab::global();
        let n_blocks = self.num_blocks();
        let n_atoms = self.num_atoms();

        if self.a.len() != n_atoms {
            return Err(invalid(format!(
                "{} atom types for {n_atoms} coordinates",
                self.a.len()
            )));
        }
        if self.block_lengths.len() != n_blocks || self.segment_ids.len() != n_blocks {
            return Err(invalid(
                "block_lengths and segment_ids need one entry per block",
            ));
        }
        if self.block_lengths.iter().sum::<usize>() != n_atoms {
            return Err(invalid("block_lengths do not sum to the number of atoms"));
        }
        if self.lengths.iter().sum::<usize>() != n_blocks {
            return Err(invalid("lengths do not sum to the number of blocks"));
        }
        if self.segment_ids.iter().any(|&s| s > 1) {
            return Err(invalid("segment ids must be 0 or 1"));
        }
        if let Some(&b) = self
            .b
            .iter()
            .find(|&&b| b as usize >= vocab.num_block_types())
        {
            return Err(invalid(format!("block type id {b} is outside the vocabulary")));
        }
        if let Some(&a) = self.a.iter().find(|&&a| a as usize >= vocab.num_atom_types()) {
            return Err(invalid(format!("atom type id {a} is outside the vocabulary")));
        }
        if let Some(labels) = &self.labels {
            if labels.len() != self.num_samples() {
                return Err(invalid(format!(
                    "{} labels for {} samples",
                    labels.len(),
                    self.num_samples()
                )));
            }
        }
        if let Some(rows) = &self.block_embeddings {
            check_embedding_rows("block_embeddings", rows, n_blocks)?;
        }
        if let Some(rows) = &self.block_embeddings0 {
            check_embedding_rows("block_embeddings0", rows, self.segment_len(0))?;
        }
        if let Some(rows) = &self.block_embeddings1 {
            check_embedding_rows("block_embeddings1", rows, self.segment_len(1))?;
        }
        Ok(())
    }

    pub(crate) fn layout(&self) -> BatchLayout {
        let vocab = Vocab::global();
        let batch_id = lengths_to_ids(&self.lengths);
        let block_id = lengths_to_ids(&self.block_lengths);

        let atom_batch_id = block_id.iter().map(|&b| batch_id[b as usize]).collect();
        let atom_segment_ids = block_id
            .iter()
            .map(|&b| self.segment_ids[b as usize])
            .collect();
        let is_global_atom = self.a.iter().map(|&a| a == vocab.global_atom_idx()).collect();
        let is_global_block = self
            .b
            .iter()
            .map(|&b| b == vocab.global_block_idx())
            .collect();

        let mut sums = vec![[0.0f64; 3]; self.num_blocks()];
        for (pos, &block) in self.x.iter().zip(&block_id) {
            let sum = &mut sums[block as usize];
            for axis in 0..3 {
                sum[axis] += pos[axis];
            }
        }
        let block_positions = sums
            .into_iter()
            .zip(&self.block_lengths)
            .map(|(sum, &len)| {
                let n = len.max(1) as f64;
                [sum[0] / n, sum[1] / n, sum[2] / n]
            })
            .collect();

        BatchLayout {
            batch_id,
            block_id,
            atom_batch_id,
            atom_segment_ids,
            is_global_atom,
            is_global_block,
            block_positions,
        }
    }
}

/// Host-side index bookkeeping derived from a validated [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BatchLayout {
    /// Sample of each block.
    pub batch_id: Vec<u32>,
    /// Block of each atom.
    pub block_id: Vec<u32>,
    pub atom_batch_id: Vec<u32>,
    pub atom_segment_ids: Vec<u8>,
    pub is_global_atom: Vec<bool>,
    pub is_global_block: Vec<bool>,
    /// Mean atom position of each block.
    pub block_positions: Vec<[f64; 3]>,
}
