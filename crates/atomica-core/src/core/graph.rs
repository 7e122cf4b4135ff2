use crate::core::models::block::Block;
use crate::core::utils::geometry::{centroid, to_array};
use crate::core::vocab::Vocab;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A two-segment interface flattened into the arrays the model consumes.
///
/// Atoms are laid out block by block. Every segment starts with a global block made of
/// a single global atom at the segment centroid, and every real block starts with a
/// global atom at the block centroid followed by the block's own atoms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphData {
    /// Atom coordinates.
    pub x: Vec<[f64; 3]>,
    /// Atom type ids.
    pub a: Vec<u32>,
    /// Block type ids.
    pub b: Vec<u32>,
    /// Number of atoms in each block.
    pub block_lengths: Vec<usize>,
    /// Segment (0 or 1) of each block.
    pub segment_ids: Vec<u8>,
}

impl GraphData {
    pub fn num_blocks(&self) -> usize {
        self.b.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.x.len()
    }

    fn push_segment(&mut self, blocks: &[Block], segment: u8, vocab: &Vocab) {
        let segment_center = centroid(blocks.iter().flat_map(|b| b.positions()))
            .unwrap_or_else(Point3::origin);
        self.b.push(vocab.global_block_idx());
        self.x.push(to_array(&segment_center));
        self.a.push(vocab.global_atom_idx());
        self.block_lengths.push(1);
        self.segment_ids.push(segment);

        for block in blocks {
            let block_center = block.centroid().unwrap_or(segment_center);
            self.b.push(vocab.symbol_to_idx(&block.symbol));
            self.x.push(to_array(&block_center));
            self.a.push(vocab.global_atom_idx());
            for atom in block.atoms() {
                self.x.push(atom.coords());
                self.a.push(vocab.atom_to_idx(&atom.element));
            }
            self.block_lengths.push(block.len() + 1);
            self.segment_ids.push(segment);
        }
    }
}

/// Builds the model input for an interface between two block lists.
pub fn blocks_to_data(segment0: &[Block], segment1: &[Block]) -> GraphData {
    let vocab = Vocab::global();
    let mut data = GraphData::default();
    data.push_segment(segment0, 0, vocab);
    data.push_segment(segment1, 1, vocab);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::block_at;

    #[test]
    fn lays_out_global_slots_and_blocks() {
        let vocab = Vocab::global();
        let seg0 = vec![
            block_at("A", &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]),
            block_at("G", &[[4.0, 0.0, 0.0]]),
        ];
        let seg1 = vec![block_at("c", &[[10.0, 0.0, 0.0]])];
        let data = blocks_to_data(&seg0, &seg1);

        assert_eq!(data.num_blocks(), 5);
        assert_eq!(data.block_lengths, vec![1, 3, 2, 1, 2]);
        assert_eq!(data.segment_ids, vec![0, 0, 0, 1, 1]);
        assert_eq!(data.block_lengths.iter().sum::<usize>(), data.num_atoms());
        assert_eq!(data.b[0], vocab.global_block_idx());
        assert_eq!(data.b[3], vocab.global_block_idx());
        assert_eq!(data.b[1], vocab.symbol_to_idx("A"));
        assert_eq!(data.b[4], vocab.symbol_to_idx("c"));
    }

    #[test]
    fn global_atoms_sit_at_centroids() {
        let vocab = Vocab::global();
        let seg0 = vec![block_at("A", &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]])];
        let seg1 = vec![block_at("G", &[[9.0, 3.0, 0.0]])];
        let data = blocks_to_data(&seg0, &seg1);

        // Segment 0: global block, then [global atom, C, C].
        assert_eq!(data.x[0], [1.0, 0.0, 0.0]);
        assert_eq!(data.x[1], [1.0, 0.0, 0.0]);
        assert_eq!(data.x[2], [0.0, 0.0, 0.0]);
        assert_eq!(data.a[1], vocab.global_atom_idx());
        assert_eq!(data.a[2], vocab.atom_to_idx("C"));
        // Segment 1 global atom.
        assert_eq!(data.x[4], [9.0, 3.0, 0.0]);
        assert_eq!(data.a[4], vocab.global_atom_idx());
    }
}
