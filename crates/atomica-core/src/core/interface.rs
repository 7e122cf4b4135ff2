use crate::core::models::block::Block;
use crate::core::utils::geometry::to_array;
use kiddo::{KdTree, SquaredEuclidean};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Blocks of both sides that face each other, with their positions in the inputs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interface {
    pub blocks_a: Vec<Block>,
    pub blocks_b: Vec<Block>,
    pub indexes_a: Vec<usize>,
    pub indexes_b: Vec<usize>,
}

impl Interface {
    /// `true` when either side kept no block.
    pub fn is_empty(&self) -> bool {
        self.blocks_a.is_empty() || self.blocks_b.is_empty()
    }
}

fn atom_tree(blocks: &[Block]) -> Option<KdTree<f64, 3>> {
    let positions: Vec<[f64; 3]> = blocks
        .iter()
        .flat_map(|b| b.positions().map(to_array))
        .collect();
    if positions.is_empty() {
        return None;
    }
    Some((&positions).into())
}

fn is_near(block: &Block, tree: &KdTree<f64, 3>, dist_th_sq: f64) -> bool {
    block.positions().any(|p| {
        let nearest = tree.nearest_one::<SquaredEuclidean>(&to_array(p));
        nearest.distance <= dist_th_sq
    })
}

fn near_indexes(blocks: &[Block], tree: &KdTree<f64, 3>, dist_th_sq: f64) -> Vec<usize> {
    #[cfg(not(feature = "parallel"))]
    let kept = blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| is_near(block, tree, dist_th_sq))
        .map(|(i, _)| i)
        .collect();

    #[cfg(feature = "parallel")]
    let kept = blocks
        .par_iter()
        .enumerate()
        .filter(|(_, block)| is_near(block, tree, dist_th_sq))
        .map(|(i, _)| i)
        .collect();

    kept
}

/// Selects the blocks of `blocks_a` and `blocks_b` that have at least one atom within
/// `dist_th` Angstroms (inclusive) of any atom on the other side.
///
/// Kept blocks stay in input order. If either input is empty, or nothing is within
/// range, the result is empty on both sides.
pub fn blocks_interface(blocks_a: &[Block], blocks_b: &[Block], dist_th: f64) -> Interface {
    let (Some(tree_a), Some(tree_b)) = (atom_tree(blocks_a), atom_tree(blocks_b)) else {
        return Interface::default();
    };
    let dist_th_sq = dist_th * dist_th;

    let indexes_a = near_indexes(blocks_a, &tree_b, dist_th_sq);
    let indexes_b = near_indexes(blocks_b, &tree_a, dist_th_sq);
    debug!(
        kept_a = indexes_a.len(),
        kept_b = indexes_b.len(),
        dist_th,
        "Computed block interface."
    );

    Interface {
        blocks_a: indexes_a.iter().map(|&i| blocks_a[i].clone()).collect(),
        blocks_b: indexes_b.iter().map(|&i| blocks_b[i].clone()).collect(),
        indexes_a,
        indexes_b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::block_at;

    #[test]
    fn single_atoms_five_angstroms_apart() {
        let a = vec![block_at("A", &[[0.0, 0.0, 0.0]])];
        let b = vec![block_at("G", &[[5.0, 0.0, 0.0]])];

        let wide = blocks_interface(&a, &b, 8.0);
        assert_eq!(wide.indexes_a, vec![0]);
        assert_eq!(wide.indexes_b, vec![0]);
        assert!(!wide.is_empty());

        let narrow = blocks_interface(&a, &b, 3.0);
        assert!(narrow.blocks_a.is_empty());
        assert!(narrow.blocks_b.is_empty());
        assert!(narrow.is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let a = vec![block_at("A", &[[0.0, 0.0, 0.0]])];
        let b = vec![block_at("G", &[[4.0, 0.0, 0.0]])];
        assert!(!blocks_interface(&a, &b, 4.0).is_empty());
    }

    #[test]
    fn keeps_input_order_and_uses_any_atom() {
        let a = vec![
            block_at("A", &[[-20.0, 0.0, 0.0]]),
            block_at("G", &[[-30.0, 0.0, 0.0], [-1.0, 0.0, 0.0]]),
            block_at("S", &[[-50.0, 0.0, 0.0]]),
            block_at("T", &[[0.0, -2.0, 0.0]]),
        ];
        let b = vec![
            block_at("K", &[[40.0, 0.0, 0.0]]),
            block_at("R", &[[1.0, 0.0, 0.0]]),
        ];
        let interface = blocks_interface(&a, &b, 4.0);
        assert_eq!(interface.indexes_a, vec![1, 3]);
        assert_eq!(interface.indexes_b, vec![1]);
        assert_eq!(interface.blocks_a[0].symbol, "G");
        assert_eq!(interface.blocks_a[1].symbol, "T");
    }

    #[test]
    fn retained_set_grows_with_threshold() {
        let a: Vec<Block> = (0..6)
            .map(|i| block_at("A", &[[-(i as f64) * 2.5, 0.0, 0.0]]))
            .collect();
        let b = vec![block_at("G", &[[1.0, 0.0, 0.0]])];
        let mut previous: Vec<usize> = Vec::new();
        for th in [0.5, 2.0, 4.0, 6.0, 9.0, 20.0] {
            let kept = blocks_interface(&a, &b, th).indexes_a;
            assert!(previous.iter().all(|i| kept.contains(i)));
            previous = kept;
        }
        assert_eq!(previous.len(), 6);
    }

    #[test]
    fn empty_side_gives_empty_interface() {
        let a = vec![block_at("A", &[[0.0, 0.0, 0.0]])];
        let interface = blocks_interface(&a, &[], 100.0);
        assert_eq!(interface, Interface::default());
        let interface = blocks_interface(&[], &a, 100.0);
        assert!(interface.indexes_b.is_empty());
    }
}
