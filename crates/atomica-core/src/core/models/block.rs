use super::atom::Atom;
use crate::core::utils::geometry::centroid;
use nalgebra::Point3;

/// A residue or ligand fragment treated as one unit of structure.
///
/// `symbol` is the block type token from the [`Vocab`](crate::core::vocab::Vocab). The
/// source chain and residue number live in the parallel
/// [`PdbIndex`](super::pdb_index::PdbIndex) list produced alongside the blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub symbol: String,
    atoms: Vec<Atom>,
}

impl Block {
    pub fn new(symbol: &str, atoms: Vec<Atom>) -> Self {
        Self {
            symbol: symbol.to_string(),
            atoms,
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.atoms.iter().map(|a| &a.position)
    }

    /// Mean position of the block's atoms, `None` for an empty block.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        centroid(self.positions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_mean_of_atom_positions() {
        let block = Block::new(
            "A",
            vec![
                Atom::new("N", "N", Point3::new(0.0, 0.0, 0.0)),
                Atom::new("CA", "C", Point3::new(2.0, 4.0, -2.0)),
            ],
        );
        assert_eq!(block.len(), 2);
        assert_eq!(block.centroid(), Some(Point3::new(1.0, 2.0, -1.0)));
    }

    #[test]
    fn empty_block_has_no_centroid() {
        let block = Block::new("?", Vec::new());
        assert!(block.is_empty());
        assert!(block.centroid().is_none());
    }
}
