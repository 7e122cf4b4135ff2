use crate::core::models::block::Block;
use crate::core::models::pdb_index::PdbIndex;
use crate::core::models::structure::{Model, Residue};
use crate::core::vocab::{Vocab, is_water};
use tracing::debug;

/// The polymer blocks of one chain with their provenance keys, index-aligned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainBlocks {
    pub chain_id: char,
    pub blocks: Vec<Block>,
    pub indexes: Vec<PdbIndex>,
}

impl ChainBlocks {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Converts a polymer residue into a block of its heavy atoms.
///
/// Returns `None` for waters, residues that are not amino acids or nucleotides, and
/// residues without heavy atoms.
pub fn residue_to_block(residue: &Residue, vocab: &Vocab) -> Option<Block> {
    if is_water(&residue.name) {
        return None;
    }
    let symbol = vocab.polymer_symbol(&residue.name)?;
    let atoms: Vec<_> = residue.heavy_atoms().cloned().collect();
    if atoms.is_empty() {
        return None;
    }
    Some(Block::new(symbol, atoms))
}

/// Converts the requested chains of `model` into blocks, one entry per chain found,
/// in the order the chains were requested.
///
/// Chains absent from the model are skipped, as are chains with no polymer residues.
pub fn pdb_to_list_blocks(model: &Model, selected_chains: &[char]) -> Vec<ChainBlocks> {
    let vocab = Vocab::global();
    let mut result = Vec::with_capacity(selected_chains.len());

    for &chain_id in selected_chains {
        let Some(chain) = model.chain(chain_id) else {
            debug!(chain = %chain_id, "Requested chain not present in model.");
            continue;
        };

        let mut chain_blocks = ChainBlocks {
            chain_id,
            ..Default::default()
        };
        for residue in &chain.residues {
            if let Some(block) = residue_to_block(residue, vocab) {
                chain_blocks.blocks.push(block);
                chain_blocks.indexes.push(residue.pdb_index(chain_id));
            }
        }

        if chain_blocks.is_empty() {
            debug!(chain = %chain_id, "Chain has no polymer residues.");
            continue;
        }
        result.push(chain_blocks);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::pdb::PdbFile;
    use crate::core::io::traits::StructureFile;
    use crate::test_utils::{PdbAtom, render_pdb};
    use std::io::Cursor;

    fn model_from(atoms: &[PdbAtom]) -> Model {
        let text = render_pdb(atoms);
        let mut structure = PdbFile::read_from(&mut Cursor::new(text.as_bytes())).unwrap();
        structure.models.remove(0)
    }

    #[test]
    fn polymer_residues_become_blocks_in_requested_chain_order() {
        let model = model_from(&[
            PdbAtom::atom("N", "N", "ALA", 'A', 1, [0.0, 0.0, 0.0]),
            PdbAtom::atom("CA", "C", "ALA", 'A', 1, [1.5, 0.0, 0.0]),
            PdbAtom::atom("H", "H", "ALA", 'A', 1, [0.0, 1.0, 0.0]),
            PdbAtom::atom("N", "N", "GLY", 'A', 2, [3.0, 0.0, 0.0]),
            PdbAtom::atom("P", "P", "DG", 'B', 7, [10.0, 0.0, 0.0]),
        ]);

        let chains = pdb_to_list_blocks(&model, &['B', 'A']);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].chain_id, 'B');
        assert_eq!(chains[0].blocks[0].symbol, "DG");
        assert_eq!(chains[1].blocks.len(), 2);
        assert_eq!(chains[1].blocks[0].symbol, "A");
        assert_eq!(chains[1].blocks[0].len(), 2, "hydrogens are dropped");
        assert_eq!(chains[1].indexes[1].as_str(), "A_2");
    }

    #[test]
    fn waters_ligands_and_missing_chains_are_skipped() {
        let model = model_from(&[
            PdbAtom::atom("CA", "C", "SER", 'A', 1, [0.0, 0.0, 0.0]),
            PdbAtom::hetatm("O", "O", "HOH", 'A', 101, [3.0, 0.0, 0.0]),
            PdbAtom::hetatm("C1", "C", "ATP", 'A', 102, [4.0, 0.0, 0.0]),
            PdbAtom::hetatm("O", "O", "HOH", 'W', 1, [9.0, 0.0, 0.0]),
        ]);

        let chains = pdb_to_list_blocks(&model, &['A', 'W', 'Z']);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].blocks.len(), 1);
        assert_eq!(chains[0].indexes[0].as_str(), "A_1");
    }

    #[test]
    fn modified_residue_alias_maps_to_standard_block() {
        let model = model_from(&[PdbAtom::hetatm("SE", "SE", "MSE", 'A', 3, [0.0, 0.0, 0.0])]);
        let chains = pdb_to_list_blocks(&model, &['A']);
        assert_eq!(chains[0].blocks[0].symbol, "M");
    }
}
