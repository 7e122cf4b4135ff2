use super::fragment::{FragmentationMethod, fragment_motifs};
use crate::core::models::atom::Atom;
use crate::core::models::block::Block;
use crate::core::models::pdb_index::PdbIndex;
use crate::core::models::structure::{Model, Residue};
use crate::core::vocab::Vocab;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LigandError {
    #[error("Unknown fragmentation method '{0}' (expected 'motif')")]
    UnknownFragmentationMethod(String),
}

/// Which ligand residue(s) to extract from a model.
#[derive(Debug, Clone, Copy)]
pub struct LigandQuery<'a> {
    /// Three-letter residue code, compared case-insensitively.
    pub code: &'a str,
    pub chain: char,
    /// Used only to cross-check the heavy-atom count of each occurrence.
    pub smiles: Option<&'a str>,
    /// Restricts the match to one residue number.
    pub residue_number: Option<isize>,
}

/// One occurrence of a ligand as blocks with index-aligned provenance keys.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandCandidate {
    pub blocks: Vec<Block>,
    pub indexes: Vec<PdbIndex>,
}

/// Counts the heavy atoms written in a SMILES string.
///
/// Bracket atoms count once unless they are hydrogen; organic-subset atoms outside
/// brackets always count. Implicit hydrogens are not atoms here.
pub fn smiles_heavy_atom_count(smiles: &str) -> usize {
    let chars: Vec<char> = smiles.chars().collect();
    let mut count = 0;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map_or(chars.len(), |p| i + p);
                let mut symbol = chars[i + 1..end].iter().skip_while(|c| c.is_ascii_digit());
                let element: String = match symbol.next() {
                    Some(&first) if first.is_ascii_uppercase() => std::iter::once(first)
                        .chain(symbol.next().copied().filter(char::is_ascii_lowercase))
                        .collect(),
                    Some(&first) => first.to_string(),
                    None => String::new(),
                };
                if !element.is_empty() && element != "H" {
                    count += 1;
                }
                i = end + 1;
            }
            'C' if chars.get(i + 1) == Some(&'l') => {
                count += 1;
                i += 2;
            }
            'B' if chars.get(i + 1) == Some(&'r') => {
                count += 1;
                i += 2;
            }
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | 'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
                count += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    count
}

fn matches_query(residue: &Residue, query: &LigandQuery) -> bool {
    residue.name.eq_ignore_ascii_case(query.code.trim())
        && query
            .residue_number
            .is_none_or(|number| residue.number == number)
}

fn atom_blocks(atoms: Vec<Atom>, index: &PdbIndex, vocab: &Vocab) -> LigandCandidate {
    let blocks: Vec<Block> = atoms
        .into_iter()
        .map(|atom| Block::new(&vocab.element_block_symbol(&atom.element), vec![atom]))
        .collect();
    let indexes = vec![index.clone(); blocks.len()];
    LigandCandidate { blocks, indexes }
}

fn motif_blocks(atoms: Vec<Atom>, index: &PdbIndex) -> LigandCandidate {
    let blocks: Vec<Block> = fragment_motifs(&atoms)
        .into_iter()
        .map(|fragment| {
            let members = fragment.atoms.iter().map(|&i| atoms[i].clone()).collect();
            Block::new(fragment.symbol, members)
        })
        .collect();
    let indexes = vec![index.clone(); blocks.len()];
    LigandCandidate { blocks, indexes }
}

/// Extracts every occurrence of a ligand residue from `model`, in file order.
///
/// Without a fragmentation method each heavy atom becomes its own block typed by its
/// lower-case element. With [`FragmentationMethod::Motif`] each occurrence is split
/// into ring-system and acyclic blocks. All blocks of an occurrence share the
/// occurrence's residue-level [`PdbIndex`]. No match yields an empty list.
pub fn extract_pdb_ligand(
    model: &Model,
    query: &LigandQuery,
    fragmentation: Option<FragmentationMethod>,
) -> Vec<LigandCandidate> {
    let Some(chain) = model.chain(query.chain) else {
        debug!(chain = %query.chain, code = query.code, "Ligand chain not present in model.");
        return Vec::new();
    };
    let vocab = Vocab::global();
    let expected_heavy_atoms = query.smiles.map(smiles_heavy_atom_count);

    chain
        .residues
        .iter()
        .filter(|residue| matches_query(residue, query))
        .filter_map(|residue| {
            let atoms: Vec<Atom> = residue.heavy_atoms().cloned().collect();
            if atoms.is_empty() {
                return None;
            }
            let index = residue.pdb_index(chain.id);
            if let Some(expected) = expected_heavy_atoms {
                if expected != atoms.len() {
                    warn!(
                        code = query.code,
                        residue = %index,
                        expected,
                        found = atoms.len(),
                        "Ligand heavy-atom count does not match its SMILES."
                    );
                }
            }
            Some(match fragmentation {
                None => atom_blocks(atoms, &index, vocab),
                Some(FragmentationMethod::Motif) => motif_blocks(atoms, &index),
            })
        })
        .collect()
}
