//! Block and atom type vocabulary.
//!
//! Block types cover the special tokens, the standard amino acids, DNA/RNA nucleotides,
//! one lower-case token per element (ligands at atom granularity) and the motif tokens
//! produced by ligand fragmentation. Atom types cover the special tokens and element
//! symbols. Indices are stable for a given build of the library; they are the ids fed
//! to the embedding tables of the model.

use super::registry;
use phf::phf_map;
use std::collections::HashMap;

pub const PAD_SYMBOL: &str = "#";
pub const MASK_SYMBOL: &str = "*";
pub const UNK_SYMBOL: &str = "?";
pub const GLOBAL_SYMBOL: &str = "&";

pub const PAD_ATOM: &str = "p";
pub const MASK_ATOM: &str = "m";
pub const UNK_ATOM: &str = "u";
pub const GLOBAL_ATOM: &str = "g";

const SPECIAL_BLOCKS: [(&str, &str); 4] = [
    (PAD_SYMBOL, "PAD"),
    (MASK_SYMBOL, "MSK"),
    (UNK_SYMBOL, "UNK"),
    (GLOBAL_SYMBOL, "GLB"),
];

#[rustfmt::skip]
const AMINO_ACIDS: [(&str, &str); 20] = [
    ("G", "GLY"), ("A", "ALA"), ("V", "VAL"), ("L", "LEU"), ("I", "ILE"),
    ("F", "PHE"), ("W", "TRP"), ("Y", "TYR"), ("D", "ASP"), ("H", "HIS"),
    ("N", "ASN"), ("E", "GLU"), ("K", "LYS"), ("Q", "GLN"), ("M", "MET"),
    ("R", "ARG"), ("S", "SER"), ("T", "THR"), ("C", "CYS"), ("P", "PRO"),
];

#[rustfmt::skip]
const NUCLEOTIDES: [(&str, &str); 8] = [
    ("DA", "DA"), ("DC", "DC"), ("DG", "DG"), ("DT", "DT"),
    ("RA", "A"), ("RC", "C"), ("RG", "G"), ("RU", "U"),
];

#[rustfmt::skip]
const ELEMENTS: [&str; 57] = [
    "H", "Li", "B", "C", "N", "O", "F", "Na", "Mg", "Al",
    "Si", "P", "S", "Cl", "K", "Ca", "V", "Cr", "Mn", "Fe",
    "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr",
    "Rb", "Sr", "Y", "Zr", "Mo", "Ru", "Rh", "Pd", "Ag", "Cd",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "W", "Re", "Os",
    "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi",
];

/// Motif tokens emitted by ligand fragmentation.
pub const MOTIF_RING5: &str = "<R5>";
pub const MOTIF_RING6: &str = "<R6>";
pub const MOTIF_RING_OTHER: &str = "<RX>";
pub const MOTIF_RING_FUSED: &str = "<RF>";
pub const MOTIF_ACYCLIC: &str = "<AC>";

const MOTIFS: [&str; 5] = [
    MOTIF_RING5,
    MOTIF_RING6,
    MOTIF_RING_OTHER,
    MOTIF_RING_FUSED,
    MOTIF_ACYCLIC,
];

// Non-standard residue names that carry a standard residue's block type.
static RESIDUE_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "MSE" => "MET",
    "HSE" => "HIS",
    "HSD" => "HIS",
    "HSP" => "HIS",
    "HIE" => "HIS",
    "HID" => "HIS",
    "HIP" => "HIS",
    "CYX" => "CYS",
    "ASH" => "ASP",
    "GLH" => "GLU",
    "LYN" => "LYS",
};

static WATER_NAMES: phf::Map<&'static str, ()> = phf_map! {
    "HOH" => (),
    "WAT" => (),
    "DOD" => (),
    "H2O" => (),
    "SOL" => (),
};

/// Normalizes an element symbol to its canonical capitalization (`CL` -> `Cl`).
pub fn normalize_element(element: &str) -> String {
    let trimmed = element.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Returns `true` for hydrogen and its isotopes.
pub fn is_hydrogen(element: &str) -> bool {
    matches!(normalize_element(element).as_str(), "H" | "D" | "T")
}

/// Returns `true` if the residue name denotes a water molecule.
pub fn is_water(residue_name: &str) -> bool {
    WATER_NAMES.contains_key(residue_name.trim().to_ascii_uppercase().as_str())
}

#[derive(Debug, Clone)]
pub struct Vocab {
    block_symbols: Vec<String>,
    block_abrvs: Vec<String>,
    block_index: HashMap<String, u32>,
    abrv_to_symbol: HashMap<String, String>,
    polymer_abrvs: HashMap<String, String>,
    atom_types: Vec<String>,
    atom_index: HashMap<String, u32>,
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocab {
    /// Builds a fresh vocabulary. Most callers want [`Vocab::global`].
    pub fn new() -> Self {
        let mut block_entries: Vec<(String, String)> = Vec::new();
        block_entries.extend(
            SPECIAL_BLOCKS
                .iter()
                .map(|(s, a)| (s.to_string(), a.to_string())),
        );
        block_entries.extend(AMINO_ACIDS.iter().map(|(s, a)| (s.to_string(), a.to_string())));
        block_entries.extend(NUCLEOTIDES.iter().map(|(s, a)| (s.to_string(), a.to_string())));
        block_entries.extend(ELEMENTS.iter().map(|e| {
            let symbol = e.to_lowercase();
            (symbol.clone(), symbol)
        }));
        block_entries.extend(MOTIFS.iter().map(|m| (m.to_string(), m.to_string())));

        let mut block_symbols = Vec::with_capacity(block_entries.len());
        let mut block_abrvs = Vec::with_capacity(block_entries.len());
        let mut block_index = HashMap::with_capacity(block_entries.len());
        let mut abrv_to_symbol = HashMap::with_capacity(block_entries.len());
        for (idx, (symbol, abrv)) in block_entries.into_iter().enumerate() {
            block_index.insert(symbol.clone(), idx as u32);
            abrv_to_symbol.insert(abrv.clone(), symbol.clone());
            block_symbols.push(symbol);
            block_abrvs.push(abrv);
        }

        let polymer_abrvs = AMINO_ACIDS
            .iter()
            .chain(NUCLEOTIDES.iter())
            .map(|(s, a)| (a.to_string(), s.to_string()))
            .collect();

        let atom_types: Vec<String> = [PAD_ATOM, MASK_ATOM, UNK_ATOM, GLOBAL_ATOM]
            .iter()
            .chain(ELEMENTS.iter())
            .map(|s| s.to_string())
            .collect();
        let atom_index = atom_types
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();

        Self {
            block_symbols,
            block_abrvs,
            block_index,
            abrv_to_symbol,
            polymer_abrvs,
            atom_types,
            atom_index,
        }
    }

    /// The process-wide vocabulary instance.
    pub fn global() -> &'static Vocab {
        registry::instance::<Vocab>()
    }

    /// Maps a polymer residue name (`ALA`, `DG`, `U`, aliases like `MSE`) to its block
    /// symbol. Returns `None` for anything that is not an amino acid or nucleotide.
    pub fn polymer_symbol(&self, residue_name: &str) -> Option<&str> {
        let name = residue_name.trim().to_ascii_uppercase();
        let name = RESIDUE_ALIASES
            .get(name.as_str())
            .map(|s| s.to_string())
            .unwrap_or(name);
        self.polymer_abrvs.get(&name).map(String::as_str)
    }

    pub fn abrv_to_symbol(&self, abrv: &str) -> Option<&str> {
        self.abrv_to_symbol.get(abrv).map(String::as_str)
    }

    pub fn symbol_to_abrv(&self, symbol: &str) -> Option<&str> {
        self.block_index
            .get(symbol)
            .map(|&i| self.block_abrvs[i as usize].as_str())
    }

    /// Block type id of `symbol`, falling back to the unknown token.
    pub fn symbol_to_idx(&self, symbol: &str) -> u32 {
        self.block_index
            .get(symbol)
            .copied()
            .unwrap_or_else(|| self.block_index[UNK_SYMBOL])
    }

    pub fn idx_to_symbol(&self, idx: u32) -> Option<&str> {
        self.block_symbols.get(idx as usize).map(String::as_str)
    }

    /// Atom type id of an element symbol (any capitalization), falling back to the
    /// unknown token.
    pub fn atom_to_idx(&self, element: &str) -> u32 {
        let normalized = normalize_element(element);
        self.atom_index
            .get(&normalized)
            .copied()
            .unwrap_or_else(|| self.atom_index[UNK_ATOM])
    }

    pub fn idx_to_atom(&self, idx: u32) -> Option<&str> {
        self.atom_types.get(idx as usize).map(String::as_str)
    }

    /// Block symbol used for a ligand atom treated as its own block.
    pub fn element_block_symbol(&self, element: &str) -> String {
        let symbol = normalize_element(element).to_lowercase();
        if self.block_index.contains_key(&symbol) {
            symbol
        } else {
            UNK_SYMBOL.to_string()
        }
    }

    pub fn global_block_idx(&self) -> u32 {
        self.block_index[GLOBAL_SYMBOL]
    }

    pub fn global_atom_idx(&self) -> u32 {
        self.atom_index[GLOBAL_ATOM]
    }

    pub fn pad_block_idx(&self) -> u32 {
        self.block_index[PAD_SYMBOL]
    }

    pub fn num_block_types(&self) -> usize {
        self.block_symbols.len()
    }

    pub fn num_atom_types(&self) -> usize {
        self.atom_types.len()
    }
}
