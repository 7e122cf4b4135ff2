use super::atom::Atom;
use super::pdb_index::PdbIndex;

/// A residue as read from a structure file.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub name: String,               // Residue name (e.g., "ALA", "ATP")
    pub number: isize,              // Residue sequence number from source file
    pub insertion_code: Option<char>,
    pub is_hetero: bool,            // Read from HETATM records
    pub atoms: Vec<Atom>,
}

impl Residue {
    pub fn new(name: &str, number: isize, insertion_code: Option<char>, is_hetero: bool) -> Self {
        Self {
            name: name.trim().to_string(),
            number,
            insertion_code,
            is_hetero,
            atoms: Vec::new(),
        }
    }

    pub fn pdb_index(&self, chain_id: char) -> PdbIndex {
        PdbIndex::new(chain_id, self.number, self.insertion_code)
    }

    pub fn heavy_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter().filter(|a| !a.is_hydrogen())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: char,
    pub residues: Vec<Residue>,
}

impl Chain {
    pub fn new(id: char) -> Self {
        Self {
            id,
            residues: Vec::new(),
        }
    }
}

/// One structural model (conformer set) of a file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub chains: Vec<Chain>,
}

impl Model {
    pub fn chain(&self, id: char) -> Option<&Chain> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn atom_count(&self) -> usize {
        self.chains
            .iter()
            .flat_map(|c| c.residues.iter())
            .map(|r| r.atoms.len())
            .sum()
    }
}

/// All models of a parsed structure file, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    pub models: Vec<Model>,
}

impl Structure {
    /// The model at `index` (0 is the first model in the file).
    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }
}
