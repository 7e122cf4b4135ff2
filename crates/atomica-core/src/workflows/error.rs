use super::config::ConfigError;
use crate::core::convert::ligand::LigandError;
use crate::core::io::pdb::PdbError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to read PDB file '{path}': {source}")]
    Pdb {
        path: PathBuf,
        #[source]
        source: PdbError,
    },

    #[error("PDB file '{0}' contains no models")]
    EmptyStructure(PathBuf),

    #[error("Failed to read sample index: {0}")]
    Index(#[from] csv::Error),

    #[error("Invalid ligand chain '{chain2}' for {pdb_id}: a ligand must lie in a single chain")]
    InvalidLigandChain { pdb_id: String, chain2: String },

    #[error("Invalid chain identifier '{chain}' for {pdb_id}: chains are single characters")]
    InvalidChainId { pdb_id: String, chain: String },

    #[error(transparent)]
    Ligand(#[from] LigandError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
