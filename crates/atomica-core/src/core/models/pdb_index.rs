use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance key of a block: chain id, residue number and insertion code, rendered as
/// `"{chain}_{resseq}{icode}"` (e.g. `A_102`, `H_52A`).
///
/// Used only to map blocks back to the source file, never for geometry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PdbIndex(String);

impl PdbIndex {
    pub fn new(chain: char, residue_number: isize, insertion_code: Option<char>) -> Self {
        match insertion_code {
            Some(code) => Self(format!("{}_{}{}", chain, residue_number, code)),
            None => Self(format!("{}_{}", chain, residue_number)),
        }
    }

    /// The chain prefix (everything before the first `_`).
    pub fn chain(&self) -> &str {
        self.0.split('_').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PdbIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PdbIndex {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
