use super::error::ProcessError;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::{Path, PathBuf};

/// One row of the tabular sample index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexRow {
    pub pdb_id: String,
    pub pdb_path: PathBuf,
    /// Underscore-delimited chain ids of the first group (receptor).
    pub chain1: String,
    /// Underscore-delimited chain ids of the second group; a single chain for ligands.
    pub chain2: String,
    #[serde(default)]
    pub lig_code: Option<String>,
    #[serde(default)]
    pub lig_smiles: Option<String>,
    /// Ligand residue number. Integral floats such as `101.0` are accepted.
    #[serde(default, deserialize_with = "residue_number")]
    pub lig_resi: Option<isize>,
    #[serde(default)]
    pub label: Option<f64>,
}

fn residue_number<'de, D>(deserializer: D) -> Result<Option<isize>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Ok(number) = text.parse::<isize>() {
        return Ok(Some(number));
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(Some(value as isize)),
        _ => Err(serde::de::Error::custom(format!(
            "invalid residue number '{text}'"
        ))),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn parse_chains(pdb_id: &str, field: &str) -> Result<Vec<char>, ProcessError> {
    field
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(ProcessError::InvalidChainId {
                    pdb_id: pdb_id.to_string(),
                    chain: part.to_string(),
                }),
            }
        })
        .collect()
}

impl IndexRow {
    /// Ligand residue code, `None` for chain-chain rows.
    pub fn ligand_code(&self) -> Option<&str> {
        non_empty(&self.lig_code)
    }

    pub fn ligand_smiles(&self) -> Option<&str> {
        non_empty(&self.lig_smiles)
    }

    pub fn group1_chains(&self) -> Result<Vec<char>, ProcessError> {
        parse_chains(&self.pdb_id, &self.chain1)
    }

    pub fn group2_chains(&self) -> Result<Vec<char>, ProcessError> {
        parse_chains(&self.pdb_id, &self.chain2)
    }

    /// The single ligand chain of a protein-ligand row.
    pub fn ligand_chain(&self) -> Result<char, ProcessError> {
        let chains = self.group2_chains()?;
        match chains.as_slice() {
            [chain] => Ok(*chain),
            _ => Err(ProcessError::InvalidLigandChain {
                pdb_id: self.pdb_id.clone(),
                chain2: self.chain2.clone(),
            }),
        }
    }
}

/// Reads index rows from CSV text with a header line.
pub fn read_index_from(reader: impl Read) -> Result<Vec<IndexRow>, ProcessError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = csv_reader
        .deserialize()
        .collect::<Result<Vec<IndexRow>, _>>()?;
    Ok(rows)
}

pub fn read_index(path: &Path) -> Result<Vec<IndexRow>, ProcessError> {
    let csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let rows = csv_reader
        .into_deserialize()
        .collect::<Result<Vec<IndexRow>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "\
pdb_id,pdb_path,chain1,chain2,lig_code,lig_smiles,lig_resi,label
1abc,/data/1abc.pdb,A_B,C,,,,6.5
2xyz,/data/2xyz.pdb,A,L,ATP,CCO,401,
3def,/data/3def.pdb,H_L,A,,,,
";

    #[test]
    fn reads_rows_with_optional_fields() {
        let rows = read_index_from(INDEX.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].pdb_id, "1abc");
        assert_eq!(rows[0].group1_chains().unwrap(), vec!['A', 'B']);
        assert_eq!(rows[0].ligand_code(), None);
        assert_eq!(rows[0].label, Some(6.5));

        assert_eq!(rows[1].ligand_code(), Some("ATP"));
        assert_eq!(rows[1].ligand_smiles(), Some("CCO"));
        assert_eq!(rows[1].lig_resi, Some(401));
        assert_eq!(rows[1].ligand_chain().unwrap(), 'L');
        assert_eq!(rows[1].label, None);
    }

    #[test]
    fn label_column_may_be_absent() {
        let text = "pdb_id,pdb_path,chain1,chain2,lig_code,lig_smiles,lig_resi\n1abc,x.pdb,A,B,,,\n";
        let rows = read_index_from(text.as_bytes()).unwrap();
        assert_eq!(rows[0].label, None);
        assert_eq!(rows[0].pdb_path, PathBuf::from("x.pdb"));
    }

    #[test]
    fn residue_numbers_may_be_written_as_integral_floats() {
        let text = "\
pdb_id,pdb_path,chain1,chain2,lig_code,lig_smiles,lig_resi
a,a.pdb,A,L,ATP,,101.0
b,b.pdb,A,L,ATP,,-3
c,c.pdb,A,B,,,
";
        let rows = read_index_from(text.as_bytes()).unwrap();
        assert_eq!(rows[0].lig_resi, Some(101));
        assert_eq!(rows[1].lig_resi, Some(-3));
        assert_eq!(rows[2].lig_resi, None);

        let fractional = "pdb_id,pdb_path,chain1,chain2,lig_code,lig_smiles,lig_resi\na,a.pdb,A,L,ATP,,101.5\n";
        assert!(matches!(
            read_index_from(fractional.as_bytes()),
            Err(ProcessError::Index(_))
        ));
    }

    #[test]
    fn multi_chain_ligand_row_is_rejected() {
        let rows = read_index_from(INDEX.as_bytes()).unwrap();
        let mut row = rows[1].clone();
        row.chain2 = "L_M".into();
        assert!(matches!(
            row.ligand_chain(),
            Err(ProcessError::InvalidLigandChain { .. })
        ));
    }

    #[test]
    fn multi_character_chain_ids_are_rejected() {
        assert!(matches!(
            parse_chains("1abc", "AB_C"),
            Err(ProcessError::InvalidChainId { chain, .. }) if chain == "AB"
        ));
    }

    #[test]
    fn reads_index_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.csv");
        std::fs::write(&path, INDEX).unwrap();
        assert_eq!(read_index(&path).unwrap().len(), 3);
    }
}
