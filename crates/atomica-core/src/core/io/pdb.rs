use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::structure::{Chain, Model, Residue, Structure};
use crate::core::vocab::normalize_element;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::{self, BufRead};
use thiserror::Error;
use tracing::debug;

// Shortest ATOM/HETATM line that still carries the z coordinate (columns 47-54).
const MIN_ATOM_LINE_LEN: usize = 54;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PdbParseErrorKind,
    },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn column_char(line: &str, index: usize) -> Option<char> {
    line.get(index..index + 1)
        .and_then(|s| s.chars().next())
        .filter(|c| !c.is_whitespace())
}

// Element from columns 13-14 of the atom name when the element columns are blank.
fn element_from_atom_name(raw_name: &str, is_hetero: bool) -> String {
    let letters: String = raw_name
        .get(0..2)
        .unwrap_or(raw_name)
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect();
    if !is_hetero && letters.len() > 1 {
        // Polymer atom names are right-aligned one-letter elements ("HG11" is hydrogen).
        return normalize_element(&letters[..1]);
    }
    if letters.is_empty() {
        return raw_name
            .trim()
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_string())
            .unwrap_or_default();
    }
    normalize_element(&letters)
}

#[derive(Default)]
struct ModelBuilder {
    model: Model,
    // Selected alternate location per (chain, residue number, insertion code).
    alt_locs: HashMap<(char, isize, Option<char>), char>,
}

impl ModelBuilder {
    fn is_empty(&self) -> bool {
        self.model.chains.is_empty()
    }

    fn chain_mut(&mut self, chain_id: char) -> &mut Chain {
        let idx = match self.model.chains.iter().position(|c| c.id == chain_id) {
            Some(idx) => idx,
            None => {
                self.model.chains.push(Chain::new(chain_id));
                self.model.chains.len() - 1
            }
        };
        &mut self.model.chains[idx]
    }

    fn accepts_alt_loc(
        &mut self,
        key: (char, isize, Option<char>),
        alt_loc: Option<char>,
    ) -> bool {
        match alt_loc {
            None => true,
            Some(code) => *self.alt_locs.entry(key).or_insert(code) == code,
        }
    }

    fn add_atom(&mut self, record: AtomRecord) {
        let key = (record.chain_id, record.res_seq, record.insertion_code);
        if !self.accepts_alt_loc(key, record.alt_loc) {
            return;
        }
        let chain = self.chain_mut(record.chain_id);
        let starts_new_residue = chain.residues.last().is_none_or(|last| {
            last.number != record.res_seq
                || last.insertion_code != record.insertion_code
                || last.name != record.res_name
        });
        if starts_new_residue {
            chain.residues.push(Residue::new(
                &record.res_name,
                record.res_seq,
                record.insertion_code,
                record.is_hetero,
            ));
        }
        if let Some(residue) = chain.residues.last_mut() {
            residue.atoms.push(record.atom);
        }
    }

    fn finish(self) -> Model {
        self.model
    }
}

struct AtomRecord {
    atom: Atom,
    alt_loc: Option<char>,
    res_name: String,
    chain_id: char,
    res_seq: isize,
    insertion_code: Option<char>,
    is_hetero: bool,
}

fn parse_atom_record(line: &str, line_num: usize, is_hetero: bool) -> Result<AtomRecord, PdbError> {
    if line.len() < MIN_ATOM_LINE_LEN {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }

    let raw_name = line.get(12..16).unwrap_or("");
    let name_str = raw_name.trim();
    let res_name_str = slice_and_trim(line, 17, 20);
    let res_seq_str = slice_and_trim(line, 22, 26);
    let x_str = slice_and_trim(line, 30, 38);
    let y_str = slice_and_trim(line, 38, 46);
    let z_str = slice_and_trim(line, 46, 54);
    let element_str = slice_and_trim(line, 76, 78);

    if name_str.is_empty() {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::MissingRequiredField {
                columns: "13-16".into(),
            },
        });
    }
    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidInt {
            columns: "23-26".into(),
            value: res_seq_str.into(),
        },
    })?;
    let parse_coord = |value: &str, columns: &str| -> Result<f64, PdbError> {
        value.parse().map_err(|_| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidFloat {
                columns: columns.into(),
                value: value.into(),
            },
        })
    };
    let x = parse_coord(x_str, "31-38")?;
    let y = parse_coord(y_str, "39-46")?;
    let z = parse_coord(z_str, "47-54")?;

    let element = if element_str.is_empty() {
        element_from_atom_name(raw_name, is_hetero)
    } else {
        normalize_element(element_str)
    };

    Ok(AtomRecord {
        atom: Atom::new(name_str, &element, Point3::new(x, y, z)),
        alt_loc: column_char(line, 16),
        res_name: res_name_str.to_string(),
        chain_id: column_char(line, 21).unwrap_or(' '),
        res_seq,
        insertion_code: column_char(line, 26),
        is_hetero,
    })
}

/// Reader for the fixed-column Protein Data Bank format.
///
/// `ATOM`/`HETATM` records are grouped into models (`MODEL`/`ENDMDL`; files without
/// `MODEL` records form a single model), chains and consecutive residues. Only the
/// first alternate location of each residue is kept. Reading stops at `END`.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::default();
        let mut current = ModelBuilder::default();
        let mut seen_atoms = 0usize;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "ATOM" | "HETATM" => {
                    let is_hetero = line.starts_with("HETATM");
                    let record = parse_atom_record(&line, line_num, is_hetero)?;
                    current.add_atom(record);
                    seen_atoms += 1;
                }
                "MODEL" => {
                    if !current.is_empty() {
                        structure.models.push(std::mem::take(&mut current).finish());
                    }
                }
                "ENDMDL" => {
                    structure.models.push(std::mem::take(&mut current).finish());
                }
                "END" => break,
                _ => {}
            }
        }

        if !current.is_empty() {
            structure.models.push(current.finish());
        }
        if seen_atoms == 0 {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }

        debug!(
            models = structure.models.len(),
            atoms = seen_atoms,
            "Parsed PDB structure."
        );
        Ok(structure)
    }
}
