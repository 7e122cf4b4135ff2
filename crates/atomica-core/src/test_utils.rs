use crate::core::graph::{GraphData, blocks_to_data};
use crate::core::models::atom::Atom;
use crate::core::models::block::Block;
use nalgebra::Point3;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One ATOM/HETATM record to render in fixed-column PDB layout.
#[derive(Debug, Clone)]
pub(crate) struct PdbAtom {
    pub hetero: bool,
    pub name: &'static str,
    pub element: &'static str,
    pub res_name: &'static str,
    pub chain: char,
    pub res_seq: isize,
    pub insertion_code: char,
    pub alt_loc: char,
    pub pos: [f64; 3],
}

impl PdbAtom {
    pub fn atom(
        name: &'static str,
        element: &'static str,
        res_name: &'static str,
        chain: char,
        res_seq: isize,
        pos: [f64; 3],
    ) -> Self {
        Self {
            hetero: false,
            name,
            element,
            res_name,
            chain,
            res_seq,
            insertion_code: ' ',
            alt_loc: ' ',
            pos,
        }
    }

    pub fn hetatm(
        name: &'static str,
        element: &'static str,
        res_name: &'static str,
        chain: char,
        res_seq: isize,
        pos: [f64; 3],
    ) -> Self {
        Self {
            hetero: true,
            ..Self::atom(name, element, res_name, chain, res_seq, pos)
        }
    }

    fn line(&self, serial: usize) -> String {
        let record = if self.hetero { "HETATM" } else { "ATOM" };
        let name = if self.name.len() < 4 && self.element.len() == 1 {
            format!(" {:<3}", self.name)
        } else {
            format!("{:<4}", self.name)
        };
        format!(
            "{:<6}{:>5} {}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
            record,
            serial,
            name,
            self.alt_loc,
            self.res_name,
            self.chain,
            self.res_seq,
            self.insertion_code,
            self.pos[0],
            self.pos[1],
            self.pos[2],
            1.0,
            0.0,
            self.element
        )
    }
}

/// Renders atoms as PDB text terminated by an `END` record.
pub(crate) fn render_pdb(atoms: &[PdbAtom]) -> String {
    let mut text = String::new();
    for (i, atom) in atoms.iter().enumerate() {
        let _ = writeln!(text, "{}", atom.line(i + 1));
    }
    text.push_str("END\n");
    text
}

pub(crate) fn write_pdb(dir: &Path, file_name: &str, atoms: &[PdbAtom]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, render_pdb(atoms)).unwrap();
    path
}

/// A block of carbon atoms at the given positions.
pub(crate) fn block_at(symbol: &str, positions: &[[f64; 3]]) -> Block {
    Block::new(
        symbol,
        positions
            .iter()
            .enumerate()
            .map(|(i, p)| Atom::new(&format!("C{}", i + 1), "C", Point3::new(p[0], p[1], p[2])))
            .collect(),
    )
}

/// A small two-segment interface: an alanine and a glycine against a lysine.
pub(crate) fn toy_graph(offset: f64) -> GraphData {
    blocks_to_data(
        &[
            block_at("A", &[[offset, 0.0, 0.0], [offset + 1.5, 0.0, 0.0]]),
            block_at("G", &[[offset + 3.0, 0.5, 0.0]]),
        ],
        &[block_at(
            "K",
            &[
                [offset, 4.0, 0.0],
                [offset + 1.2, 4.5, 0.3],
                [offset + 2.4, 4.1, -0.2],
            ],
        )],
    )
}
