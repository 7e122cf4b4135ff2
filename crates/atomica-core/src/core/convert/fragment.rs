use super::ligand::LigandError;
use crate::core::models::atom::Atom;
use crate::core::utils::geometry::squared_distance;
use crate::core::vocab::{
    MOTIF_ACYCLIC, MOTIF_RING5, MOTIF_RING6, MOTIF_RING_FUSED, MOTIF_RING_OTHER,
};
use itertools::Itertools;
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const BOND_TOLERANCE: f64 = 0.45;
const MIN_BOND_LENGTH: f64 = 0.4;
const DEFAULT_COVALENT_RADIUS: f64 = 0.76;

// Single-bond covalent radii in Angstroms.
static COVALENT_RADII: phf::Map<&'static str, f64> = phf_map! {
    "H" => 0.31,
    "B" => 0.84,
    "C" => 0.76,
    "N" => 0.71,
    "O" => 0.66,
    "F" => 0.57,
    "Si" => 1.11,
    "P" => 1.07,
    "S" => 1.05,
    "Cl" => 1.02,
    "As" => 1.19,
    "Se" => 1.20,
    "Br" => 1.20,
    "Te" => 1.38,
    "I" => 1.39,
};

/// How ligand residues are decomposed into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentationMethod {
    /// Ring systems and acyclic linkers, each one block.
    Motif,
}

impl FromStr for FragmentationMethod {
    type Err = LigandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motif" => Ok(Self::Motif),
            _ => Err(LigandError::UnknownFragmentationMethod(s.to_string())),
        }
    }
}

impl fmt::Display for FragmentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Motif => f.write_str("motif"),
        }
    }
}

/// A group of atoms (indices into the input slice, ascending) and its motif token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub symbol: &'static str,
    pub atoms: Vec<usize>,
}

fn covalent_radius(element: &str) -> f64 {
    COVALENT_RADII
        .get(element)
        .copied()
        .unwrap_or(DEFAULT_COVALENT_RADIUS)
}

/// Infers bonds from interatomic distances and covalent radii.
pub fn perceive_bonds(atoms: &[Atom]) -> Vec<(usize, usize)> {
    (0..atoms.len())
        .tuple_combinations()
        .filter(|&(i, j)| {
            let cutoff = covalent_radius(&atoms[i].element)
                + covalent_radius(&atoms[j].element)
                + BOND_TOLERANCE;
            let d2 = squared_distance(&atoms[i].position, &atoms[j].position);
            d2 <= cutoff * cutoff && d2 >= MIN_BOND_LENGTH * MIN_BOND_LENGTH
        })
        .collect()
}

fn find(parent: &mut [usize], i: usize) -> usize {
    if parent[i] != i {
        parent[i] = find(parent, parent[i]);
    }
    parent[i]
}

fn union(parent: &mut [usize], x: usize, y: usize) {
    let px = find(parent, x);
    let py = find(parent, y);
    if px != py {
        parent[py.max(px)] = py.min(px);
    }
}

struct BridgeSearch<'a> {
    adjacency: &'a [Vec<(usize, usize)>],
    discovery: Vec<Option<usize>>,
    low: Vec<usize>,
    timer: usize,
    is_bridge: Vec<bool>,
}

impl BridgeSearch<'_> {
    fn visit(&mut self, node: usize, parent_edge: Option<usize>) {
        let discovered_at = self.timer;
        self.discovery[node] = Some(discovered_at);
        self.low[node] = self.timer;
        self.timer += 1;

        let adjacency = self.adjacency;
        for &(next, edge) in &adjacency[node] {
            if Some(edge) == parent_edge {
                continue;
            }
            match self.discovery[next] {
                Some(d) => self.low[node] = self.low[node].min(d),
                None => {
                    self.visit(next, Some(edge));
                    self.low[node] = self.low[node].min(self.low[next]);
                    if self.low[next] > discovered_at {
                        self.is_bridge[edge] = true;
                    }
                }
            }
        }
    }
}

// Tarjan's bridge finding; a bond lies on a ring iff it is not a bridge.
fn find_bridges(n_atoms: usize, bonds: &[(usize, usize)]) -> Vec<bool> {
    let mut adjacency = vec![Vec::new(); n_atoms];
    for (edge, &(i, j)) in bonds.iter().enumerate() {
        adjacency[i].push((j, edge));
        adjacency[j].push((i, edge));
    }
    let mut search = BridgeSearch {
        adjacency: &adjacency,
        discovery: vec![None; n_atoms],
        low: vec![0; n_atoms],
        timer: 0,
        is_bridge: vec![false; bonds.len()],
    };
    for node in 0..n_atoms {
        if search.discovery[node].is_none() {
            search.visit(node, None);
        }
    }
    search.is_bridge
}

fn ring_symbol(n_atoms: usize, n_ring_bonds: usize) -> &'static str {
    let n_cycles = n_ring_bonds + 1 - n_atoms;
    match (n_cycles, n_atoms) {
        (1, 5) => MOTIF_RING5,
        (1, 6) => MOTIF_RING6,
        (1, _) => MOTIF_RING_OTHER,
        _ => MOTIF_RING_FUSED,
    }
}

/// Decomposes a molecule into ring systems and acyclic fragments.
///
/// Ring systems are the connected components over ring bonds; every remaining atom
/// joins the acyclic component it is bonded into. Fragments are ordered by their
/// first atom.
pub fn fragment_motifs(atoms: &[Atom]) -> Vec<Fragment> {
    let n = atoms.len();
    let bonds = perceive_bonds(atoms);
    let is_bridge = find_bridges(n, &bonds);

    let mut in_ring = vec![false; n];
    let mut ring_parent: Vec<usize> = (0..n).collect();
    for (&(i, j), &bridge) in bonds.iter().zip(&is_bridge) {
        if !bridge {
            in_ring[i] = true;
            in_ring[j] = true;
            union(&mut ring_parent, i, j);
        }
    }

    let mut chain_parent: Vec<usize> = (0..n).collect();
    for &(i, j) in &bonds {
        if !in_ring[i] && !in_ring[j] {
            union(&mut chain_parent, i, j);
        }
    }

    let mut ring_bond_counts = vec![0usize; n];
    for (&(i, _), &bridge) in bonds.iter().zip(&is_bridge) {
        if !bridge {
            let root = find(&mut ring_parent, i);
            ring_bond_counts[root] += 1;
        }
    }

    let mut groups: Vec<(usize, bool, Vec<usize>)> = Vec::new();
    let mut group_of_root: HashMap<(bool, usize), usize> = HashMap::new();
    for atom in 0..n {
        let key = if in_ring[atom] {
            (true, find(&mut ring_parent, atom))
        } else {
            (false, find(&mut chain_parent, atom))
        };
        let slot = *group_of_root.entry(key).or_insert_with(|| {
            groups.push((key.1, key.0, Vec::new()));
            groups.len() - 1
        });
        groups[slot].2.push(atom);
    }

    groups
        .into_iter()
        .map(|(root, is_ring, members)| {
            let symbol = if is_ring {
                ring_symbol(members.len(), ring_bond_counts[root])
            } else {
                MOTIF_ACYCLIC
            };
            Fragment {
                symbol,
                atoms: members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn carbons(points: &[[f64; 3]]) -> Vec<Atom> {
        points
            .iter()
            .map(|p| Atom::new("C", "C", Point3::new(p[0], p[1], p[2])))
            .collect()
    }

    fn ring(n: usize, side: f64, center: [f64; 2]) -> Vec<[f64; 3]> {
        let radius = side / (2.0 * (std::f64::consts::PI / n as f64).sin());
        (0..n)
            .map(|k| {
                let angle = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
                [center[0] + radius * angle.cos(), center[1] + radius * angle.sin(), 0.0]
            })
            .collect()
    }

    #[test]
    fn parses_fragmentation_method_names() {
        assert_eq!("motif".parse::<FragmentationMethod>(), Ok(FragmentationMethod::Motif));
        assert_eq!(" MOTIF ".parse::<FragmentationMethod>(), Ok(FragmentationMethod::Motif));
        assert_eq!(
            "PS_300".parse::<FragmentationMethod>(),
            Err(LigandError::UnknownFragmentationMethod("PS_300".into()))
        );
    }

    #[test]
    fn bonds_follow_covalent_radii() {
        let atoms = carbons(&[[0.0, 0.0, 0.0], [1.5, 0.0, 0.0], [3.5, 0.0, 0.0]]);
        assert_eq!(perceive_bonds(&atoms), vec![(0, 1)]);
    }

    #[test]
    fn chain_is_a_single_acyclic_fragment() {
        let atoms = carbons(&[[0.0, 0.0, 0.0], [1.5, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        let fragments = fragment_motifs(&atoms);
        assert_eq!(
            fragments,
            vec![Fragment {
                symbol: MOTIF_ACYCLIC,
                atoms: vec![0, 1, 2]
            }]
        );
    }

    #[test]
    fn benzene_with_substituent_splits_into_ring_and_linker() {
        let mut points = ring(6, 1.4, [0.0, 0.0]);
        // Methyl carbon bonded to the first ring atom at (1.4, 0, 0).
        points.push([2.9, 0.0, 0.0]);
        let fragments = fragment_motifs(&carbons(&points));
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].symbol, MOTIF_RING6);
        assert_eq!(fragments[0].atoms, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(fragments[1].symbol, MOTIF_ACYCLIC);
        assert_eq!(fragments[1].atoms, vec![6]);
    }

    #[test]
    fn five_membered_and_large_rings_are_typed_by_size() {
        assert_eq!(fragment_motifs(&carbons(&ring(5, 1.5, [0.0, 0.0])))[0].symbol, MOTIF_RING5);
        assert_eq!(
            fragment_motifs(&carbons(&ring(7, 1.5, [0.0, 0.0])))[0].symbol,
            MOTIF_RING_OTHER
        );
    }

    #[test]
    fn fused_rings_form_one_fused_block() {
        // Second hexagon shares the edge between the first ring's atoms 0 and 1.
        let apothem = 1.4 * (std::f64::consts::PI / 6.0).cos();
        let first = ring(6, 1.4, [0.0, 0.0]);
        let second: Vec<[f64; 3]> = ring(6, 1.4, [2.1, apothem])
            .into_iter()
            .filter(|p| {
                first
                    .iter()
                    .all(|q| ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt() > 0.1)
            })
            .collect();
        assert_eq!(second.len(), 4);
        let points: Vec<[f64; 3]> = first.into_iter().chain(second).collect();

        let fragments = fragment_motifs(&carbons(&points));
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].symbol, MOTIF_RING_FUSED);
        assert_eq!(fragments[0].atoms.len(), 10);
    }

    #[test]
    fn isolated_atoms_are_their_own_fragments() {
        let atoms = vec![
            Atom::new("ZN", "Zn", Point3::new(0.0, 0.0, 0.0)),
            Atom::new("ZN", "Zn", Point3::new(10.0, 0.0, 0.0)),
        ];
        let fragments = fragment_motifs(&atoms);
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.symbol == MOTIF_ACYCLIC));
    }
}
