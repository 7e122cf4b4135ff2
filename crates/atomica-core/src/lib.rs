//! # ATOMICA Core Library
//!
//! Turns two-body molecular complexes read from PDB files into block-level interface
//! graphs, and defines the hierarchical graph neural network that regresses a binding
//! affinity from those graphs.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout:
//!
//! - **[`core`]: The Foundation.** Immutable data models (`Block`, `Atom`, `PdbIndex`),
//!   the block/atom vocabulary, PDB parsing, structure-to-block conversion, ligand
//!   fragmentation, interface extraction and graph building.
//!
//! - **[`nn`]: The Model.** Batch collation, edge construction, the atom-level and
//!   block-level message-passing encoders and the `AffinityPredictor`, built on
//!   `candle`.
//!
//! - **[`workflows`]: The Public API.** Dataset item builders (`process_pdb`,
//!   `process_pl_pdb`, `process_all_pdbs`) that tie parsing, conversion and interface
//!   extraction together for a tabular sample index.

pub mod core;
pub mod nn;
pub mod workflows;

#[cfg(test)]
pub(crate) mod test_utils;
