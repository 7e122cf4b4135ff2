//! # Workflows Module
//!
//! High-level entry points that turn structure files listed in a sample index into
//! interface samples.
//!
//! ## Overview
//!
//! Each workflow reads a PDB file, converts the requested chains (and ligand, for
//! protein-ligand rows) into blocks, extracts the interface between the two sides and
//! flattens it into [`GraphData`](crate::core::graph::GraphData) together with a map
//! from graph block positions back to PDB residues.
//!
//! ## Architecture
//!
//! - **Sample Building** ([`process`]) - `process_pdb`, `process_pl_pdb` and
//!   `process_all_pdbs`
//! - **Sample Index** ([`index`]) - CSV rows describing what to process
//! - **Configuration** ([`config`]) - Interface threshold and ligand fragmentation
//! - **Progress Reporting** ([`progress`]) - Callback-based progress events
//! - **Errors** ([`error`]) - The error type of the processing layer

pub mod config;
pub mod error;
pub mod index;
pub mod process;
pub mod progress;
