//! Conversion of parsed structures into blocks.
//!
//! - [`blocks`] - One block per polymer residue, grouped by chain
//! - [`ligand`] - Ligand residue extraction at atom or motif granularity
//! - [`fragment`] - Bond perception and ring/acyclic motif decomposition

pub mod blocks;
pub mod fragment;
pub mod ligand;
