//! # Core Module
//!
//! Fundamental data structures and algorithms for turning molecular complexes into
//! interface graphs.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, blocks, PDB provenance keys and
//!   the parsed structure hierarchy
//! - **Vocabulary** ([`vocab`]) - Block and atom type tokens, including the synthetic
//!   global tokens
//! - **Shared Instances** ([`registry`]) - Lazily-initialized, type-keyed process-wide
//!   instances
//! - **File I/O** ([`io`]) - Fixed-column PDB reading
//! - **Conversion** ([`convert`]) - Structure-to-block conversion, ligand extraction and
//!   motif fragmentation
//! - **Interface Extraction** ([`interface`]) - Distance-threshold selection of the
//!   blocks facing the other side of a complex
//! - **Graph Building** ([`graph`]) - Flattening two block lists into model-ready arrays
//! - **Utilities** ([`utils`]) - Geometry helpers

pub mod convert;
pub mod graph;
pub mod interface;
pub mod io;
pub mod models;
pub mod registry;
pub mod utils;
pub mod vocab;
