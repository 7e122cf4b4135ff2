//! # Core Models Module
//!
//! Data structures describing molecules at the two granularities the library works
//! with.
//!
//! ## Key Components
//!
//! - [`atom`] - An element-labelled position owned by a block
//! - [`block`] - A residue or ligand fragment: the unit the interface graph is built on
//! - [`pdb_index`] - Provenance keys mapping blocks back to chain and residue numbering
//! - [`structure`] - The model/chain/residue hierarchy produced by the PDB reader
//!
//! ## Usage
//!
//! ```ignore
//! use atomica::core::models::{atom::Atom, block::Block};
//! use nalgebra::Point3;
//!
//! let block = Block::new("G", vec![Atom::new("CA", "C", Point3::new(0.0, 0.0, 0.0))]);
//! assert_eq!(block.len(), 1);
//! ```

pub mod atom;
pub mod block;
pub mod pdb_index;
pub mod structure;
