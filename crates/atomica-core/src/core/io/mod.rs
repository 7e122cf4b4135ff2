//! Provides input functionality for molecular structure file formats.
//!
//! Readers implement the [`traits::StructureFile`] trait, which offers a common API for
//! parsing from any buffered reader or directly from a path.

pub mod pdb;
pub mod traits;
