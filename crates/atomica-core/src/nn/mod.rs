//! # Neural Network Module
//!
//! The hierarchical graph neural network that turns batched interface graphs into
//! binding affinity predictions.
//!
//! ## Overview
//!
//! Atoms exchange messages with their nearest neighbours (atom level), are pooled into
//! their blocks through attention, and blocks exchange messages with their nearest
//! neighbours (block level). A feed-forward head maps every block to an energy and the
//! energies of a sample are summed.
//!
//! ## Architecture
//!
//! - **Batching** ([`batch`]) - Collation of graph samples and host-side bookkeeping
//! - **Building Blocks** ([`layers`], [`edges`], [`encoder`], [`attention`]) - MLPs,
//!   scatter helpers, kNN and global edges, message-passing stacks
//! - **Backbone** ([`backbone`]) - The pretrainable two-level encoder
//! - **Predictor** ([`affinity`]) - `AffinityPredictor`, block-embedding mixing and
//!   persistence
//! - **Weight Transfer** ([`params`], [`pretrained`]) - Parameter groups, freezing and
//!   fine-tuning from pretrained checkpoints
//! - **Configuration & Errors** ([`config`], [`error`])

pub mod affinity;
pub mod attention;
pub mod backbone;
pub mod batch;
pub mod config;
pub mod edges;
pub mod encoder;
pub mod error;
pub mod layers;
pub mod params;
pub mod pretrained;
