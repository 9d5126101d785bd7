//! The inference engine for discrete Bayesian networks.
//!
//! This module provides:
//! - **errors**: error types for construction and inference failures
//! - **distribution**: named per-variable probability vectors
//! - **factor**: flattened probability tables and their algebra
//! - **variable**: network nodes with conditional tables and evidence
//! - **network**: the variable arena, topology, and inference drivers
//! - **inference**: the local sum-product and blanket-resampling kernels
//! - **ordering**: elimination-order heuristics
//! - **bucket**: factor pools for variable elimination
//! - **query**: reusable, cached query plans
//! - **simulate**: cooperative iteration control for sampling runs

pub mod bucket;
pub mod distribution;
pub mod errors;
pub mod factor;
pub mod inference;
pub mod network;
pub mod ordering;
pub mod query;
pub mod simulate;
pub mod variable;
