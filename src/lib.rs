//! # bayesnet: discrete Bayesian-network inference
//!
//! A network is a directed acyclic graph of finite-valued random
//! variables, each carrying a conditional probability table over itself
//! and its parents. The crate computes marginal and posterior
//! distributions either exactly (forward sum-product over the
//! topological order, or generalized bucket elimination behind a reusable
//! [`Query`] plan) or approximately, by Markov-blanket Gibbs sampling
//! driven in resumable batches through a [`SimControl`].
//!
//! Networks support incremental structural edits (adding and removing
//! parents and states) that keep every affected table's shape and
//! contents consistent.
//!
//! ## Architecture
//!
//! - **engine**: the data model (distributions, factors, variables), the
//!   network itself, and both inference paths
//! - **storage**: snapshot persistence for trained or edited networks
//!   (`serde` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use bayesnet::{Network, Query};
//!
//! let mut net = Network::new("sprinkler");
//! let rain = net.add_node("rain", &["yes", "no"])?;
//! let wet = net.add_node("wet", &["yes", "no"])?;
//! net.add_parent(wet, rain)?;
//! net.set_prior(rain, &[0.2, 0.8])?;
//! net.set_conditional(wet, &[0.9, 0.1, 0.1, 0.9])?;
//!
//! net.inference()?;
//! let grass = net.dist_query(&["wet"])?;
//! ```

#![forbid(unsafe_code)]

pub mod engine;
#[cfg(feature = "serde")]
pub mod storage;

pub use engine::bucket::Bucket;
pub use engine::distribution::{Distribution, TOLERANCE};
pub use engine::errors::BayesError;
pub use engine::factor::Factor;
pub use engine::network::Network;
pub use engine::ordering::Ordering;
pub use engine::query::Query;
pub use engine::simulate::{RunOnce, SimControl};
pub use engine::variable::{VarId, Variable};
