//! Error types for network construction and inference.

use thiserror::Error;

/// Errors raised by network construction, structural edits, and inference.
///
/// Every failure is deterministic and synchronous: it is raised at the point
/// of violation and never retried internally. A structurally inconsistent
/// network (for instance a table whose length no longer matches its
/// variables' cardinalities) is a hard failure, not a best-effort repair.
///
/// The enum is `#[non_exhaustive]` so new variants can be added without
/// breaking downstream matches.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BayesError {
    /// A node with this name is already registered in the network.
    #[error("variable '{0}' already exists")]
    DuplicateVariable(String),

    /// Lookup by name failed.
    #[error("variable '{0}' not found")]
    VariableNotFound(String),

    /// Topological ordering failed; the listed variables form at least one
    /// directed cycle.
    #[error("cycle detected: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    /// Forward inference requires every parent of an evidence node to be
    /// observed as well.
    #[error("parent '{parent}' of evidence node '{child}' has no evidence")]
    MissingEvidenceForParent { parent: String, child: String },

    /// Bulk table assignment with data of the wrong length.
    #[error("new table has wrong length ({actual} should be {expected})")]
    InvalidTableLength { expected: usize, actual: usize },

    /// A distribution with (near-)zero total mass cannot be normalized.
    #[error("distribution of '{0}' sums to zero")]
    DistributionSumsToZero(String),

    /// A posterior drifted outside the normalization tolerance, which means
    /// an upstream table was not a proper conditional distribution.
    #[error("denormalized posterior distribution of '{variable}': {sum}")]
    Denormalized { variable: String, sum: f64 },

    /// A state name was not found on the variable.
    #[error("no state '{state}' of variable '{variable}' exists")]
    StateNotFound { variable: String, state: String },

    /// A variable must keep at least one state.
    #[error("cannot remove last state '{state}' from '{variable}'")]
    LastState { variable: String, state: String },

    /// `remove_parent` on a pair that is not linked.
    #[error("variable '{parent}' is not a parent of '{child}'")]
    NotAParent { parent: String, child: String },

    /// Summing out a variable the factor does not range over.
    #[error("cannot sum out variable {0}: not in factor")]
    NotInFactor(u32),

    /// Variables are created with at least one state.
    #[error("must have at least one state")]
    NoStates,

    /// Prior access on a variable that has a conditional table.
    #[error("variable '{variable}' has a conditional table ({parents} parents)")]
    NotAPrior { variable: String, parents: usize },

    /// `get_marginal` before `solve()`, or after `invalidate()` without a
    /// fresh solve.
    #[error("no solution cached for query '{0}'")]
    NoSolution(String),

    /// `get_marginal` for a variable outside the query set.
    #[error("variable '{0}' was not queried")]
    NotQueried(String),

    /// A named posterior log that was never recorded.
    #[error("no log '{log}' for variable '{variable}'")]
    NoSuchLog { log: String, variable: String },

    /// Iteration budget of a running simulation control cannot change.
    #[error("cannot change iteration count while running")]
    SimulationRunning,

    /// Snapshot serialization, deserialization, or compatibility failure.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}
