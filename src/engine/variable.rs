//! Network variables: named finite-valued nodes with conditional tables.

use std::fmt;

use crate::engine::distribution::Distribution;
use crate::engine::errors::BayesError;
use crate::engine::factor::Factor;

/// A unique identifier for a variable in a network's arena.
///
/// Parent and child links are stored as ids rather than references, so the
/// parent/child back-edges never form ownership cycles.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarId(pub u32);

impl VarId {
    /// Arena index of this id.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cached stride of a variable's axis inside one child's table, rebuilt at
/// the start of every sampling run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildStride {
    pub child: VarId,
    pub stride: usize,
}

/// A single node of the network: one variable of the joint distribution.
///
/// Holds the variable's conditional table (over `[self] ++ parents`, a
/// one-variable prior when there are no parents), its current posterior,
/// evidence status, the current sampled state for Markov-chain iteration,
/// and per-state sample tallies for the running Monte-Carlo average.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VarId,
    name: String,
    parents: Vec<VarId>,
    children: Vec<VarId>,
    table: Factor,
    posterior: Distribution,
    observed: bool,
    ev_state: usize,
    state: usize,
    counts: Vec<u64>,
    topo_index: Option<usize>,
    pub(crate) blanket: Vec<ChildStride>,
}

impl Variable {
    /// Builds a variable; called by the owning network when a node is
    /// added, which is where the id is minted.
    pub(crate) fn new(id: VarId, name: String, states: Vec<String>) -> Result<Self, BayesError> {
        if states.is_empty() {
            return Err(BayesError::NoStates);
        }
        let n = states.len();
        Ok(Self {
            id,
            name: name.clone(),
            parents: Vec::new(),
            children: Vec::new(),
            table: Factor::point(id, n),
            posterior: Distribution::point(name, states, 0),
            observed: false,
            ev_state: 0,
            state: 0,
            counts: vec![0; n],
            topo_index: None,
            blanket: Vec::new(),
        })
    }

    /// The variable's arena id.
    pub fn id(&self) -> VarId {
        self.id
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State names, unique and ordered.
    pub fn states(&self) -> &[String] {
        &self.posterior.states
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.posterior.states.len()
    }

    /// Index of a state by name.
    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.posterior.state_index(state)
    }

    /// Parents in edge-insertion order.
    pub fn parents(&self) -> &[VarId] {
        &self.parents
    }

    /// Children in edge-insertion order.
    pub fn children(&self) -> &[VarId] {
        &self.children
    }

    /// The conditional table over `[self] ++ parents`.
    pub fn table(&self) -> &Factor {
        &self.table
    }

    /// The current posterior (exact marginal, or the blanket-conditional
    /// distribution of the latest Gibbs resample).
    pub fn posterior(&self) -> &Distribution {
        &self.posterior
    }

    /// Whether the variable currently carries evidence.
    pub fn observed(&self) -> bool {
        self.observed
    }

    /// The pinned evidence state; meaningful while `observed` is set and
    /// retained across evidence clear/re-apply cycles.
    pub fn ev_state(&self) -> usize {
        self.ev_state
    }

    /// The evidence state as an option, present only under evidence.
    pub fn observed_state(&self) -> Option<usize> {
        self.observed.then_some(self.ev_state)
    }

    /// Current sampled state index.
    pub fn state(&self) -> usize {
        self.state
    }

    /// Name of the current sampled state.
    pub fn state_name(&self) -> &str {
        &self.posterior.states[self.state]
    }

    /// Position in the topological order, once ordered.
    pub fn topo_index(&self) -> Option<usize> {
        self.topo_index
    }

    /// Whether the variable is an unobserved root (prior-only node).
    pub fn is_prior(&self) -> bool {
        !self.observed && self.parents.is_empty()
    }

    /// Pins evidence to the named state.
    pub fn observe(&mut self, state: &str) -> Result<(), BayesError> {
        let idx = self
            .state_index(state)
            .ok_or_else(|| BayesError::StateNotFound {
                variable: self.name.clone(),
                state: state.to_string(),
            })?;
        self.ev_state = idx;
        self.state = idx;
        self.observed = true;
        Ok(())
    }

    /// Toggles the evidence flag without touching the pinned state.
    pub fn set_observed(&mut self, observed: bool) {
        self.observed = observed;
    }

    /// Re-applies previously pinned evidence.
    pub fn reload_evidence(&mut self) {
        self.observed = true;
        self.state = self.ev_state;
    }

    /// Prior data of a parentless variable.
    pub fn prior(&self) -> Result<&[f64], BayesError> {
        if !self.table.is_unary() {
            return Err(BayesError::NotAPrior {
                variable: self.name.clone(),
                parents: self.parents.len(),
            });
        }
        Ok(self.table.data())
    }

    /// The running Monte-Carlo average over sampled states; for an observed
    /// variable this is its (fixed) posterior.
    pub fn average(&self) -> Result<Vec<f64>, BayesError> {
        if self.observed {
            return Ok(self.posterior.values.clone());
        }
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Err(BayesError::DistributionSumsToZero(self.name.clone()));
        }
        Ok(self
            .counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect())
    }

    pub(crate) fn table_mut(&mut self) -> &mut Factor {
        &mut self.table
    }

    pub(crate) fn set_table(&mut self, table: Factor) {
        self.table = table;
    }

    pub(crate) fn posterior_mut(&mut self) -> &mut Distribution {
        &mut self.posterior
    }

    pub(crate) fn parents_mut(&mut self) -> &mut Vec<VarId> {
        &mut self.parents
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<VarId> {
        &mut self.children
    }

    pub(crate) fn counts_mut(&mut self) -> &mut Vec<u64> {
        &mut self.counts
    }

    pub(crate) fn set_state(&mut self, state: usize) {
        self.state = state;
    }

    pub(crate) fn set_ev_state(&mut self, state: usize) {
        self.ev_state = state;
        if self.observed {
            self.state = state;
        }
    }

    pub(crate) fn set_topo_index(&mut self, index: Option<usize>) {
        self.topo_index = index;
    }

    pub(crate) fn tally(&mut self, state: usize) {
        self.counts[state] += 1;
    }

    pub(crate) fn reset_counts(&mut self) {
        for c in &mut self.counts {
            *c = 0;
        }
    }
}
