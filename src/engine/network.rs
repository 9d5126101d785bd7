//! The network: an arena of variables, their edges, topological order,
//! exact forward inference, and the Gibbs-sampling driver.

use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::engine::distribution::Distribution;
use crate::engine::errors::BayesError;
use crate::engine::inference;
use crate::engine::inference::ChildSlice;
use crate::engine::simulate::SimControl;
use crate::engine::variable::{ChildStride, VarId, Variable};

/// A Bayesian network: a DAG of finite-valued variables, each carrying a
/// conditional probability table over itself and its parents.
///
/// Exact posteriors come from [`Network::inference`] (forward sum-product
/// in topological order, valid when every evidence node's parents are also
/// observed) or from a [`crate::engine::query::Query`] (bucket elimination,
/// valid for any evidence pattern). Approximate posteriors come from
/// [`Network::markov_blanket`], a single-site Gibbs sampler driven in
/// resumable batches.
///
/// All inference entry points run to completion on the calling thread; the
/// only concurrency seam is the batch boundary of the sampler.
#[derive(Debug, Clone)]
pub struct Network {
    name: String,
    vars: Vec<Variable>,
    index: FxHashMap<String, VarId>,
    topo: Option<Vec<VarId>>,
    inc_log: Vec<Vec<Vec<f64>>>,
}

impl Network {
    /// Creates an empty network.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            index: FxHashMap::default(),
            topo: None,
            inc_log: Vec::new(),
        }
    }

    /// The network's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Number of variables currently carrying evidence.
    pub fn num_observed(&self) -> usize {
        self.vars.iter().filter(|v| v.observed()).count()
    }

    /// All variable ids in arena (insertion) order.
    pub fn ids(&self) -> impl Iterator<Item = VarId> + '_ {
        (0..self.vars.len() as u32).map(VarId)
    }

    /// Adds a variable with the given states; duplicate names fail.
    pub fn add_node<S: AsRef<str>>(
        &mut self,
        name: &str,
        states: &[S],
    ) -> Result<VarId, BayesError> {
        if self.index.contains_key(name) {
            return Err(BayesError::DuplicateVariable(name.to_string()));
        }
        let id = VarId(self.vars.len() as u32);
        let states = states.iter().map(|s| s.as_ref().to_string()).collect();
        let var = Variable::new(id, name.to_string(), states)?;
        self.vars.push(var);
        self.index.insert(name.to_string(), id);
        self.topo = None;
        Ok(id)
    }

    /// Looks a variable up by name.
    pub fn node(&self, name: &str) -> Result<VarId, BayesError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| BayesError::VariableNotFound(name.to_string()))
    }

    /// The variable behind an id minted by this network.
    ///
    /// Panics on an id from a different network, like any out-of-bounds
    /// index.
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.index()]
    }

    pub(crate) fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.index()]
    }

    /// The variable at a position of the topological order.
    pub fn node_at(&mut self, index: usize) -> Result<VarId, BayesError> {
        self.order()?;
        Ok(self.topo_ref()[index])
    }

    fn topo_ref(&self) -> &[VarId] {
        self.topo.as_deref().unwrap_or(&[])
    }

    /// Ensures a fresh topological order, failing on cycles.
    ///
    /// A variable is placed once all of its parents are placed; if a full
    /// scan places nobody, the remaining variables form at least one cycle
    /// and the error names all of them. Idempotent while the structure is
    /// unchanged; any structural edit marks the order stale.
    pub fn order(&mut self) -> Result<(), BayesError> {
        if let Some(topo) = &self.topo {
            if topo.len() == self.vars.len() {
                return Ok(());
            }
        }

        let n = self.vars.len();
        for v in &mut self.vars {
            v.set_topo_index(None);
        }

        let mut topo = Vec::with_capacity(n);
        while topo.len() < n {
            let mut placed = 0;
            for i in 0..n {
                if self.vars[i].topo_index().is_some() {
                    continue;
                }
                let ready = self.vars[i]
                    .parents()
                    .iter()
                    .all(|&p| self.vars[p.index()].topo_index().is_some());
                if ready {
                    self.vars[i].set_topo_index(Some(topo.len()));
                    topo.push(VarId(i as u32));
                    placed += 1;
                }
            }
            if placed == 0 {
                let names = self
                    .vars
                    .iter()
                    .filter(|v| v.topo_index().is_none())
                    .map(|v| v.name().to_string())
                    .collect();
                self.topo = None;
                return Err(BayesError::CycleDetected(names));
            }
        }

        debug!(network = %self.name, nodes = n, "topological order refreshed");
        self.topo = Some(topo);
        Ok(())
    }

    /// Discards any cached order and recomputes it.
    pub fn force_order(&mut self) -> Result<(), BayesError> {
        self.topo = None;
        self.order()
    }

    fn topo_vec(&mut self) -> Result<Vec<VarId>, BayesError> {
        self.order()?;
        Ok(self.topo_ref().to_vec())
    }

    // ----- structure -------------------------------------------------

    /// Adds `parent` to `child`'s parent list.
    ///
    /// The child's table grows a new fastest-varying dimension for the
    /// parent, duplicating the existing entries across the parent's states.
    pub fn add_parent(&mut self, child: VarId, parent: VarId) -> Result<(), BayesError> {
        let states = self.vars[parent.index()].num_states();
        let table = self.vars[child.index()].table().add_var(parent, states);
        let v = &mut self.vars[child.index()];
        v.set_table(table);
        v.parents_mut().push(parent);
        self.vars[parent.index()].children_mut().push(child);
        self.topo = None;
        Ok(())
    }

    /// Unlinks `parent` from `child`, conditioning the child's table on the
    /// parent being in `keep_state`.
    ///
    /// The kept slice replaces the table; the other parent states' entries
    /// are discarded, not averaged or summed.
    pub fn remove_parent(
        &mut self,
        child: VarId,
        parent: VarId,
        keep_state: &str,
    ) -> Result<(), BayesError> {
        let axis = self.vars[child.index()]
            .parents()
            .iter()
            .position(|&p| p == parent)
            .ok_or_else(|| BayesError::NotAParent {
                parent: self.vars[parent.index()].name().to_string(),
                child: self.vars[child.index()].name().to_string(),
            })?;
        let slice = self.vars[parent.index()]
            .state_index(keep_state)
            .ok_or_else(|| BayesError::StateNotFound {
                variable: self.vars[parent.index()].name().to_string(),
                state: keep_state.to_string(),
            })?;

        self.vars[parent.index()]
            .children_mut()
            .retain(|&c| c != child);
        let table = self.vars[child.index()].table().condition(axis + 1, slice);
        let v = &mut self.vars[child.index()];
        v.set_table(table);
        v.parents_mut().remove(axis);
        self.topo = None;
        Ok(())
    }

    /// Adds a state to a variable, updating every table that ranges over
    /// it.
    ///
    /// The new state's slice duplicates the previous last state's slice in
    /// the variable's own table and in every child's table; the variable's
    /// posterior gains the state with probability 0.
    pub fn add_state(&mut self, id: VarId, state: &str) -> Result<(), BayesError> {
        let v = &mut self.vars[id.index()];
        v.posterior_mut().add_state(state);
        v.counts_mut().push(0);
        let table = v.table().add_state(0);
        v.set_table(table);

        let children = self.vars[id.index()].children().to_vec();
        for child in children {
            let axis = self.parent_axis(child, id);
            let table = self.vars[child.index()].table().add_state(axis);
            self.vars[child.index()].set_table(table);
        }
        Ok(())
    }

    /// Removes a state from a variable, updating every table that ranges
    /// over it and renormalizing the variable's prior and posterior.
    pub fn remove_state(&mut self, id: VarId, state: &str) -> Result<(), BayesError> {
        let v = &mut self.vars[id.index()];
        let idx = v.posterior_mut().remove_state(state)?;
        v.counts_mut().remove(idx);
        let table = v.table().remove_state(0, idx);
        v.set_table(table);

        let children = self.vars[id.index()].children().to_vec();
        for child in children {
            let axis = self.parent_axis(child, id);
            let table = self.vars[child.index()].table().remove_state(axis, idx);
            self.vars[child.index()].set_table(table);
        }
        Ok(())
    }

    /// Axis of `parent` in `child`'s table (self is axis 0).
    fn parent_axis(&self, child: VarId, parent: VarId) -> usize {
        let pos = self.vars[child.index()]
            .parents()
            .iter()
            .position(|&p| p == parent);
        match pos {
            Some(i) => i + 1,
            None => 0,
        }
    }

    /// Bulk-assigns a parentless variable's prior, validated for length.
    pub fn set_prior(&mut self, id: VarId, data: &[f64]) -> Result<(), BayesError> {
        self.vars[id.index()].table_mut().set_data(data.to_vec())
    }

    /// Bulk-assigns a variable's conditional table, validated for length.
    pub fn set_conditional(&mut self, id: VarId, data: &[f64]) -> Result<(), BayesError> {
        self.vars[id.index()].table_mut().set_data(data.to_vec())
    }

    // ----- evidence --------------------------------------------------

    /// Pins the named variable to the named state.
    pub fn observe(&mut self, var: &str, state: &str) -> Result<(), BayesError> {
        let id = self.node(var)?;
        self.vars[id.index()].observe(state)
    }

    /// Drops the evidence flag from every variable; tables and pinned
    /// evidence states are untouched.
    pub fn clear_evidence(&mut self) {
        for v in &mut self.vars {
            v.set_observed(false);
        }
    }

    // ----- exact inference -------------------------------------------

    /// Forward sum-product pass over the whole network.
    ///
    /// Requires that every evidence node's parents are also observed; each
    /// variable's posterior is then fully determined by its table and its
    /// parents' already-computed posteriors, walking the topological order.
    /// Observed variables get a one-hot posterior at their evidence state.
    pub fn inference(&mut self) -> Result<(), BayesError> {
        let order = self.topo_vec()?;

        for &id in &order {
            let v = &self.vars[id.index()];
            if !v.observed() {
                continue;
            }
            for &p in v.parents() {
                if !self.vars[p.index()].observed() {
                    return Err(BayesError::MissingEvidenceForParent {
                        parent: self.vars[p.index()].name().to_string(),
                        child: v.name().to_string(),
                    });
                }
            }
        }

        for &id in &order {
            enum Update {
                Choose(usize),
                Values(Vec<f64>),
            }
            let update = {
                let v = &self.vars[id.index()];
                if v.observed() {
                    Update::Choose(v.ev_state())
                } else if v.parents().is_empty() {
                    Update::Values(v.table().data().to_vec())
                } else {
                    let posts: Vec<&[f64]> = v
                        .parents()
                        .iter()
                        .map(|&p| self.vars[p.index()].posterior().values.as_slice())
                        .collect();
                    Update::Values(inference::conditional(v.table(), &posts, v.name())?)
                }
            };
            let post = self.vars[id.index()].posterior_mut();
            match update {
                Update::Choose(s) => post.choose(s),
                Update::Values(values) => post.values = values,
            }
        }
        Ok(())
    }

    // ----- Gibbs sampling --------------------------------------------

    /// Prepares a sampling run: seeds every unobserved variable at its
    /// table's most likely state under the current parent states, clears
    /// the sample tallies, and caches each variable's stride inside its
    /// children's tables.
    pub fn markov_start(&mut self) -> Result<(), BayesError> {
        let order = self.topo_vec()?;
        for &id in &order {
            if self.vars[id.index()].observed() {
                let ev = self.vars[id.index()].ev_state();
                self.vars[id.index()].set_state(ev);
                continue;
            }

            let rest = self.parent_config_index(id);
            let state = self.vars[id.index()].table().most_likely_at(rest);

            let children = self.vars[id.index()].children().to_vec();
            let mut blanket = Vec::with_capacity(children.len());
            for child in children {
                let cv = &self.vars[child.index()];
                let mut stride = 1;
                for j in (1..=cv.parents().len()).rev() {
                    if cv.table().vars()[j] == id {
                        break;
                    }
                    stride *= cv.table().dims()[j];
                }
                blanket.push(ChildStride { child, stride });
            }

            let v = &mut self.vars[id.index()];
            v.set_state(state);
            v.reset_counts();
            v.blanket = blanket;
        }
        Ok(())
    }

    /// One full sweep: every unobserved variable is resampled from its
    /// Markov blanket, in topological order, updating its state and
    /// posterior in place so later variables in the same sweep see the new
    /// value.
    pub fn markov_sweep<R: Rng>(&mut self, rng: &mut R) -> Result<(), BayesError> {
        let order = self.topo_vec()?;
        for &id in &order {
            if self.vars[id.index()].observed() {
                continue;
            }

            let (weights, state) = {
                let v = &self.vars[id.index()];
                let rest = self.parent_config_index(id);
                let mut slices = Vec::with_capacity(v.blanket.len());
                for cs in &v.blanket {
                    let cv = &self.vars[cs.child.index()];
                    let jump = cv.table().len() / cv.num_states();
                    let start = jump * cv.state() + self.parent_config_index_masked(cs.child, id);
                    slices.push(ChildSlice {
                        table: cv.table().data(),
                        index: start,
                        stride: cs.stride,
                    });
                }
                let mut weights = vec![0.0; v.num_states()];
                let state = inference::blanket(rng, v.table(), rest, &mut slices, &mut weights);
                (weights, state)
            };

            let v = &mut self.vars[id.index()];
            v.posterior_mut().values = weights;
            v.set_state(state);
            v.tally(state);
        }
        Ok(())
    }

    /// Runs sweeps until the control asks to pause; returns whether the
    /// whole simulation is finished.
    ///
    /// Together with [`Network::markov_start`] this is the resumable form
    /// of the sampler: a host may interleave batches of independent work
    /// between calls instead of parking a thread for the whole run.
    pub fn markov_batch<R: Rng>(
        &mut self,
        ctl: &mut dyn SimControl,
        rng: &mut R,
    ) -> Result<bool, BayesError> {
        while !ctl.stop() {
            self.markov_sweep(rng)?;
            if ctl.log() {
                self.inc_record()?;
            }
            ctl.iter_done();
        }
        Ok(ctl.done())
    }

    /// Runs a complete Markov-blanket simulation under the given control.
    ///
    /// Every unobserved variable's posterior ends up holding its latest
    /// blanket-conditional distribution, and the per-state tallies hold the
    /// run's Monte-Carlo averages.
    pub fn markov_blanket<R: Rng>(
        &mut self,
        ctl: &mut dyn SimControl,
        rng: &mut R,
    ) -> Result<(), BayesError> {
        self.markov_start()?;
        ctl.begin();
        while !self.markov_batch(ctl, rng)? {}
        ctl.end();
        Ok(())
    }

    /// Flat index of `id`'s current parent assignment within one slice of
    /// its table (last parent fastest).
    fn parent_config_index(&self, id: VarId) -> usize {
        let mut idx = 0;
        let mut base = 1;
        for &p in self.vars[id.index()].parents().iter().rev() {
            let pv = &self.vars[p.index()];
            idx += base * pv.state();
            base *= pv.num_states();
        }
        idx
    }

    /// Like [`Network::parent_config_index`], with `masked` treated as
    /// being in state 0.
    fn parent_config_index_masked(&self, id: VarId, masked: VarId) -> usize {
        let mut idx = 0;
        let mut base = 1;
        for &p in self.vars[id.index()].parents().iter().rev() {
            let pv = &self.vars[p.index()];
            if p != masked {
                idx += base * pv.state();
            }
            base *= pv.num_states();
        }
        idx
    }

    /// Replaces the prior of every unobserved root variable with its
    /// accumulated Monte-Carlo average.
    ///
    /// Fails when a variable has no samples yet.
    pub fn map_avg_to_prior(&mut self) -> Result<(), BayesError> {
        for i in 0..self.vars.len() {
            if self.vars[i].is_prior() {
                let avg = self.vars[i].average()?;
                self.vars[i].table_mut().set_data(avg)?;
            }
        }
        Ok(())
    }

    // ----- recording and queries -------------------------------------

    /// Appends every variable's current posterior, in topological order, to
    /// the incremental log.
    pub fn inc_record(&mut self) -> Result<(), BayesError> {
        let order = self.topo_vec()?;
        let row = order
            .iter()
            .map(|&id| self.vars[id.index()].posterior().values.clone())
            .collect();
        self.inc_log.push(row);
        Ok(())
    }

    /// Returns the incremental log for the named variables, indexed by
    /// `[iteration][variable][state]`.
    pub fn inc_dump(&mut self, vars: &[&str]) -> Result<Vec<Vec<Vec<f64>>>, BayesError> {
        let idxs = self.topo_indexes(vars)?;
        Ok(self
            .inc_log
            .iter()
            .map(|row| idxs.iter().map(|&i| row[i].clone()).collect())
            .collect())
    }

    /// Clears the incremental log.
    pub fn inc_clear(&mut self) {
        self.inc_log.clear();
    }

    fn topo_indexes(&mut self, vars: &[&str]) -> Result<Vec<usize>, BayesError> {
        self.order()?;
        vars.iter()
            .map(|name| {
                let id = self.node(name)?;
                self.vars[id.index()]
                    .topo_index()
                    .ok_or_else(|| BayesError::VariableNotFound((*name).to_string()))
            })
            .collect()
    }

    /// Monte-Carlo average distributions for the named variables.
    pub fn averages(&self, vars: &[&str]) -> Result<Vec<Vec<f64>>, BayesError> {
        vars.iter()
            .map(|name| {
                let id = self.node(name)?;
                self.vars[id.index()].average()
            })
            .collect()
    }

    /// Records every variable's posterior under a log name.
    pub fn record(&mut self, logname: &str) {
        for v in &mut self.vars {
            v.posterior_mut().record(logname);
        }
    }

    /// Restores every variable's posterior from a log name.
    pub fn recall(&mut self, logname: &str) -> Result<(), BayesError> {
        for v in &mut self.vars {
            v.posterior_mut().recall(logname)?;
        }
        Ok(())
    }

    /// Current posterior distributions of the named variables, in argument
    /// order.
    pub fn dist_query(&self, vars: &[&str]) -> Result<Vec<Distribution>, BayesError> {
        self.query_dist(None, vars)
    }

    /// Posterior distributions of the named variables, from a named
    /// recording when `logname` is given.
    pub fn query_dist(
        &self,
        logname: Option<&str>,
        vars: &[&str],
    ) -> Result<Vec<Distribution>, BayesError> {
        vars.iter()
            .map(|name| {
                let id = self.node(name)?;
                self.vars[id.index()].posterior().retrieve(logname)
            })
            .collect()
    }

    /// Structural and numeric equality as relevant for persistence: same
    /// name, same variables with the same states, evidence, parent names,
    /// and table contents.
    pub fn equals_for_net(&self, other: &Network) -> bool {
        if self.name != other.name || self.vars.len() != other.vars.len() {
            return false;
        }
        for v in &self.vars {
            let Ok(oid) = other.node(v.name()) else {
                return false;
            };
            let o = other.var(oid);
            if v.observed() != o.observed()
                || v.ev_state() != o.ev_state()
                || v.states() != o.states()
                || v.table().data() != o.table().data()
            {
                return false;
            }
            let vp: Vec<&str> = v.parents().iter().map(|&p| self.var(p).name()).collect();
            let op: Vec<&str> = o.parents().iter().map(|&p| other.var(p).name()).collect();
            if vp != op {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> (Network, VarId, VarId, VarId) {
        let mut net = Network::new("test");
        let c = net.add_node("c", &["baz"]).unwrap();
        let b = net.add_node("b", &["bar"]).unwrap();
        let a = net.add_node("a", &["foo"]).unwrap();
        (net, a, b, c)
    }

    #[test]
    fn add_node_rejects_duplicate_names() {
        let mut net = Network::new("test");
        net.add_node("a", &["x"]).unwrap();
        let err = net.add_node("a", &["y"]).unwrap_err();
        assert!(matches!(err, BayesError::DuplicateVariable(_)));
    }

    #[test]
    fn add_node_rejects_empty_state_list() {
        let mut net = Network::new("test");
        let states: [&str; 0] = [];
        let err = net.add_node("a", &states).unwrap_err();
        assert!(matches!(err, BayesError::NoStates));
    }

    #[test]
    fn node_lookup_fails_for_unknown_name() {
        let net = Network::new("test");
        assert!(matches!(
            net.node("ghost"),
            Err(BayesError::VariableNotFound(_))
        ));
    }

    #[test]
    fn order_respects_parent_links() {
        let (mut net, a, b, c) = abc();
        net.add_parent(b, a).unwrap();
        net.add_parent(c, b).unwrap();
        assert_eq!(net.node_at(0).unwrap(), a);
        assert_eq!(net.node_at(1).unwrap(), b);
        assert_eq!(net.node_at(2).unwrap(), c);
    }

    #[test]
    fn order_reports_cycle_members() {
        let (mut net, a, b, _c) = abc();
        net.add_parent(a, b).unwrap();
        net.add_parent(b, a).unwrap();
        match net.force_order() {
            Err(BayesError::CycleDetected(mut names)) => {
                names.sort();
                assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn structural_edit_marks_order_stale() {
        let (mut net, a, b, _c) = abc();
        net.order().unwrap();
        net.add_parent(b, a).unwrap();
        assert!(net.topo.is_none());
        net.order().unwrap();
        assert!(net.var(a).topo_index().unwrap() < net.var(b).topo_index().unwrap());
    }

    #[test]
    fn observe_unknown_state_fails() {
        let (mut net, _a, _b, _c) = abc();
        let err = net.observe("a", "nope").unwrap_err();
        assert!(matches!(err, BayesError::StateNotFound { .. }));
    }

    #[test]
    fn clear_evidence_keeps_pinned_state() {
        let mut net = Network::new("test");
        let a = net.add_node("a", &["x", "y"]).unwrap();
        net.observe("a", "y").unwrap();
        net.clear_evidence();
        assert!(!net.var(a).observed());
        assert_eq!(net.var(a).ev_state(), 1);
    }

    #[test]
    fn inference_requires_observed_parents_of_evidence() {
        let mut net = Network::new("test");
        let a = net.add_node("a", &["T", "F"]).unwrap();
        let b = net.add_node("b", &["T", "F"]).unwrap();
        net.add_parent(b, a).unwrap();
        net.set_prior(a, &[0.5, 0.5]).unwrap();
        net.set_conditional(b, &[0.9, 0.2, 0.1, 0.8]).unwrap();
        net.observe("b", "T").unwrap();
        let err = net.inference().unwrap_err();
        assert!(matches!(
            err,
            BayesError::MissingEvidenceForParent { .. }
        ));
    }

    #[test]
    fn table_length_tracks_state_counts_through_edits() {
        let mut net = Network::new("test");
        let a = net.add_node("a", &["a1", "a2"]).unwrap();
        let b = net.add_node("b", &["b1", "b2", "b3"]).unwrap();
        net.add_parent(b, a).unwrap();
        assert_eq!(net.var(b).table().len(), 6);
        net.add_state(a, "a3").unwrap();
        assert_eq!(net.var(b).table().len(), 9);
        net.add_state(b, "b4").unwrap();
        assert_eq!(net.var(b).table().len(), 12);
        net.remove_state(a, "a1").unwrap();
        assert_eq!(net.var(b).table().len(), 8);
        net.remove_parent(b, a, "a2").unwrap();
        assert_eq!(net.var(b).table().len(), 4);
    }
}
