//! Reusable query plans over a network.

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::engine::bucket;
use crate::engine::distribution::Distribution;
use crate::engine::errors::BayesError;
use crate::engine::factor::Factor;
use crate::engine::network::Network;
use crate::engine::ordering::Ordering;
use crate::engine::simulate::RunOnce;
use crate::engine::variable::VarId;

/// A reusable way of asking a network the same question: a declared set of
/// observed, prior-overridable, and queried variables. The expensive
/// parts, the elimination ordering and the solution density, are cached
/// between solves.
///
/// The cache survives evidence *value* changes (the solution keeps the
/// evidence dimensions, which are conditioned out per solve), but the
/// caller must [`Query::invalidate`] after any structural edit or prior
/// override; mutation is not auto-detected.
#[derive(Debug)]
pub struct Query {
    name: String,
    queried: Vec<String>,
    observed: Vec<String>,
    priors: Vec<String>,
    ordering: Option<Ordering>,
    solution: Option<Factor>,
    results: FxHashMap<String, Distribution>,
    cached: bool,
    approx: bool,
}

impl Query {
    /// An empty query plan; declare its variable sets before solving.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queried: Vec::new(),
            observed: Vec::new(),
            priors: Vec::new(),
            ordering: None,
            solution: None,
            results: FxHashMap::default(),
            cached: false,
            approx: false,
        }
    }

    /// The query's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares the variables whose marginals the query answers.
    pub fn set_queried(&mut self, vars: &[&str]) {
        self.queried = vars.iter().map(|s| s.to_string()).collect();
        self.results.clear();
        self.invalidate();
    }

    /// Declares the variables carrying evidence at solve time.
    pub fn set_observed(&mut self, vars: &[&str]) {
        self.observed = vars.iter().map(|s| s.to_string()).collect();
        self.invalidate();
    }

    /// Declares the variables whose priors may be substituted between
    /// solves without altering structure.
    pub fn set_prior(&mut self, vars: &[&str]) {
        self.priors = vars.iter().map(|s| s.to_string()).collect();
        self.invalidate();
    }

    /// Drops the cached ordering, solution, and results. Must be called
    /// after any structural edit to the network or prior override.
    pub fn invalidate(&mut self) {
        self.cached = false;
        self.approx = false;
    }

    /// Solves the network exactly by bucket elimination.
    ///
    /// Re-applies the declared observed set, reuses the cached ordering and
    /// solution density when still valid, conditions the evidence
    /// dimensions out at their currently pinned states, and stores each
    /// queried variable's normalized marginal.
    pub fn solve(&mut self, net: &mut Network) -> Result<(), BayesError> {
        let ids: Vec<VarId> = net.ids().collect();
        for id in &ids {
            net.var_mut(*id).set_observed(false);
        }
        for name in &self.observed {
            let id = net.node(name)?;
            net.var_mut(id).set_observed(true);
        }

        if !self.cached {
            let queried: Vec<VarId> = self
                .queried
                .iter()
                .map(|name| net.node(name))
                .collect::<Result<_, _>>()?;
            net.order()?;
            let ordering = Ordering::compute(net, &queried);
            let solution = bucket::eliminate(net, &ordering)?;
            self.ordering = Some(ordering);
            self.solution = Some(solution);
            self.cached = true;
        }

        let solution = self
            .solution
            .as_ref()
            .ok_or_else(|| BayesError::NoSolution(self.name.clone()))?;
        let mut result =
            solution.condition_observed(|v| net.var(v).observed_state());
        result.normalize();

        for name in &self.queried {
            let id = net.node(name)?;
            let mut marginal = result.sum_out_except(&[id])?;
            marginal.normalize();
            let dist = Distribution::new(
                name.clone(),
                net.var(id).states().to_vec(),
                marginal.data().to_vec(),
            );
            self.results.insert(name.clone(), dist);
        }
        Ok(())
    }

    /// Approximates the queried marginals by Gibbs sampling instead of
    /// exact elimination.
    pub fn approx<R: Rng>(
        &mut self,
        net: &mut Network,
        rng: &mut R,
        iterations: usize,
    ) -> Result<(), BayesError> {
        let mut ctl = RunOnce::new(iterations, false);
        net.markov_blanket(&mut ctl, rng)?;
        for name in &self.queried {
            let id = net.node(name)?;
            let values = net.var(id).average()?;
            let dist = Distribution::new(
                name.clone(),
                net.var(id).states().to_vec(),
                values,
            );
            self.results.insert(name.clone(), dist);
        }
        self.approx = true;
        Ok(())
    }

    /// The cached marginal of a queried variable.
    ///
    /// Fails before the first `solve`/`approx` and after `invalidate`
    /// until a fresh solve completes.
    pub fn get_marginal(&self, var: &str) -> Result<&Distribution, BayesError> {
        if !self.cached && !self.approx {
            return Err(BayesError::NoSolution(self.name.clone()));
        }
        self.results
            .get(var)
            .ok_or_else(|| BayesError::NotQueried(var.to_string()))
    }

    /// Renders the query's setup (evidence states and overridden priors)
    /// for debugging.
    pub fn render_setup(&self, net: &Network) -> Result<String, BayesError> {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "net {}, query {}:", net.name(), self.name);
        for name in &self.observed {
            let id = net.node(name)?;
            let v = net.var(id);
            let _ = writeln!(out, "\tEV: {} = {}", name, v.states()[v.ev_state()]);
        }
        for name in &self.priors {
            let id = net.node(name)?;
            let _ = writeln!(out, "\tPD: {}: {:?}", name, net.var(id).table().data());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marginal_before_solve_is_an_error() {
        let q = Query::new("q");
        assert!(matches!(
            q.get_marginal("a"),
            Err(BayesError::NoSolution(_))
        ));
    }

    #[test]
    fn solve_then_invalidate_requires_resolve() {
        let mut net = Network::new("test");
        let a = net.add_node("a", &["T", "F"]).unwrap();
        net.set_prior(a, &[0.3, 0.7]).unwrap();

        let mut q = Query::new("q");
        q.set_queried(&["a"]);
        q.set_observed(&[]);
        q.solve(&mut net).unwrap();
        let m = q.get_marginal("a").unwrap();
        assert!((m.values[0] - 0.3).abs() < 1e-9);

        q.invalidate();
        assert!(matches!(
            q.get_marginal("a"),
            Err(BayesError::NoSolution(_))
        ));
    }

    #[test]
    fn unqueried_variable_is_an_error_after_solve() {
        let mut net = Network::new("test");
        let a = net.add_node("a", &["T", "F"]).unwrap();
        net.set_prior(a, &[0.5, 0.5]).unwrap();
        net.add_node("b", &["T", "F"]).unwrap();

        let mut q = Query::new("q");
        q.set_queried(&["a"]);
        q.solve(&mut net).unwrap();
        assert!(matches!(
            q.get_marginal("b"),
            Err(BayesError::NotQueried(_))
        ));
    }
}
