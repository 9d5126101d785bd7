//! Buckets of factors for generalized variable elimination.

use crate::engine::errors::BayesError;
use crate::engine::factor::Factor;
use crate::engine::network::Network;
use crate::engine::ordering::Ordering;
use crate::engine::variable::VarId;

/// A pool of factors gathered for one elimination variable.
///
/// Eliminating multiplies the pool into a cluster and sums the bucket
/// variable out of it, yielding the separator that flows on to the next
/// bucket mentioning any of its variables. A terminal bucket (no
/// elimination variable, used for the queried variables) keeps the cluster
/// itself as separator.
#[derive(Debug)]
pub struct Bucket {
    variable: Option<VarId>,
    pool: Vec<Factor>,
    separator: Option<Factor>,
}

impl Bucket {
    /// A bucket that will eliminate `variable` from `pool`.
    pub fn new(variable: VarId, pool: Vec<Factor>) -> Self {
        Self {
            variable: Some(variable),
            pool,
            separator: None,
        }
    }

    /// A terminal bucket over the queried variables' factors.
    pub fn terminal(pool: Vec<Factor>) -> Self {
        Self {
            variable: None,
            pool,
            separator: None,
        }
    }

    /// The separator, once produced.
    pub fn separator(&self) -> Option<&Factor> {
        self.separator.as_ref()
    }

    /// Multiplies the pool and sums out the bucket variable.
    pub fn eliminate(&mut self) -> Result<&Factor, BayesError> {
        let cluster = Factor::multiply(&self.pool.iter().collect::<Vec<_>>());
        let separator = match self.variable {
            Some(v) => cluster.sum_out(&[v])?,
            None => cluster,
        };
        Ok(self.separator.insert(separator))
    }

    /// For a terminal bucket: the cluster itself becomes the separator,
    /// with evidence dimensions left in place for later conditioning.
    pub fn sum_out_evidence(&mut self) -> &Factor {
        let cluster = Factor::multiply(&self.pool.iter().collect::<Vec<_>>());
        self.separator.insert(cluster)
    }

    fn take_separator(&mut self) -> Option<Factor> {
        self.separator.take()
    }
}

/// Runs bucket elimination over the network's tables.
///
/// Every table enters a shared pool; each hidden variable, in elimination
/// order, draws the pooled factors that mention it into a bucket, and the
/// bucket's separator returns to the pool. The factors mentioning queried
/// variables form the terminal bucket, whose cluster (still carrying the
/// observed variables' dimensions) is the solution density.
pub(crate) fn eliminate(net: &Network, ordering: &Ordering) -> Result<Factor, BayesError> {
    let mut pool: Vec<Factor> = net.ids().map(|id| net.var(id).table().clone()).collect();

    let seq = ordering.order();
    let num_observed = net.num_observed();
    let num_hidden = seq.len() - ordering.num_query() - num_observed;

    for &v in &seq[num_observed..num_observed + num_hidden] {
        let sub = drain_mentioning(&mut pool, &[v]);
        let mut bucket = Bucket::new(v, sub);
        bucket.eliminate()?;
        if let Some(sep) = bucket.take_separator() {
            pool.push(sep);
        }
    }

    let queried = &seq[seq.len() - ordering.num_query()..];
    let qsub = drain_mentioning(&mut pool, queried);
    let mut root = Bucket::terminal(qsub);
    root.sum_out_evidence();
    root.take_separator()
        .ok_or_else(|| BayesError::NoSolution("elimination produced no density".to_string()))
}

/// Removes from the pool every factor mentioning any of the given
/// variables, returning them in pool order.
fn drain_mentioning(pool: &mut Vec<Factor>, vars: &[VarId]) -> Vec<Factor> {
    let mut sub = Vec::new();
    let mut i = 0;
    while i < pool.len() {
        if pool[i].vars().iter().any(|v| vars.contains(v)) {
            sub.push(pool.remove(i));
        } else {
            i += 1;
        }
    }
    sub
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> VarId {
        VarId(i)
    }

    #[test]
    fn eliminate_sums_bucket_variable_out_of_cluster() {
        let f1 = Factor::new(vec![id(0), id(1)], vec![2, 2], vec![0.2, 0.3, 0.5, 0.7]).unwrap();
        let f2 = Factor::new(vec![id(1), id(2)], vec![2, 2], vec![1.1, 1.3, 1.7, 1.9]).unwrap();
        let mut bucket = Bucket::new(id(1), vec![f1, f2]);
        let sep = bucket.eliminate().unwrap();
        assert_eq!(sep.vars(), &[id(0), id(2)]);
        // sums of the known product table over the shared variable
        let expected = [
            0.22 + 0.51,
            0.26 + 0.57,
            0.55 + 1.19,
            0.65 + 1.33,
        ];
        for (a, b) in sep.data().iter().zip(expected) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn terminal_bucket_keeps_cluster_as_separator() {
        let f = Factor::new(vec![id(0)], vec![2], vec![0.4, 0.6]).unwrap();
        let mut bucket = Bucket::terminal(vec![f.clone()]);
        let sep = bucket.sum_out_evidence();
        assert_eq!(sep.data(), f.data());
    }

    #[test]
    fn drain_pulls_only_factors_mentioning_variable() {
        let f1 = Factor::new(vec![id(0)], vec![2], vec![0.4, 0.6]).unwrap();
        let f2 = Factor::new(vec![id(1)], vec![2], vec![0.5, 0.5]).unwrap();
        let mut pool = vec![f1, f2];
        let sub = drain_mentioning(&mut pool, &[id(0)]);
        assert_eq!(sub.len(), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].vars(), &[id(1)]);
    }
}
