//! Elimination-order heuristics for bucket elimination.

use tracing::debug;

use crate::engine::network::Network;
use crate::engine::variable::VarId;

/// A complete elimination sequence for one query shape.
///
/// Observed variables come first (they are never eliminated), hidden
/// variables follow in min-weight order, and the queried variables come
/// last so their joint factor survives elimination. The weight of a hidden
/// variable is the product of the state counts of its current
/// neighborhood; neighborhoods start from the variables sharing a table
/// and gain fill-in links between the neighbors of each eliminated
/// variable.
#[derive(Debug, Clone)]
pub struct Ordering {
    order: Vec<VarId>,
    num_query: usize,
}

impl Ordering {
    /// Computes an elimination order for the given queried variables under
    /// the network's current evidence flags.
    ///
    /// Ties in weight break toward the earlier arena id, so the result is
    /// deterministic for a given construction order.
    pub fn compute(net: &Network, queried: &[VarId]) -> Ordering {
        let n = net.num_vars();
        let mut order = Vec::with_capacity(n);

        // observed variables lead the order and take no part in the
        // neighborhood structure
        let mut links: Vec<Option<Vec<VarId>>> = vec![None; n];
        for id in net.ids() {
            if net.var(id).observed() {
                order.push(id);
            } else {
                links[id.index()] = Some(vec![id]);
            }
        }

        for id in net.ids() {
            if !net.var(id).observed() {
                let group = net.var(id).table().vars().to_vec();
                link_group(&mut links, &group);
            }
        }

        let is_queried = |id: VarId| queried.contains(&id);
        let mut take_queried = false;
        while order.len() < n {
            let mut best: Option<(VarId, u64)> = None;
            for id in net.ids() {
                if links[id.index()].is_none() || (!take_queried && is_queried(id)) {
                    continue;
                }
                let weight = neighborhood_weight(net, links[id.index()].as_deref().unwrap_or(&[]));
                if best.map_or(true, |(_, w)| weight < w) {
                    best = Some((id, weight));
                }
            }

            if let Some((id, _)) = best {
                for l in links.iter_mut().flatten() {
                    l.retain(|&x| x != id);
                }
                order.push(id);
                if let Some(group) = links[id.index()].take() {
                    // fill-in: the eliminated variable's neighbors become
                    // mutual neighbors
                    link_group(&mut links, &group);
                }
            }

            if order.len() == n - queried.len() {
                take_queried = true;
            }
        }

        debug!(queried = queried.len(), nodes = n, "elimination order computed");
        Ordering {
            order,
            num_query: queried.len(),
        }
    }

    /// The full sequence: observed, then hidden, then queried variables.
    pub fn order(&self) -> &[VarId] {
        &self.order
    }

    /// Number of queried variables at the tail of the sequence.
    pub fn num_query(&self) -> usize {
        self.num_query
    }
}

fn neighborhood_weight(net: &Network, neighbors: &[VarId]) -> u64 {
    neighbors
        .iter()
        .map(|&v| net.var(v).num_states() as u64)
        .product()
}

/// Interconnects every pair of the group; members without a link list
/// (observed variables) are skipped.
fn link_group(links: &mut [Option<Vec<VarId>>], group: &[VarId]) {
    for i in 0..group.len() {
        for j in i + 1..group.len() {
            let (a, b) = (group[i], group[j]);
            if links[a.index()].is_none() || links[b.index()].is_none() {
                continue;
            }
            if let Some(la) = &mut links[a.index()] {
                if !la.contains(&b) {
                    la.push(b);
                }
            }
            if let Some(lb) = &mut links[b.index()] {
                if !lb.contains(&a) {
                    lb.push(a);
                }
            }
        }
    }
}
