//! Snapshot persistence for networks.
//!
//! A snapshot stores the network name and every variable (name, states,
//! evidence, parent links, and flattened table data) in topological
//! order, so restoring reproduces identical topological indexes. Parent
//! links are stored as topological positions, which are always smaller
//! than the owning variable's own position.

use serde::{Deserialize, Serialize};

use crate::engine::errors::BayesError;
use crate::engine::network::Network;

/// Metadata included in snapshots for compatibility checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Engine version string.
    pub version: String,
}

/// One variable's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub states: Vec<String>,
    pub observed: bool,
    pub ev_state: usize,
    /// Topological positions of the parents, in edge-insertion order.
    pub parents: Vec<usize>,
    /// Flattened conditional table over `[self] ++ parents`.
    pub table: Vec<f64>,
    /// Current posterior values.
    pub posterior: Vec<f64>,
}

/// A complete, restorable capture of a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub name: String,
    pub variables: Vec<VariableRecord>,
}

impl Snapshot {
    /// Captures a network, ordering it first.
    pub fn capture(net: &mut Network) -> Result<Snapshot, BayesError> {
        net.order()?;
        let order: Vec<_> = (0..net.num_vars())
            .map(|i| net.node_at(i))
            .collect::<Result<_, _>>()?;

        let variables = order
            .iter()
            .map(|&id| {
                let v = net.var(id);
                let parents = v
                    .parents()
                    .iter()
                    .map(|&p| {
                        net.var(p)
                            .topo_index()
                            .ok_or_else(|| BayesError::Snapshot("unordered parent".to_string()))
                    })
                    .collect::<Result<_, _>>()?;
                Ok(VariableRecord {
                    name: v.name().to_string(),
                    states: v.states().to_vec(),
                    observed: v.observed(),
                    ev_state: v.ev_state(),
                    parents,
                    table: v.table().data().to_vec(),
                    posterior: v.posterior().values.clone(),
                })
            })
            .collect::<Result<_, BayesError>>()?;

        Ok(Snapshot {
            metadata: SnapshotMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            name: net.name().to_string(),
            variables,
        })
    }

    /// Rebuilds the captured network.
    ///
    /// Variables are inserted in the captured (topological) order, so a
    /// fresh ordering pass assigns the same topological indexes the
    /// capture had.
    pub fn restore(&self) -> Result<Network, BayesError> {
        let mut net = Network::new(&self.name);
        let mut ids = Vec::with_capacity(self.variables.len());

        for rec in &self.variables {
            let id = net.add_node(&rec.name, &rec.states)?;
            ids.push(id);
        }
        for (i, rec) in self.variables.iter().enumerate() {
            for &p in &rec.parents {
                let parent = *ids.get(p).ok_or_else(|| {
                    BayesError::Snapshot(format!("parent index {p} out of range"))
                })?;
                net.add_parent(ids[i], parent)?;
            }
            net.set_conditional(ids[i], &rec.table)?;
            let v = net.var_mut(ids[i]);
            v.posterior_mut().values = rec.posterior.clone();
            v.set_ev_state(rec.ev_state);
            v.set_observed(rec.observed);
            if rec.observed {
                v.reload_evidence();
            }
        }

        net.order()?;
        Ok(net)
    }

    /// Checks that this snapshot was produced by the running engine
    /// version.
    pub fn validate_compatibility(&self) -> Result<(), BayesError> {
        let current = env!("CARGO_PKG_VERSION");
        if self.metadata.version != current {
            return Err(BayesError::Snapshot(format!(
                "version mismatch: snapshot was created with {}, current is {}",
                self.metadata.version, current
            )));
        }
        Ok(())
    }
}

/// Saves a snapshot as a JSON string.
pub fn save_snapshot_json(snapshot: &Snapshot) -> Result<String, BayesError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| BayesError::Snapshot(e.to_string()))
}

/// Loads a snapshot from a JSON string, checking compatibility.
pub fn load_snapshot_json(json: &str) -> Result<Snapshot, BayesError> {
    let snapshot: Snapshot =
        serde_json::from_str(json).map_err(|e| BayesError::Snapshot(e.to_string()))?;
    snapshot.validate_compatibility()?;
    Ok(snapshot)
}

/// Saves a snapshot in a compact binary form.
pub fn save_snapshot_binary(snapshot: &Snapshot) -> Result<Vec<u8>, BayesError> {
    bincode::serialize(snapshot).map_err(|e| BayesError::Snapshot(e.to_string()))
}

/// Loads a snapshot from its binary form, checking compatibility.
pub fn load_snapshot_binary(data: &[u8]) -> Result<Snapshot, BayesError> {
    let snapshot: Snapshot =
        bincode::deserialize(data).map_err(|e| BayesError::Snapshot(e.to_string()))?;
    snapshot.validate_compatibility()?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_net() -> Network {
        let mut net = Network::new("persist");
        let a = net.add_node("a", &["T", "F"]).unwrap();
        let b = net.add_node("b", &["T", "F"]).unwrap();
        net.add_parent(b, a).unwrap();
        net.set_prior(a, &[0.2, 0.8]).unwrap();
        net.set_conditional(b, &[0.8, 0.2, 0.2, 0.8]).unwrap();
        net.observe("a", "F").unwrap();
        net
    }

    #[test]
    fn capture_restore_round_trip_is_net_equal() {
        let mut net = sample_net();
        let snapshot = Snapshot::capture(&mut net).unwrap();
        let restored = snapshot.restore().unwrap();
        assert!(net.equals_for_net(&restored));
    }

    #[test]
    fn restore_reassigns_identical_topo_indexes() {
        let mut net = sample_net();
        let snapshot = Snapshot::capture(&mut net).unwrap();
        let mut restored = snapshot.restore().unwrap();
        for i in 0..net.num_vars() {
            let orig = net.node_at(i).unwrap();
            let back = restored.node_at(i).unwrap();
            assert_eq!(net.var(orig).name(), restored.var(back).name());
        }
    }

    #[test]
    fn version_mismatch_fails_compatibility() {
        let mut net = sample_net();
        let mut snapshot = Snapshot::capture(&mut net).unwrap();
        snapshot.metadata.version = "0.0.0-other".to_string();
        assert!(matches!(
            snapshot.validate_compatibility(),
            Err(BayesError::Snapshot(_))
        ));
    }

    #[test]
    fn json_round_trip_preserves_tables() {
        let mut net = sample_net();
        let snapshot = Snapshot::capture(&mut net).unwrap();
        let json = save_snapshot_json(&snapshot).unwrap();
        let loaded = load_snapshot_json(&json).unwrap();
        let restored = loaded.restore().unwrap();
        assert!(net.equals_for_net(&restored));
    }

    #[test]
    fn binary_round_trip_preserves_tables() {
        let mut net = sample_net();
        let snapshot = Snapshot::capture(&mut net).unwrap();
        let bytes = save_snapshot_binary(&snapshot).unwrap();
        let loaded = load_snapshot_binary(&bytes).unwrap();
        let restored = loaded.restore().unwrap();
        assert!(net.equals_for_net(&restored));
    }
}
