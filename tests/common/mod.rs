//! Shared fixtures for the integration tests.

// not every test binary uses every fixture
#![allow(dead_code)]

use bayesnet::Network;

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "index {i}: expected {e:.15}, got {a:.15}, diff={:.3e}",
            (a - e).abs()
        );
    }
}

/// Five-node medical-style network with known hand-computed posteriors:
/// a -> {b, c}, {b, c} -> d, c -> e, all binary.
pub fn medical() -> Network {
    let mut net = Network::new("medical");
    let a = net.add_node("a", &["T", "F"]).unwrap();
    let b = net.add_node("b", &["T", "F"]).unwrap();
    let c = net.add_node("c", &["T", "F"]).unwrap();
    let d = net.add_node("d", &["T", "F"]).unwrap();
    let e = net.add_node("e", &["T", "F"]).unwrap();
    net.add_parent(b, a).unwrap();
    net.add_parent(c, a).unwrap();
    net.add_parent(d, c).unwrap();
    net.add_parent(d, b).unwrap();
    net.add_parent(e, c).unwrap();
    net.set_prior(a, &[0.2, 0.8]).unwrap();
    net.set_conditional(b, &[0.8, 0.2, 0.2, 0.8]).unwrap();
    net.set_conditional(c, &[0.2, 0.05, 0.8, 0.95]).unwrap();
    net.set_conditional(d, &[0.8, 0.8, 0.8, 0.05, 0.2, 0.2, 0.2, 0.95])
        .unwrap();
    net.set_conditional(e, &[0.8, 0.6, 0.2, 0.4]).unwrap();
    net
}

/// Three nodes with hand-edited states and one conditional link, the
/// fixture behind the structural-edit expectations.
pub fn editable() -> Network {
    let mut net = Network::new("edit");
    let c = net.add_node("c", &["baz"]).unwrap();
    let b = net.add_node("b", &["bar"]).unwrap();
    let a = net.add_node("a", &["foo"]).unwrap();
    net.add_state(a, "a2").unwrap();
    net.add_state(b, "b2").unwrap();
    net.add_state(c, "c2").unwrap();
    net.add_state(c, "c3").unwrap();
    net.add_parent(b, a).unwrap();
    net.set_conditional(b, &[0.3, 0.1, 0.7, 0.9]).unwrap();
    net
}
