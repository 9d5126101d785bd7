//! Benchmarks for the inference hot paths:
//! - forward sum-product over a chain network
//! - one Gibbs sweep
//! - a cached bucket-elimination solve

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use bayesnet::{Network, Query, RunOnce};

/// A chain a0 -> a1 -> ... of binary variables with deterministic,
/// well-normalized tables.
fn chain(len: usize) -> Network {
    let mut net = Network::new("chain");
    let mut prev = None;
    for i in 0..len {
        let id = net.add_node(&format!("a{i}"), &["T", "F"]).unwrap();
        match prev {
            None => net.set_prior(id, &[0.3, 0.7]).unwrap(),
            Some(p) => {
                net.add_parent(id, p).unwrap();
                let skew = 0.5 + 0.4 * ((i % 5) as f64 / 5.0);
                net.set_conditional(id, &[skew, 1.0 - skew, 1.0 - skew, skew])
                    .unwrap();
            }
        }
        prev = Some(id);
    }
    net
}

fn bench_forward_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_inference");
    for len in [8, 32, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut net = chain(len);
            b.iter(|| {
                net.inference().unwrap();
                black_box(net.var(net.node("a0").unwrap()).posterior().values[0]);
            });
        });
    }
    group.finish();
}

fn bench_gibbs_sweeps(c: &mut Criterion) {
    let mut group = c.benchmark_group("gibbs_sweeps");
    for len in [8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut net = chain(len);
            let mut rng = SmallRng::seed_from_u64(42);
            net.markov_start().unwrap();
            b.iter(|| {
                net.markov_sweep(&mut rng).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_query_solve(c: &mut Criterion) {
    c.bench_function("query_solve_chain32", |b| {
        let mut net = chain(32);
        net.observe("a0", "T").unwrap();
        let mut q = Query::new("bench");
        q.set_queried(&["a31"]);
        q.set_observed(&["a0"]);
        b.iter(|| {
            q.invalidate();
            q.solve(&mut net).unwrap();
            black_box(q.get_marginal("a31").unwrap().values[0]);
        });
    });
}

fn bench_full_simulation(c: &mut Criterion) {
    c.bench_function("markov_blanket_1k_iters", |b| {
        let mut net = chain(16);
        let mut rng = SmallRng::seed_from_u64(7);
        b.iter(|| {
            let mut ctl = RunOnce::new(1_000, false);
            net.markov_blanket(&mut ctl, &mut rng).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_forward_inference,
    bench_gibbs_sweeps,
    bench_query_solve,
    bench_full_simulation
);
criterion_main!(benches);
