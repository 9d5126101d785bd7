//! Property tests for normalization and factor-algebra invariants.

use bayesnet::{Distribution, Factor, VarId};
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_distribution_sums_to_one(values in prop::collection::vec(1e-6f64..1e3, 1..8)) {
        let states = (0..values.len()).map(|i| format!("s{i}")).collect();
        let mut d = Distribution::new("x", states, values);
        d.normalize(-1.0).unwrap();
        let sum: f64 = d.values.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sum_out_preserves_total_mass(
        dims in prop::collection::vec(1usize..4, 2..4),
        seed in 0u64..1000,
    ) {
        let len: usize = dims.iter().product();
        let data: Vec<f64> = (0..len).map(|i| ((i as u64 * 31 + seed) % 97) as f64 / 97.0).collect();
        let vars: Vec<VarId> = (0..dims.len() as u32).map(VarId).collect();
        let f = Factor::new(vars.clone(), dims, data.clone()).unwrap();
        let total: f64 = data.iter().sum();

        let g = f.sum_out(&[vars[0]]).unwrap();
        let reduced: f64 = g.data().iter().sum();
        prop_assert!((total - reduced).abs() < 1e-9);
    }

    #[test]
    fn multiply_then_sum_out_matches_direct_marginal(
        nx in 1usize..4,
        ny in 1usize..4,
        nz in 1usize..4,
        seed in 0u64..1000,
    ) {
        let val = |i: usize, salt: u64| ((i as u64 * 13 + salt + seed) % 89) as f64 / 89.0;
        let d1: Vec<f64> = (0..nx * ny).map(|i| val(i, 1)).collect();
        let d2: Vec<f64> = (0..ny * nz).map(|i| val(i, 2)).collect();
        let (x, y, z) = (VarId(0), VarId(1), VarId(2));
        let f1 = Factor::new(vec![x, y], vec![nx, ny], d1.clone()).unwrap();
        let f2 = Factor::new(vec![y, z], vec![ny, nz], d2.clone()).unwrap();

        let product = Factor::multiply(&[&f1, &f2]);
        prop_assert_eq!(product.vars(), &[x, y, z]);

        // product values match the pointwise definition
        for ix in 0..nx {
            for iy in 0..ny {
                for iz in 0..nz {
                    let got = product.data()[(ix * ny + iy) * nz + iz];
                    let want = d1[ix * ny + iy] * d2[iy * nz + iz];
                    prop_assert!((got - want).abs() < 1e-12);
                }
            }
        }

        // summing out the shared variable equals the direct marginal
        let marginal = product.sum_out(&[y]).unwrap();
        for ix in 0..nx {
            for iz in 0..nz {
                let got = marginal.data()[ix * nz + iz];
                let want: f64 = (0..ny).map(|iy| d1[ix * ny + iy] * d2[iy * nz + iz]).sum();
                prop_assert!((got - want).abs() < 1e-9);
            }
        }
    }
}
