//! Local inference kernels: exact per-node sum-product and the
//! Markov-blanket resampling rule.

use rand::Rng;

use crate::engine::distribution::TOLERANCE;
use crate::engine::errors::BayesError;
use crate::engine::factor::Factor;

/// Marginal of a variable from its conditional table and its parents'
/// current posteriors.
///
/// For each state `s` of the table's first variable, sums over every joint
/// parent assignment the product of the parents' posterior probabilities
/// and the table entry at `(s, assignment)`. The result is normalized with
/// the standard drift tolerance: a sum far from 1 means the table was not a
/// proper conditional distribution.
pub fn conditional(
    table: &Factor,
    parents: &[&[f64]],
    variable: &str,
) -> Result<Vec<f64>, BayesError> {
    let dims = table.dims();
    let data = table.data();
    let states = dims[0];
    let cols = data.len() / states;

    let mut out = vec![0.0; states];
    let mut t = 0;
    for slot in out.iter_mut() {
        let mut digits = vec![0usize; parents.len()];
        let mut y = 0.0;
        for _ in 0..cols {
            let mut x = 1.0;
            for (i, post) in parents.iter().enumerate() {
                x *= post[digits[i]];
            }
            y += x * data[t];
            t += 1;

            let mut j = digits.len();
            while j > 0 {
                j -= 1;
                digits[j] += 1;
                if digits[j] == dims[j + 1] {
                    digits[j] = 0;
                } else {
                    break;
                }
            }
        }
        *slot = y;
    }

    let sum: f64 = out.iter().sum();
    if sum <= f64::EPSILON {
        return Err(BayesError::DistributionSumsToZero(variable.to_string()));
    }
    if (1.0 - sum).abs() > TOLERANCE {
        return Err(BayesError::Denormalized {
            variable: variable.to_string(),
            sum,
        });
    }
    for v in &mut out {
        *v /= sum;
    }
    Ok(out)
}

/// One child's contribution to a blanket computation: its flattened table,
/// a cursor positioned at the candidate-state-zero entry, and the stride
/// that advances the cursor when the resampled variable's candidate state
/// increments.
pub struct ChildSlice<'a> {
    pub table: &'a [f64],
    pub index: usize,
    pub stride: usize,
}

/// Resamples a variable from its Markov blanket.
///
/// For every candidate state `i` the weight is the table entry for `i`
/// under the current parent assignment (`rest_offset`), times each child's
/// table entry under the child's current state and parent assignment with
/// this variable set to `i`. The normalized weights are written to `out`
/// (they double as the variable's queryable posterior), then a state is
/// drawn by inverse transform: the first `i` whose cumulative weight
/// exceeds a uniform draw, falling back to the last state when rounding
/// error keeps the cumulative sum below the draw.
pub fn blanket<R: Rng>(
    rng: &mut R,
    table: &Factor,
    rest_offset: usize,
    children: &mut [ChildSlice<'_>],
    out: &mut [f64],
) -> usize {
    let states = out.len();
    let jump = table.len() / states;
    let data = table.data();

    let mut sum = 0.0;
    let mut base = 0;
    for slot in out.iter_mut() {
        let mut p = data[base + rest_offset];
        base += jump;
        for c in children.iter_mut() {
            p *= c.table[c.index];
            c.index += c.stride;
        }
        *slot = p;
        sum += p;
    }

    if sum > 0.0 {
        for v in out.iter_mut() {
            *v /= sum;
        }
    }

    let q: f64 = rng.gen();
    let mut acc = 0.0;
    for (i, &v) in out.iter().enumerate() {
        acc += v;
        if acc > q {
            return i;
        }
    }
    states - 1
}
