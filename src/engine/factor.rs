//! Probability factors: flattened tables over ordered variable lists.
//!
//! A [`Factor`] maps every joint assignment of its variables to a
//! non-negative value. It acts as a prior (one variable), a conditional
//! probability table (a child followed by its parents), or an intermediate
//! product during elimination. Data is stored row-major with the first
//! variable varying slowest and the last varying fastest.
//!
//! Structural edits (`add_var`, `condition`, `add_state`, `remove_state`)
//! build a fresh tensor and return it; the caller swaps in the result. The
//! factor tracks its own dimension sizes, so its algebra never reaches back
//! into the owning network.

use smallvec::SmallVec;
use tracing::warn;

use crate::engine::errors::BayesError;
use crate::engine::variable::VarId;

type VarList = SmallVec<[VarId; 4]>;
type DimList = SmallVec<[usize; 4]>;

/// A table over an ordered list of variables, flattened row-major.
///
/// Invariant: `data.len() == dims.iter().product()`, with `dims[i]` the
/// state count of `vars[i]`, no variable listed twice.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    vars: VarList,
    dims: DimList,
    data: Vec<f64>,
}

impl Factor {
    /// A degenerate one-variable factor with all mass on the first state.
    pub fn point(var: VarId, states: usize) -> Self {
        let mut data = vec![0.0; states];
        data[0] = 1.0;
        Self {
            vars: SmallVec::from_slice(&[var]),
            dims: SmallVec::from_slice(&[states]),
            data,
        }
    }

    /// Builds a factor from explicit parts, validating the data length.
    pub fn new(vars: Vec<VarId>, dims: Vec<usize>, data: Vec<f64>) -> Result<Self, BayesError> {
        let expected: usize = dims.iter().product();
        if data.len() != expected {
            return Err(BayesError::InvalidTableLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            vars: SmallVec::from_vec(vars),
            dims: SmallVec::from_vec(dims),
            data,
        })
    }

    /// The ordered variable list.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// State counts aligned with `vars`.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// The flattened table.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Total number of table entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the table is empty (never true for a well-formed factor).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the factor ranges over a single variable.
    pub fn is_unary(&self) -> bool {
        self.vars.len() == 1
    }

    /// Whether `var` is among the factor's variables.
    pub fn contains(&self, var: VarId) -> bool {
        self.vars.contains(&var)
    }

    /// Axis of `var`, if present.
    pub fn position(&self, var: VarId) -> Option<usize> {
        self.vars.iter().position(|&v| v == var)
    }

    /// Flat-index stride of an axis: the product of all faster dimensions.
    pub fn stride(&self, axis: usize) -> usize {
        self.dims[axis + 1..].iter().product()
    }

    /// Replaces the table data, validating the length.
    pub fn set_data(&mut self, data: Vec<f64>) -> Result<(), BayesError> {
        if data.len() != self.data.len() {
            return Err(BayesError::InvalidTableLength {
                expected: self.data.len(),
                actual: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }

    /// Pointwise product of factors, broadcasting over missing variables.
    ///
    /// The result ranges over the union of the inputs' variables in
    /// first-appearance order; its value at a joint assignment is the
    /// product of each input's value at that assignment's projection onto
    /// the input's own variables. Multiplying no factors yields the scalar
    /// factor 1.
    pub fn multiply(factors: &[&Factor]) -> Factor {
        let mut vars = VarList::new();
        let mut dims = DimList::new();
        for f in factors {
            for (i, &v) in f.vars.iter().enumerate() {
                if !vars.contains(&v) {
                    vars.push(v);
                    dims.push(f.dims[i]);
                }
            }
        }
        let len: usize = dims.iter().product();

        // per-factor stride of each result axis; zero when the factor
        // lacks the variable, so broadcasting needs no special case
        let strides: Vec<Vec<usize>> = factors
            .iter()
            .map(|f| {
                vars.iter()
                    .map(|&v| f.position(v).map_or(0, |p| f.stride(p)))
                    .collect()
            })
            .collect();

        let mut data = vec![0.0; len];
        let mut digits = vec![0usize; vars.len()];
        let mut offsets = vec![0usize; factors.len()];
        for cell in data.iter_mut() {
            let mut p = 1.0;
            for (k, f) in factors.iter().enumerate() {
                p *= f.data[offsets[k]];
            }
            *cell = p;

            // advance the joint assignment, fastest axis first, keeping
            // every factor's flat offset in step
            let mut j = vars.len();
            while j > 0 {
                j -= 1;
                digits[j] += 1;
                if digits[j] == dims[j] {
                    digits[j] = 0;
                    for (k, s) in strides.iter().enumerate() {
                        offsets[k] -= (dims[j] - 1) * s[j];
                    }
                } else {
                    for (k, s) in strides.iter().enumerate() {
                        offsets[k] += s[j];
                    }
                    break;
                }
            }
        }

        Factor { vars, dims, data }
    }

    /// Sums the given variables out of the factor.
    ///
    /// The result keeps the remaining variables in their current relative
    /// order; each of its entries is the sum over all states of the removed
    /// variables with the kept variables fixed.
    pub fn sum_out(&self, outs: &[VarId]) -> Result<Factor, BayesError> {
        for &v in outs {
            if !self.contains(v) {
                return Err(BayesError::NotInFactor(v.0));
            }
        }

        let keep: Vec<usize> = (0..self.vars.len())
            .filter(|&i| !outs.contains(&self.vars[i]))
            .collect();
        let kvars: VarList = keep.iter().map(|&i| self.vars[i]).collect();
        let kdims: DimList = keep.iter().map(|&i| self.dims[i]).collect();
        let rlen: usize = kdims.iter().product();

        // result stride of each input axis; zero for summed-out axes
        let mut rstride = vec![0usize; self.vars.len()];
        let mut mult = 1;
        for &i in keep.iter().rev() {
            rstride[i] = mult;
            mult *= self.dims[i];
        }

        let mut out = vec![0.0; rlen];
        let mut digits = vec![0usize; self.vars.len()];
        let mut ridx = 0usize;
        for &value in &self.data {
            out[ridx] += value;
            let mut j = self.vars.len();
            while j > 0 {
                j -= 1;
                digits[j] += 1;
                if digits[j] == self.dims[j] {
                    digits[j] = 0;
                    ridx -= (self.dims[j] - 1) * rstride[j];
                } else {
                    ridx += rstride[j];
                    break;
                }
            }
        }

        Ok(Factor {
            vars: kvars,
            dims: kdims,
            data: out,
        })
    }

    /// Sums out every variable except the given ones.
    ///
    /// Variables in `keep` that the factor does not range over are ignored.
    pub fn sum_out_except(&self, keep: &[VarId]) -> Result<Factor, BayesError> {
        let outs: Vec<VarId> = self
            .vars
            .iter()
            .copied()
            .filter(|v| !keep.contains(v))
            .collect();
        self.sum_out(&outs)
    }

    /// Appends a new fastest-varying variable of `states` states,
    /// duplicating every existing entry across the new dimension.
    pub fn add_var(&self, var: VarId, states: usize) -> Factor {
        let mut data = Vec::with_capacity(self.data.len() * states);
        for &x in &self.data {
            for _ in 0..states {
                data.push(x);
            }
        }
        let mut vars = self.vars.clone();
        let mut dims = self.dims.clone();
        vars.push(var);
        dims.push(states);
        Factor { vars, dims, data }
    }

    /// Drops an axis by keeping only the slice at `state`.
    ///
    /// This conditions the factor on the axis variable taking that state;
    /// the other states' mass is discarded, not summed.
    pub fn condition(&self, axis: usize, state: usize) -> Factor {
        let states = self.dims[axis];
        let block = self.stride(axis);
        let outer: usize = self.dims[..axis].iter().product();
        let chunk = block * states;
        let offset = block * state;

        let mut data = Vec::with_capacity(self.data.len() / states);
        for i in 0..outer {
            let base = i * chunk + offset;
            data.extend_from_slice(&self.data[base..base + block]);
        }

        let mut vars = self.vars.clone();
        let mut dims = self.dims.clone();
        vars.remove(axis);
        dims.remove(axis);
        Factor { vars, dims, data }
    }

    /// Conditions out, one by one, every variable for which `observed`
    /// returns a state.
    pub fn condition_observed<F>(&self, observed: F) -> Factor
    where
        F: Fn(VarId) -> Option<usize>,
    {
        let mut current = self.clone();
        let mut axis = 0;
        while axis < current.vars.len() {
            match observed(current.vars[axis]) {
                Some(state) => current = current.condition(axis, state),
                None => axis += 1,
            }
        }
        current
    }

    /// Grows an axis by one state whose values duplicate the slice at the
    /// previous last state.
    pub fn add_state(&self, axis: usize) -> Factor {
        let states = self.dims[axis];
        let block = self.stride(axis);
        let outer: usize = self.dims[..axis].iter().product();
        let chunk = block * states;

        let mut data = Vec::with_capacity(self.data.len() + outer * block);
        for i in 0..outer {
            let base = i * chunk;
            data.extend_from_slice(&self.data[base..base + chunk]);
            data.extend_from_slice(&self.data[base + chunk - block..base + chunk]);
        }

        let vars = self.vars.clone();
        let mut dims = self.dims.clone();
        dims[axis] = states + 1;
        Factor { vars, dims, data }
    }

    /// Shrinks an axis by deleting the slice at `state`, then renormalizes
    /// each remaining column of the first variable.
    pub fn remove_state(&self, axis: usize, state: usize) -> Factor {
        let states = self.dims[axis];
        let block = self.stride(axis);
        let outer: usize = self.dims[..axis].iter().product();
        let chunk = block * states;
        let offset = block * state;

        let mut data = Vec::with_capacity(self.data.len() - outer * block);
        for i in 0..outer {
            let base = i * chunk;
            data.extend_from_slice(&self.data[base..base + offset]);
            data.extend_from_slice(&self.data[base + offset + block..base + chunk]);
        }

        let vars = self.vars.clone();
        let mut dims = self.dims.clone();
        dims[axis] = states - 1;
        let mut out = Factor { vars, dims, data };
        out.normalize_conditional();
        out
    }

    /// Normalizes the whole table to total mass 1 when any mass exists.
    pub fn normalize(&mut self) {
        let sum: f64 = self.data.iter().sum();
        if sum > 0.0 {
            for v in &mut self.data {
                *v /= sum;
            }
        }
    }

    /// Normalizes each column of the first variable: for every fixed
    /// assignment of the remaining variables, the first variable's states
    /// sum to 1 (columns without mass are left untouched).
    pub fn normalize_conditional(&mut self) {
        let states = self.dims[0];
        let cols = self.data.len() / states;
        for col in 0..cols {
            let mut sum = 0.0;
            for k in 0..states {
                sum += self.data[col + k * cols];
            }
            if sum > 0.0 {
                for k in 0..states {
                    self.data[col + k * cols] /= sum;
                }
            }
        }
    }

    /// Most likely state of the first variable given a fixed assignment of
    /// the remaining variables, identified by its flat offset within one
    /// first-variable slice.
    pub fn most_likely_at(&self, rest_offset: usize) -> usize {
        let jump = self.data.len() / self.dims[0];
        let mut best = 0;
        let mut max = self.data[rest_offset];
        for i in 1..self.dims[0] {
            let v = self.data[rest_offset + i * jump];
            if v > max {
                max = v;
                best = i;
            }
        }
        best
    }

    /// Reports every entry outside `[0, 1]` without halting.
    ///
    /// Returns the offending flat indices; each is also logged at `warn`
    /// level.
    pub fn verify(&self) -> Vec<usize> {
        let mut bad = Vec::new();
        for (i, &v) in self.data.iter().enumerate() {
            if !(0.0..=1.0).contains(&v) || v.is_nan() {
                warn!(index = i, value = v, "table entry outside [0, 1]");
                bad.push(i);
            }
        }
        bad
    }
}
