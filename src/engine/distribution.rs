//! Named probability distributions over a variable's states.

use rustc_hash::FxHashMap;

use crate::engine::errors::BayesError;

/// Default tolerance for the normalization drift check.
///
/// Products of proper conditional tables accumulate floating-point error;
/// anything beyond this bound indicates a malformed table rather than
/// rounding.
pub const TOLERANCE: f64 = 5e-5;

/// A marginal or posterior distribution: parallel state-name and
/// probability vectors for a single variable, plus a transient store of
/// named recordings of past values.
#[derive(Debug, Clone)]
pub struct Distribution {
    /// Name of the variable this distribution describes.
    pub variable: String,
    /// State names, unique and ordered.
    pub states: Vec<String>,
    /// Probability per state, aligned with `states`.
    pub values: Vec<f64>,
    /// Named recordings of past value vectors.
    log: FxHashMap<String, Vec<f64>>,
}

impl Distribution {
    /// Creates a distribution from explicit values.
    pub fn new(variable: impl Into<String>, states: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            variable: variable.into(),
            states,
            values,
            log: FxHashMap::default(),
        }
    }

    /// Creates a one-hot distribution with all mass on `chosen`.
    pub fn point(variable: impl Into<String>, states: Vec<String>, chosen: usize) -> Self {
        let mut values = vec![0.0; states.len()];
        values[chosen] = 1.0;
        Self::new(variable, states, values)
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the distribution has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Index of a state by name.
    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| s == state)
    }

    /// Normalizes in place, checking total mass first.
    ///
    /// Fails with [`BayesError::DistributionSumsToZero`] when there is no
    /// mass to distribute, and with [`BayesError::Denormalized`] when the sum
    /// drifted further from 1 than `tolerance` allows. A negative tolerance
    /// disables the drift check, for intentionally denormalized
    /// intermediates.
    pub fn normalize(&mut self, tolerance: f64) -> Result<(), BayesError> {
        let sum: f64 = self.values.iter().sum();
        if sum <= f64::EPSILON {
            return Err(BayesError::DistributionSumsToZero(self.variable.clone()));
        }
        if tolerance >= 0.0 && (1.0 - sum).abs() > tolerance {
            return Err(BayesError::Denormalized {
                variable: self.variable.clone(),
                sum,
            });
        }
        for v in &mut self.values {
            *v /= sum;
        }
        Ok(())
    }

    /// Normalizes in place when there is any mass; a zero-sum vector is left
    /// untouched.
    pub fn renormalize(&mut self) {
        let sum: f64 = self.values.iter().sum();
        if sum > 0.0 {
            for v in &mut self.values {
                *v /= sum;
            }
        }
    }

    /// Sets one state to probability 1 and every other to 0.
    pub fn choose(&mut self, state: usize) {
        for (i, v) in self.values.iter_mut().enumerate() {
            *v = if i == state { 1.0 } else { 0.0 };
        }
    }

    /// Zeroes every value.
    pub fn zero(&mut self) {
        for v in &mut self.values {
            *v = 0.0;
        }
    }

    /// Appends a new state with probability 0.
    pub fn add_state(&mut self, name: impl Into<String>) {
        self.states.push(name.into());
        self.values.push(0.0);
    }

    /// Removes a state by name, renormalizing the remaining mass.
    ///
    /// Returns the removed index. The last remaining state cannot be
    /// removed.
    pub fn remove_state(&mut self, state: &str) -> Result<usize, BayesError> {
        let idx = self
            .state_index(state)
            .ok_or_else(|| BayesError::StateNotFound {
                variable: self.variable.clone(),
                state: state.to_string(),
            })?;
        if self.states.len() == 1 {
            return Err(BayesError::LastState {
                variable: self.variable.clone(),
                state: state.to_string(),
            });
        }
        self.states.remove(idx);
        self.values.remove(idx);
        self.renormalize();
        Ok(idx)
    }

    /// Records the current values under a log name.
    pub fn record(&mut self, logname: &str) {
        self.log.insert(logname.to_string(), self.values.clone());
    }

    /// Restores values recorded under a log name.
    pub fn recall(&mut self, logname: &str) -> Result<(), BayesError> {
        let values = self
            .log
            .get(logname)
            .ok_or_else(|| BayesError::NoSuchLog {
                log: logname.to_string(),
                variable: self.variable.clone(),
            })?;
        self.values = values.clone();
        Ok(())
    }

    /// Returns a copy of the distribution as recorded under a log name, or
    /// of the current values when `logname` is `None`.
    pub fn retrieve(&self, logname: Option<&str>) -> Result<Distribution, BayesError> {
        let values = match logname {
            None => self.values.clone(),
            Some(name) => self
                .log
                .get(name)
                .ok_or_else(|| BayesError::NoSuchLog {
                    log: name.to_string(),
                    variable: self.variable.clone(),
                })?
                .clone(),
        };
        Ok(Distribution::new(
            self.variable.clone(),
            self.states.clone(),
            values,
        ))
    }

    /// Index of the most probable state.
    pub fn most_likely(&self) -> usize {
        let mut idx = 0;
        let mut max = self.values[0];
        for (i, &v) in self.values.iter().enumerate().skip(1) {
            if v > max {
                idx = i;
                max = v;
            }
        }
        idx
    }

    /// Name of the most probable state.
    pub fn most_likely_state(&self) -> &str {
        &self.states[self.most_likely()]
    }

    /// Whether another distribution has the same state list.
    pub fn same_states(&self, other: &Distribution) -> bool {
        self.states == other.states
    }

    /// Renders the distribution as a multi-line percentage table.
    pub fn render(&self) -> String {
        use std::fmt::Write;
        let pad = " ".repeat(self.variable.len() + 1);
        let mut out = String::new();
        for (i, (state, value)) in self.states.iter().zip(&self.values).enumerate() {
            let head = if i == 0 {
                format!("{}:", self.variable)
            } else {
                pad.clone()
            };
            let _ = writeln!(out, "{} {:8.4}% = {}", head, value * 100.0, state);
        }
        out
    }
}
