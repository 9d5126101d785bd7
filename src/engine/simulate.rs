//! Cooperative iteration control for long-running sampling loops.

use crate::engine::errors::BayesError;

/// Governs a sampling run in resumable chunks.
///
/// `stop` pauses the loop at a batch boundary; `done` ends the whole run;
/// `log` asks the network to record the current iteration; `iter_done` is
/// the per-iteration tick. `begin`/`end` bracket the run. Splitting "pause
/// now" from "finished" lets a caller interleave many short batches with
/// other work instead of dedicating a thread to the simulation; ending a
/// run early is simply `done` returning true. Callers needing a timeout
/// compose an elapsed-time check into their implementation.
pub trait SimControl {
    /// Whether to pause the simulation at the next batch boundary.
    fn stop(&self) -> bool;

    /// Whether the simulation is truly finished.
    fn done(&self) -> bool;

    /// Whether the network should log the current iteration.
    fn log(&self) -> bool;

    /// Called when the network finishes an iteration (after `log`).
    fn iter_done(&mut self);

    /// The network has begun using this control.
    fn begin(&mut self);

    /// The network has stopped using this control.
    fn end(&mut self);
}

/// Runs a fixed number of iterations in a single batch, then resets itself
/// for reuse. The iteration budget can be changed between runs, but not
/// while one is in progress.
#[derive(Debug, Clone)]
pub struct RunOnce {
    iterations: usize,
    log: bool,
    current: Option<usize>,
}

impl RunOnce {
    /// A control for `iterations` sweeps, optionally logging each one.
    pub fn new(iterations: usize, log: bool) -> Self {
        Self {
            iterations,
            log,
            current: None,
        }
    }

    /// Changes the iteration budget; fails while a run is in progress.
    pub fn set_iterations(&mut self, iterations: usize) -> Result<(), BayesError> {
        if self.current.is_some() {
            return Err(BayesError::SimulationRunning);
        }
        self.iterations = iterations;
        Ok(())
    }
}

impl SimControl for RunOnce {
    fn stop(&self) -> bool {
        self.current == Some(self.iterations)
    }

    fn done(&self) -> bool {
        self.current == Some(self.iterations)
    }

    fn log(&self) -> bool {
        self.log
    }

    fn iter_done(&mut self) {
        if let Some(current) = &mut self.current {
            *current += 1;
        }
    }

    fn begin(&mut self) {
        self.current = Some(0);
    }

    fn end(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_once_counts_to_budget_then_resets() {
        let mut ctl = RunOnce::new(3, false);
        ctl.begin();
        let mut sweeps = 0;
        while !ctl.stop() {
            sweeps += 1;
            ctl.iter_done();
        }
        assert_eq!(sweeps, 3);
        assert!(ctl.done());
        ctl.end();
        assert!(!ctl.stop());
    }

    #[test]
    fn budget_change_rejected_mid_run() {
        let mut ctl = RunOnce::new(3, false);
        ctl.begin();
        assert!(matches!(
            ctl.set_iterations(5),
            Err(BayesError::SimulationRunning)
        ));
        ctl.end();
        ctl.set_iterations(5).unwrap();
    }
}
