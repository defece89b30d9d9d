//! Sampling of replicate trajectories at fixed timepoints.

use crate::SimRng;
use crate::engine::Engine;
use crate::error::{Result, SimError};
use crate::state::State;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replicate count above which progress is logged.
const PROGRESS_MIN_REPLICATES: usize = 100;

/// Deep copy of the state at one timepoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: f64,
    pub state: State,
}

/// Time-ordered snapshots of one replicate, starting at time 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub snapshots: Vec<Snapshot>,
}

impl Trajectory {
    /// Snapshot taken exactly at `time`, if any.
    pub fn at(&self, time: f64) -> Option<&State> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.time == time)
            .map(|snapshot| &snapshot.state)
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.snapshots.iter().map(|snapshot| snapshot.time)
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}

/// Runs an [`Engine`] over successive timepoints for independent replicates.
pub struct Sampler<'a> {
    engine: Engine<'a>,
    timepoints: Vec<f64>,
    seed: u64,
}

impl<'a> Sampler<'a> {
    /// # Errors
    /// [`SimError::InvalidTimepoints`] unless the timepoints are finite,
    /// non-negative and strictly increasing.
    pub fn new(engine: Engine<'a>, timepoints: Vec<f64>, seed: u64) -> Result<Self> {
        check_timepoints(&timepoints)?;
        Ok(Self {
            engine,
            timepoints,
            seed,
        })
    }

    /// Sample `n_replicates` trajectories from `initial`.
    ///
    /// Replicates run in parallel. Replicate `r` draws from its own
    /// ChaCha stream `r` of the master seed, so the output does not depend
    /// on how replicates are scheduled across threads.
    pub fn sample(&self, initial: &State, n_replicates: usize) -> Result<Vec<Trajectory>> {
        self.engine.catalog().check_state(initial)?;

        let n_done = AtomicUsize::new(0);
        (0..n_replicates)
            .into_par_iter()
            .map(|replicate| {
                let trajectory = self.sample_replicate(initial, replicate)?;
                let done = n_done.fetch_add(1, Ordering::Relaxed) + 1;
                report_progress(done, n_replicates);
                Ok(trajectory)
            })
            .collect()
    }

    /// Sample a single replicate on the current thread.
    pub fn sample_replicate(&self, initial: &State, replicate: usize) -> Result<Trajectory> {
        let mut rng = SimRng::seed_from_u64(self.seed);
        rng.set_stream(replicate as u64);

        let mut snapshots = Vec::with_capacity(self.timepoints.len() + 1);
        snapshots.push(Snapshot {
            time: 0.0,
            state: initial.clone(),
        });

        let mut state = initial.clone();
        let mut last_time = 0.0;
        for &time in &self.timepoints {
            if time == 0.0 {
                continue;
            }
            self.engine.advance(&mut state, last_time, time, &mut rng)?;
            snapshots.push(Snapshot {
                time,
                state: state.clone(),
            });
            last_time = time;
        }

        Ok(Trajectory { snapshots })
    }
}

fn check_timepoints(timepoints: &[f64]) -> Result<()> {
    if let Some(&time) = timepoints.iter().find(|time| !(time.is_finite() && **time >= 0.0)) {
        return Err(SimError::InvalidTimepoints(format!(
            "timepoint {time} is not a finite non-negative number"
        )));
    }
    if let Some(pair) = timepoints.windows(2).find(|pair| pair[1] <= pair[0]) {
        return Err(SimError::InvalidTimepoints(format!(
            "timepoints must be strictly increasing, but {} follows {}",
            pair[1], pair[0]
        )));
    }
    Ok(())
}

fn report_progress(done: usize, total: usize) {
    if total <= PROGRESS_MIN_REPLICATES {
        return;
    }
    let decile = |n: usize| n * 10 / total;
    if decile(done) != decile(done - 1) {
        let progress = 100.0 * done as f64 / total as f64;
        log::info!("completed {progress:06.2}% ({done}/{total} replicates)");
    }
}

/// Evenly spaced timepoints `end_time * k / n_intervals` for `k = 1..=n_intervals`.
pub fn uniform_timepoints(end_time: f64, n_intervals: usize) -> Vec<f64> {
    (1..=n_intervals)
        .map(|k| end_time * k as f64 / n_intervals as f64)
        .collect()
}
