use crate::SimRng;
use crate::catalog::Catalog;
use crate::error::{Result, SimError};
use crate::params::Rates;
use crate::state::State;
use rand::prelude::*;
use rand_distr::Exp1;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Relative slack allowed when comparing a rate with its bound.
const RATE_BOUND_TOL: f64 = 1e-12;

/// How cached upper-bound rates are refreshed after an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateRefresh {
    /// Re-evaluate only the events that read a bucket the fired event wrote.
    #[default]
    Incremental,
    /// Re-evaluate every event in the catalog.
    Full,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Every rate is zero; the state can no longer change.
    Absorbed,
    /// The next candidate event falls after the end of the run.
    Horizon,
}

/// Outcome of a single engine run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Loop iterations, including the one that halted the run.
    pub steps: u64,
    /// Candidate events that were applied.
    pub accepted: u64,
    /// Candidate events discarded by thinning.
    pub rejected: u64,
    /// Time of the last candidate event (or the start time if none).
    pub time: f64,
    pub halt: Halt,
}

/// Shared flag for cooperative cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Continuous-time Markov chain driver using bounded-rate thinning.
///
/// Holds only borrowed, read-only inputs; the state and the random number
/// generator are passed to each run so that independent replicates can
/// share one engine.
#[derive(Debug, Clone)]
pub struct Engine<'a> {
    catalog: &'a Catalog,
    rates: &'a Rates,
    max_steps: Option<u64>,
    refresh: RateRefresh,
    cancel: Option<CancelToken>,
}

impl<'a> Engine<'a> {
    pub fn new(catalog: &'a Catalog, rates: &'a Rates) -> Self {
        Self {
            catalog,
            rates,
            max_steps: None,
            refresh: RateRefresh::default(),
            cancel: None,
        }
    }

    /// Limit the number of loop iterations of a single run.
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_refresh(mut self, refresh: RateRefresh) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    /// Advance `state` in place for `duration` time units starting at time 0.
    pub fn run(&self, state: &mut State, duration: f64, rng: &mut SimRng) -> Result<RunSummary> {
        self.advance(state, 0.0, duration, rng)
    }

    /// Advance `state` in place from absolute time `start` to `end`.
    ///
    /// # Errors
    /// Fails if the state does not match the catalog, if a rate is negative
    /// or above its bound, if the step budget is exceeded, or if the run is
    /// cancelled. The state may have been partially advanced when an error
    /// is returned.
    pub fn advance(
        &self,
        state: &mut State,
        start: f64,
        end: f64,
        rng: &mut SimRng,
    ) -> Result<RunSummary> {
        self.catalog.check_state(state)?;
        if !(start.is_finite() && end >= start) {
            return Err(SimError::InvalidTimepoints(format!(
                "cannot advance from {start} to {end}"
            )));
        }

        let mut max_rates = vec![0.0; self.catalog.len()];
        self.refresh_all(state, &mut max_rates)?;

        let mut summary = RunSummary {
            steps: 0,
            accepted: 0,
            rejected: 0,
            time: start,
            halt: Halt::Horizon,
        };

        loop {
            summary.steps += 1;
            if let Some(max_steps) = self.max_steps {
                if summary.steps > max_steps {
                    return Err(SimError::StepBudgetExceeded(max_steps));
                }
            }
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(SimError::Cancelled);
            }

            let total_rate: f64 = max_rates.iter().sum();
            if total_rate == 0.0 {
                summary.halt = Halt::Absorbed;
                break;
            }

            let waiting_time: f64 = rng.sample::<f64, _>(Exp1) / total_rate;
            let time = summary.time + waiting_time;
            if time > end {
                summary.halt = Halt::Horizon;
                break;
            }

            let Some(i_evt) = select_event(&max_rates, rng.random::<f64>() * total_rate) else {
                summary.halt = Halt::Absorbed;
                break;
            };

            let event = &self.catalog.events()[i_evt];
            let max_rate = max_rates[i_evt];
            let rate = check_rate(event.rate(state, time, self.rates)?, || {
                format!("{event:?}")
            })?;
            if rate > max_rate * (1.0 + RATE_BOUND_TOL) {
                return Err(SimError::RateBoundExceeded {
                    event: format!("{event:?}"),
                    rate,
                    max_rate,
                });
            }

            // Thinning: accept with probability rate / max_rate.
            if rng.random::<f64>() < rate / max_rate {
                event.implement(state, rng)?;
                summary.accepted += 1;
                match self.refresh {
                    RateRefresh::Incremental => {
                        for &j_evt in self.catalog.affected_by(i_evt) {
                            max_rates[j_evt] = self.eval_max_rate(j_evt, state)?;
                        }
                    }
                    RateRefresh::Full => self.refresh_all(state, &mut max_rates)?,
                }
            } else {
                summary.rejected += 1;
            }

            summary.time = time;
        }

        log::debug!("{summary:?}");

        Ok(summary)
    }

    fn refresh_all(&self, state: &State, max_rates: &mut [f64]) -> Result<()> {
        for (i_evt, max_rate) in max_rates.iter_mut().enumerate() {
            *max_rate = self.eval_max_rate(i_evt, state)?;
        }
        Ok(())
    }

    fn eval_max_rate(&self, i_evt: usize, state: &State) -> Result<f64> {
        let event = &self.catalog.events()[i_evt];
        check_rate(event.max_rate(state, self.rates)?, || format!("{event:?}"))
    }
}

fn check_rate(rate: f64, event: impl FnOnce() -> String) -> Result<f64> {
    // NaN fails the comparison as well.
    if !(rate >= 0.0) {
        return Err(SimError::NegativeRateEvaluated {
            event: event(),
            rate,
        });
    }
    Ok(rate)
}

/// Linear cumulative scan; events with zero weight are never selected.
fn select_event(weights: &[f64], target: f64) -> Option<usize> {
    let mut cum_weight = 0.0;
    let mut last_positive = None;
    for (i_evt, &weight) in weights.iter().enumerate() {
        if weight <= 0.0 {
            continue;
        }
        cum_weight += weight;
        last_positive = Some(i_evt);
        if target < cum_weight {
            return Some(i_evt);
        }
    }
    // Round-off can leave the target just above the final partial sum.
    last_positive
}
