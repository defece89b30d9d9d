//! Stochastic events and their rate laws.
//!
//! Every event is parameterized by the occupancy indices it applies to and
//! by the receptor capacities. Rate constants are passed at call time.

use crate::SimRng;
use crate::error::{Result, SimError};
use crate::params::Rates;
use crate::state::{Slot, State};
use rand::prelude::*;
use rand_distr::Binomial;
use std::fmt::Debug;

/// Unit of stochastic change.
pub trait Event: Debug + Send + Sync {
    fn kind(&self) -> EventKind;

    /// Instantaneous propensity at `time`.
    ///
    /// Time-independent events return their upper bound.
    fn rate(&self, state: &State, _time: f64, rates: &Rates) -> Result<f64> {
        self.max_rate(state, rates)
    }

    /// Upper bound on [`Event::rate`] valid while the state is unchanged.
    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64>;

    /// Apply one occurrence of the event.
    ///
    /// Must only be called after a positive rate query for the same state.
    fn implement(&self, state: &mut State, rng: &mut SimRng) -> Result<()>;

    /// Buckets the rate depends on.
    fn reads(&self) -> Vec<Slot>;

    /// Buckets `implement` may modify.
    fn writes(&self) -> Vec<Slot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    EffectorDeath,
    EffectorBinding,
    EffectorInternalization,
    TargetBirth,
    TargetBinding,
    TargetInternalization,
    /// `ED·T`: bridge through effector-bound binder.
    EffectorSideFormation,
    /// `E·DT`: bridge through target-bound binder.
    TargetSideFormation,
    /// `E·T`: binder-free bridge.
    FreeFormation,
    TrimerDissociation,
    DimerDissociation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species {
    Effector,
    Target,
}

impl Species {
    fn slot(self, occ: usize) -> Slot {
        match self {
            Species::Effector => Slot::Effector(occ),
            Species::Target => Slot::Target(occ),
        }
    }
}

// Wraps to an index that every layout rejects.
fn below(occ: usize) -> usize {
    occ.wrapping_sub(1)
}

#[derive(Debug, Clone)]
pub struct EffectorDeath {
    occ: usize,
}

impl EffectorDeath {
    pub fn new(occ: usize) -> Self {
        Self { occ }
    }
}

impl Event for EffectorDeath {
    fn kind(&self) -> EventKind {
        EventKind::EffectorDeath
    }

    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64> {
        Ok(state.effector(self.occ)? * rates.d_e)
    }

    fn implement(&self, state: &mut State, _rng: &mut SimRng) -> Result<()> {
        // Bound binder is released back to the free pool.
        state.transfer(
            &[Slot::Effector(self.occ)],
            &[(Slot::FreeBinder, self.occ as f64)],
        )
    }

    fn reads(&self) -> Vec<Slot> {
        vec![Slot::Effector(self.occ)]
    }

    fn writes(&self) -> Vec<Slot> {
        vec![Slot::Effector(self.occ), Slot::FreeBinder]
    }
}

#[derive(Debug, Clone)]
pub struct TargetBirth {
    occ: usize,
}

impl TargetBirth {
    pub fn new(occ: usize) -> Self {
        Self { occ }
    }
}

impl Event for TargetBirth {
    fn kind(&self) -> EventKind {
        EventKind::TargetBirth
    }

    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64> {
        Ok(state.target(self.occ)? * rates.b_t)
    }

    fn implement(&self, state: &mut State, rng: &mut SimRng) -> Result<()> {
        // Bound receptors are split between the daughters without bias.
        let split = Binomial::new(self.occ as u64, 0.5)
            .map_err(|err| SimError::Distribution(err.to_string()))?;
        let first = split.sample(rng) as usize;
        let second = self.occ - first;
        state.transfer(
            &[Slot::Target(self.occ)],
            &[(Slot::Target(first), 1.0), (Slot::Target(second), 1.0)],
        )
    }

    fn reads(&self) -> Vec<Slot> {
        vec![Slot::Target(self.occ)]
    }

    fn writes(&self) -> Vec<Slot> {
        (0..=self.occ).map(Slot::Target).collect()
    }
}

/// Free binder attaching to a free receptor.
#[derive(Debug, Clone)]
pub struct Binding {
    species: Species,
    occ: usize,
    capacity: usize,
}

impl Binding {
    pub fn new(species: Species, occ: usize, capacity: usize) -> Self {
        Self {
            species,
            occ,
            capacity,
        }
    }
}

impl Event for Binding {
    fn kind(&self) -> EventKind {
        match self.species {
            Species::Effector => EventKind::EffectorBinding,
            Species::Target => EventKind::TargetBinding,
        }
    }

    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64> {
        let lambda = match self.species {
            Species::Effector => rates.lambda_e,
            Species::Target => rates.lambda_t,
        };
        let free_receptors = self.capacity.saturating_sub(self.occ) as f64;
        let count = state.get(self.species.slot(self.occ))?;
        Ok(state.free_binder() * free_receptors * count * lambda)
    }

    fn implement(&self, state: &mut State, _rng: &mut SimRng) -> Result<()> {
        state.transfer(
            &[Slot::FreeBinder, self.species.slot(self.occ)],
            &[(self.species.slot(self.occ + 1), 1.0)],
        )
    }

    fn reads(&self) -> Vec<Slot> {
        vec![Slot::FreeBinder, self.species.slot(self.occ)]
    }

    fn writes(&self) -> Vec<Slot> {
        vec![
            Slot::FreeBinder,
            self.species.slot(self.occ),
            self.species.slot(self.occ + 1),
        ]
    }
}

/// Bound receptor taken up into the cell; the binder is consumed.
#[derive(Debug, Clone)]
pub struct Internalization {
    species: Species,
    occ: usize,
}

impl Internalization {
    pub fn new(species: Species, occ: usize) -> Self {
        Self { species, occ }
    }
}

impl Event for Internalization {
    fn kind(&self) -> EventKind {
        match self.species {
            Species::Effector => EventKind::EffectorInternalization,
            Species::Target => EventKind::TargetInternalization,
        }
    }

    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64> {
        let mu = match self.species {
            Species::Effector => rates.mu_e,
            Species::Target => rates.mu_t,
        };
        Ok(self.occ as f64 * state.get(self.species.slot(self.occ))? * mu)
    }

    fn implement(&self, state: &mut State, _rng: &mut SimRng) -> Result<()> {
        state.transfer(
            &[self.species.slot(self.occ)],
            &[(self.species.slot(below(self.occ)), 1.0)],
        )
    }

    fn reads(&self) -> Vec<Slot> {
        vec![self.species.slot(self.occ)]
    }

    fn writes(&self) -> Vec<Slot> {
        vec![
            self.species.slot(self.occ),
            self.species.slot(below(self.occ)),
        ]
    }
}

/// Which receptor pair carries the bridge of a newly formed complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bridge {
    /// Effector-bound binder meets a free target receptor (`ED·T`).
    EffectorSide,
    /// Free effector receptor meets target-bound binder (`E·DT`).
    TargetSide,
    /// Free receptors on both sides (`E·T`).
    Free,
}

/// Complex formation under the competitive multi-hit model.
///
/// Each encounter makes `M` independent attempts. A single attempt succeeds
/// through outcome `k` with probability `c_k`, the product of the partners'
/// receptor fractions and the outcome's success probability. The encounter
/// succeeds with probability `1 - c_f^M` where `c_f = 1 - sum(c_k)`, and the
/// successful outcome is `k` with probability `c_k / sum(c_k)`.
#[derive(Debug, Clone)]
pub struct Formation {
    bridge: Bridge,
    e_occ: usize,
    t_occ: usize,
    e_receptors: usize,
    t_receptors: usize,
}

impl Formation {
    pub fn new(
        bridge: Bridge,
        e_occ: usize,
        t_occ: usize,
        e_receptors: usize,
        t_receptors: usize,
    ) -> Self {
        Self {
            bridge,
            e_occ,
            t_occ,
            e_receptors,
            t_receptors,
        }
    }

    /// Single-attempt success probabilities `(E·T, E·DT, ED·T)`.
    fn attempt_probs(&self, rates: &Rates) -> (f64, f64, f64) {
        let pairs = (self.e_receptors * self.t_receptors) as f64;
        if pairs == 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let e_free = self.e_receptors.saturating_sub(self.e_occ) as f64;
        let t_free = self.t_receptors.saturating_sub(self.t_occ) as f64;
        let e_bound = self.e_occ as f64;
        let t_bound = self.t_occ as f64;
        (
            e_free * t_free * rates.p_e_t / pairs,
            e_free * t_bound * rates.p_e_dt / pairs,
            e_bound * t_free * rates.p_ed_t / pairs,
        )
    }

    fn complex_slot(&self) -> Slot {
        match self.bridge {
            Bridge::EffectorSide => Slot::Trimer(below(self.e_occ), self.t_occ),
            Bridge::TargetSide => Slot::Trimer(self.e_occ, below(self.t_occ)),
            Bridge::Free => Slot::Dimer(self.e_occ, self.t_occ),
        }
    }
}

impl Event for Formation {
    fn kind(&self) -> EventKind {
        match self.bridge {
            Bridge::EffectorSide => EventKind::EffectorSideFormation,
            Bridge::TargetSide => EventKind::TargetSideFormation,
            Bridge::Free => EventKind::FreeFormation,
        }
    }

    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64> {
        let effectors = state.effector(self.e_occ)?;
        let targets = state.target(self.t_occ)?;
        if effectors <= 0.0 || targets <= 0.0 {
            return Ok(0.0);
        }

        let (c_e_t, c_e_dt, c_ed_t) = self.attempt_probs(rates);
        let c_own = match self.bridge {
            Bridge::EffectorSide => c_ed_t,
            Bridge::TargetSide => c_e_dt,
            Bridge::Free => c_e_t,
        };
        if c_own == 0.0 {
            return Ok(0.0);
        }
        let c_success = c_e_t + c_e_dt + c_ed_t;
        let c_fail = 1.0 - c_success;
        if c_fail == 1.0 {
            return Ok(0.0);
        }

        let p_encounter = 1.0 - c_fail.powf(rates.m);
        Ok(rates.lambda_et * p_encounter * effectors * targets * c_own / c_success)
    }

    fn implement(&self, state: &mut State, _rng: &mut SimRng) -> Result<()> {
        state.transfer(
            &[Slot::Effector(self.e_occ), Slot::Target(self.t_occ)],
            &[(self.complex_slot(), 1.0)],
        )
    }

    fn reads(&self) -> Vec<Slot> {
        vec![Slot::Effector(self.e_occ), Slot::Target(self.t_occ)]
    }

    fn writes(&self) -> Vec<Slot> {
        vec![
            Slot::Effector(self.e_occ),
            Slot::Target(self.t_occ),
            self.complex_slot(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complex {
    /// `EDT[i][j]`.
    Trimer,
    /// `ET[i][j]`.
    Dimer,
}

/// Complex breakdown: the target is lost, the effector returns to the pool.
#[derive(Debug, Clone)]
pub struct Dissociation {
    complex: Complex,
    e_occ: usize,
    t_occ: usize,
}

impl Dissociation {
    pub fn new(complex: Complex, e_occ: usize, t_occ: usize) -> Self {
        Self {
            complex,
            e_occ,
            t_occ,
        }
    }

    fn complex_slot(&self) -> Slot {
        match self.complex {
            Complex::Trimer => Slot::Trimer(self.e_occ, self.t_occ),
            Complex::Dimer => Slot::Dimer(self.e_occ, self.t_occ),
        }
    }

    fn effector_slot(&self) -> Slot {
        match self.complex {
            // The bridging binder stays on the effector.
            Complex::Trimer => Slot::Effector(self.e_occ + 1),
            Complex::Dimer => Slot::Effector(self.e_occ),
        }
    }
}

impl Event for Dissociation {
    fn kind(&self) -> EventKind {
        match self.complex {
            Complex::Trimer => EventKind::TrimerDissociation,
            Complex::Dimer => EventKind::DimerDissociation,
        }
    }

    fn max_rate(&self, state: &State, rates: &Rates) -> Result<f64> {
        let d = match self.complex {
            Complex::Trimer => rates.d_edt,
            Complex::Dimer => rates.d_et,
        };
        Ok(state.get(self.complex_slot())? * d)
    }

    fn implement(&self, state: &mut State, _rng: &mut SimRng) -> Result<()> {
        state.transfer(
            &[self.complex_slot()],
            &[
                (Slot::FreeBinder, self.t_occ as f64),
                (self.effector_slot(), 1.0),
            ],
        )
    }

    fn reads(&self) -> Vec<Slot> {
        vec![self.complex_slot()]
    }

    fn writes(&self) -> Vec<Slot> {
        vec![self.complex_slot(), Slot::FreeBinder, self.effector_slot()]
    }
}
