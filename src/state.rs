//! Population state indexed by receptor occupancy.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// Addressable bucket of a [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Free binder molecules.
    FreeBinder,
    /// Effector cells with the given number of bound receptors.
    Effector(usize),
    /// Target cells with the given number of bound receptors.
    Target(usize),
    /// Effector-binder-target complexes (`EDT[i][j]`).
    Trimer(usize, usize),
    /// Effector-target complexes (`ET[i][j]`).
    Dimer(usize, usize),
}

impl Slot {
    fn field(&self) -> &'static str {
        match self {
            Slot::FreeBinder => "D",
            Slot::Effector(_) => "Es",
            Slot::Target(_) => "Ts",
            Slot::Trimer(..) => "EDT",
            Slot::Dimer(..) => "ET",
        }
    }

    fn index(&self) -> (usize, usize) {
        match *self {
            Slot::FreeBinder => (0, 0),
            Slot::Effector(i) | Slot::Target(i) => (i, 0),
            Slot::Trimer(i, j) | Slot::Dimer(i, j) => (i, j),
        }
    }
}

/// Mapping from [`Slot`] to a position in the flat count buffer.
///
/// Buffer order: `D`, `Es[0..=e]`, `Ts[0..=t]`, `EDT[e][t]`, `ET[e][t]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    e_receptors: usize,
    t_receptors: usize,
}

impl Layout {
    pub fn new(e_receptors: usize, t_receptors: usize) -> Self {
        Self {
            e_receptors,
            t_receptors,
        }
    }

    pub fn e_receptors(&self) -> usize {
        self.e_receptors
    }

    pub fn t_receptors(&self) -> usize {
        self.t_receptors
    }

    /// Receptor capacities as `(e_receptors, t_receptors)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.e_receptors, self.t_receptors)
    }

    /// Total number of buckets.
    pub fn len(&self) -> usize {
        self.trimer_offset() + 2 * self.n_complex()
    }

    fn n_complex(&self) -> usize {
        self.e_receptors * self.t_receptors
    }

    fn effector_offset(&self) -> usize {
        1
    }

    fn target_offset(&self) -> usize {
        self.effector_offset() + self.e_receptors + 1
    }

    fn trimer_offset(&self) -> usize {
        self.target_offset() + self.t_receptors + 1
    }

    fn dimer_offset(&self) -> usize {
        self.trimer_offset() + self.n_complex()
    }

    /// Flat position of a slot, or `None` if it lies outside the layout.
    pub fn flat(&self, slot: Slot) -> Option<usize> {
        let (e, t) = self.shape();
        match slot {
            Slot::FreeBinder => Some(0),
            Slot::Effector(i) if i <= e => Some(self.effector_offset() + i),
            Slot::Target(j) if j <= t => Some(self.target_offset() + j),
            Slot::Trimer(i, j) if i < e && j < t => Some(self.trimer_offset() + i * t + j),
            Slot::Dimer(i, j) if i < e && j < t => Some(self.dimer_offset() + i * t + j),
            _ => None,
        }
    }

    /// Flat position of a slot, failing with [`SimError::IndexOutOfRange`].
    pub fn index(&self, slot: Slot) -> Result<usize> {
        self.flat(slot).ok_or_else(|| SimError::IndexOutOfRange {
            field: slot.field(),
            index: slot.index(),
            shape: self.field_shape(slot),
        })
    }

    fn field_shape(&self, slot: Slot) -> (usize, usize) {
        let (e, t) = self.shape();
        match slot {
            Slot::FreeBinder => (1, 1),
            Slot::Effector(_) => (e + 1, 1),
            Slot::Target(_) => (t + 1, 1),
            Slot::Trimer(..) | Slot::Dimer(..) => (e, t),
        }
    }
}

/// Population counts across all occupancy classes of both species.
///
/// Counts are integral while simulating. Fractional values only appear in
/// states produced by [`State::scale`] for averaging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    layout: Layout,
    counts: Vec<f64>,
}

impl State {
    /// Create a state with every bucket set to zero.
    pub fn empty(e_receptors: usize, t_receptors: usize) -> Self {
        let layout = Layout::new(e_receptors, t_receptors);
        Self {
            layout,
            counts: vec![0.0; layout.len()],
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn shape(&self) -> (usize, usize) {
        self.layout.shape()
    }

    pub fn get(&self, slot: Slot) -> Result<f64> {
        Ok(self.counts[self.layout.index(slot)?])
    }

    pub fn set(&mut self, slot: Slot, value: f64) -> Result<()> {
        let idx = self.layout.index(slot)?;
        self.counts[idx] = value;
        Ok(())
    }

    pub fn free_binder(&self) -> f64 {
        self.counts[0]
    }

    pub fn set_free_binder(&mut self, value: f64) {
        self.counts[0] = value;
    }

    pub fn effector(&self, i: usize) -> Result<f64> {
        self.get(Slot::Effector(i))
    }

    pub fn set_effector(&mut self, i: usize, value: f64) -> Result<()> {
        self.set(Slot::Effector(i), value)
    }

    pub fn target(&self, j: usize) -> Result<f64> {
        self.get(Slot::Target(j))
    }

    pub fn set_target(&mut self, j: usize, value: f64) -> Result<()> {
        self.set(Slot::Target(j), value)
    }

    pub fn trimer(&self, i: usize, j: usize) -> Result<f64> {
        self.get(Slot::Trimer(i, j))
    }

    pub fn set_trimer(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        self.set(Slot::Trimer(i, j), value)
    }

    pub fn dimer(&self, i: usize, j: usize) -> Result<f64> {
        self.get(Slot::Dimer(i, j))
    }

    pub fn set_dimer(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        self.set(Slot::Dimer(i, j), value)
    }

    /// Effector counts by occupancy, `Es[0..=e_receptors]`.
    pub fn effectors_by_occupancy(&self) -> &[f64] {
        let start = self.layout.effector_offset();
        &self.counts[start..start + self.layout.e_receptors + 1]
    }

    /// Target counts by occupancy, `Ts[0..=t_receptors]`.
    pub fn targets_by_occupancy(&self) -> &[f64] {
        let start = self.layout.target_offset();
        &self.counts[start..start + self.layout.t_receptors + 1]
    }

    fn trimer_block(&self) -> &[f64] {
        let start = self.layout.trimer_offset();
        &self.counts[start..start + self.layout.n_complex()]
    }

    fn dimer_block(&self) -> &[f64] {
        let start = self.layout.dimer_offset();
        &self.counts[start..start + self.layout.n_complex()]
    }

    /// Free effector cells, summed over occupancy.
    pub fn effectors(&self) -> f64 {
        self.effectors_by_occupancy().iter().sum()
    }

    /// Free target cells, summed over occupancy.
    pub fn targets(&self) -> f64 {
        self.targets_by_occupancy().iter().sum()
    }

    pub fn trimers(&self) -> f64 {
        self.trimer_block().iter().sum()
    }

    pub fn dimers(&self) -> f64 {
        self.dimer_block().iter().sum()
    }

    /// Target cells whether free or held in a complex.
    pub fn all_targets(&self) -> f64 {
        self.targets() + self.trimers() + self.dimers()
    }

    /// Total binder mass: free, receptor-bound and complex-bound.
    pub fn total_d(&self) -> f64 {
        let t = self.layout.t_receptors;
        let mut total = self.free_binder();
        total += weighted_sum(self.effectors_by_occupancy());
        total += weighted_sum(self.targets_by_occupancy());
        for (idx, &count) in self.trimer_block().iter().enumerate() {
            total += (idx / t + idx % t + 1) as f64 * count;
        }
        for (idx, &count) in self.dimer_block().iter().enumerate() {
            total += (idx / t + idx % t) as f64 * count;
        }
        total
    }

    /// Mean number of bound receptors per free effector cell.
    pub fn bound_d_per_effector(&self) -> f64 {
        mean_occupancy(self.effectors_by_occupancy())
    }

    /// Mean number of bound receptors per free target cell.
    pub fn bound_d_per_target(&self) -> f64 {
        mean_occupancy(self.targets_by_occupancy())
    }

    /// Whether every bucket is non-negative.
    pub fn is_coherent(&self) -> bool {
        self.counts.iter().all(|&count| count >= 0.0)
    }

    pub fn checked_add(&self, other: &State) -> Result<State> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn checked_sub(&self, other: &State) -> Result<State> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn scale(&self, factor: f64) -> State {
        State {
            layout: self.layout,
            counts: self.counts.iter().map(|&count| count * factor).collect(),
        }
    }

    fn zip_with(&self, other: &State, op: impl Fn(f64, f64) -> f64) -> Result<State> {
        if self.layout != other.layout {
            return Err(SimError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        let counts = self
            .counts
            .iter()
            .zip(&other.counts)
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(State {
            layout: self.layout,
            counts,
        })
    }

    /// Move individuals between buckets as a single step.
    ///
    /// Every slot in `takes` loses one individual and every `(slot, amount)`
    /// in `puts` gains `amount`. All indices and counts are checked before
    /// anything is written, so a failed transfer leaves the state untouched.
    pub(crate) fn transfer(&mut self, takes: &[Slot], puts: &[(Slot, f64)]) -> Result<()> {
        for &slot in takes {
            let idx = self.layout.index(slot)?;
            if self.counts[idx] < 1.0 {
                return Err(SimError::EmptyBucket {
                    field: slot.field(),
                    index: slot.index(),
                });
            }
        }
        for &(slot, _) in puts {
            self.layout.index(slot)?;
        }

        for &slot in takes {
            let idx = self.layout.index(slot)?;
            self.counts[idx] -= 1.0;
        }
        for &(slot, amount) in puts {
            let idx = self.layout.index(slot)?;
            self.counts[idx] += amount;
        }
        Ok(())
    }
}

fn weighted_sum(counts: &[f64]) -> f64 {
    counts
        .iter()
        .enumerate()
        .map(|(occ, &count)| occ as f64 * count)
        .sum()
}

fn mean_occupancy(counts: &[f64]) -> f64 {
    let n_cells: f64 = counts.iter().sum();
    if n_cells == 0.0 {
        return 0.0;
    }
    weighted_sum(counts) / n_cells
}
