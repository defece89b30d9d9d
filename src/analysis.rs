//! Ensemble statistics over sampled trajectories.

use crate::event::Species;
use crate::sampler::Trajectory;
use crate::state::State;
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result, bail};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Observable tracked at every timepoint across replicates.
pub trait Obs {
    fn update(&mut self, i_time: usize, state: &State) -> Result<()>;
    fn report(&self) -> ObsReport;
}

/// Per-timepoint statistics of one observable.
///
/// `series[i_time]` holds one report per component (a single one for
/// scalar observables).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsReport {
    pub name: String,
    pub series: Vec<Vec<AccumulatorReport>>,
}

/// Scalar derived from a state.
pub struct ScalarObs {
    name: &'static str,
    func: fn(&State) -> f64,
    acc_vec: Vec<Accumulator>,
}

impl ScalarObs {
    pub fn new(name: &'static str, func: fn(&State) -> f64, n_times: usize) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(n_times, Accumulator::new);
        Self {
            name,
            func,
            acc_vec,
        }
    }
}

impl Obs for ScalarObs {
    fn update(&mut self, i_time: usize, state: &State) -> Result<()> {
        let acc = self
            .acc_vec
            .get_mut(i_time)
            .with_context(|| format!("timepoint index {i_time} out of range"))?;
        acc.add((self.func)(state));
        Ok(())
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: self.name.to_string(),
            series: self.acc_vec.iter().map(|acc| vec![acc.report()]).collect(),
        }
    }
}

/// Fraction of free cells in each occupancy class.
///
/// Replicates in which the species is extinct are skipped.
pub struct OccupancyDist {
    species: Species,
    acc_mat: Vec<Vec<Accumulator>>,
}

impl OccupancyDist {
    pub fn new(species: Species, capacity: usize, n_times: usize) -> Self {
        let acc_mat = (0..n_times)
            .map(|_| {
                let mut acc_vec = Vec::new();
                acc_vec.resize_with(capacity + 1, Accumulator::new);
                acc_vec
            })
            .collect();
        Self { species, acc_mat }
    }
}

impl Obs for OccupancyDist {
    fn update(&mut self, i_time: usize, state: &State) -> Result<()> {
        let counts = match self.species {
            Species::Effector => state.effectors_by_occupancy(),
            Species::Target => state.targets_by_occupancy(),
        };
        let acc_vec = self
            .acc_mat
            .get_mut(i_time)
            .with_context(|| format!("timepoint index {i_time} out of range"))?;
        if counts.len() != acc_vec.len() {
            bail!(
                "state has {} occupancy classes, expected {}",
                counts.len(),
                acc_vec.len()
            );
        }

        let n_cells: f64 = counts.iter().sum();
        if n_cells == 0.0 {
            return Ok(());
        }
        for (acc, &count) in acc_vec.iter_mut().zip(counts) {
            acc.add(count / n_cells);
        }
        Ok(())
    }

    fn report(&self) -> ObsReport {
        let name = match self.species {
            Species::Effector => "effector_occupancy",
            Species::Target => "target_occupancy",
        };
        ObsReport {
            name: name.to_string(),
            series: self
                .acc_mat
                .iter()
                .map(|acc_vec| acc_vec.iter().map(Accumulator::report).collect())
                .collect(),
        }
    }
}

/// Analysis results written by [`Analyzer::save_results`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub times: Vec<f64>,
    pub n_trajectories: usize,
    pub observables: Vec<ObsReport>,
    /// Pointwise mean state at each timepoint.
    pub mean_states: Vec<State>,
}

pub struct Analyzer {
    times: Vec<f64>,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    state_sums: Vec<State>,
    n_trajectories: usize,
}

impl Analyzer {
    /// Create an analyzer for trajectories sampled at `times` (including 0).
    pub fn new(times: Vec<f64>, e_receptors: usize, t_receptors: usize) -> Self {
        let n_times = times.len();
        let scalars: [(&'static str, fn(&State) -> f64); 9] = [
            ("free_binder", State::free_binder),
            ("effectors", State::effectors),
            ("targets", State::targets),
            ("dimers", State::dimers),
            ("trimers", State::trimers),
            ("all_targets", State::all_targets),
            ("total_binder", State::total_d),
            ("bound_binder_per_effector", State::bound_d_per_effector),
            ("bound_binder_per_target", State::bound_d_per_target),
        ];

        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        for (name, func) in scalars {
            obs_ptr_vec.push(Box::new(ScalarObs::new(name, func, n_times)));
        }
        obs_ptr_vec.push(Box::new(OccupancyDist::new(
            Species::Effector,
            e_receptors,
            n_times,
        )));
        obs_ptr_vec.push(Box::new(OccupancyDist::new(
            Species::Target,
            t_receptors,
            n_times,
        )));

        Self {
            times,
            obs_ptr_vec,
            state_sums: vec![State::empty(e_receptors, t_receptors); n_times],
            n_trajectories: 0,
        }
    }

    pub fn add_trajectory(&mut self, trajectory: &Trajectory) -> Result<()> {
        let times: Vec<f64> = trajectory.times().collect();
        if times != self.times {
            bail!("trajectory times {times:?} differ from {:?}", self.times);
        }

        for (i_time, snapshot) in trajectory.snapshots.iter().enumerate() {
            for obs in &mut self.obs_ptr_vec {
                obs.update(i_time, &snapshot.state)
                    .context("failed to update observable")?;
            }
            self.state_sums[i_time] = self.state_sums[i_time]
                .checked_add(&snapshot.state)
                .context("failed to accumulate state")?;
        }
        self.n_trajectories += 1;
        Ok(())
    }

    /// Add every trajectory stored in a MessagePack trajectory file.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let trajectories = read_trajectories(file)?;
        for trajectory in &trajectories {
            self.add_trajectory(trajectory)
                .with_context(|| format!("failed to add trajectory from {file:?}"))?;
        }
        Ok(())
    }

    pub fn results(&self) -> Results {
        let mean_states = if self.n_trajectories == 0 {
            Vec::new()
        } else {
            let factor = 1.0 / self.n_trajectories as f64;
            self.state_sums.iter().map(|sum| sum.scale(factor)).collect()
        };
        Results {
            times: self.times.clone(),
            n_trajectories: self.n_trajectories,
            observables: self.obs_ptr_vec.iter().map(|obs| obs.report()).collect(),
            mean_states,
        }
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self.results()).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

pub fn write_trajectories<P: AsRef<Path>>(file: P, trajectories: &[Trajectory]) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, trajectories).context("failed to serialize trajectories")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

pub fn read_trajectories<P: AsRef<Path>>(file: P) -> Result<Vec<Trajectory>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    decode::from_read(&mut reader).context("failed to deserialize trajectories")
}

pub fn read_results<P: AsRef<Path>>(file: P) -> Result<Results> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let mut reader = BufReader::new(file);
    decode::from_read(&mut reader).context("failed to deserialize results")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Snapshot;

    fn trajectory(free_binder: [f64; 2], effectors: [[f64; 2]; 2]) -> Trajectory {
        let snapshots = [0.0, 1.0]
            .into_iter()
            .enumerate()
            .map(|(i_time, time)| {
                let mut state = State::empty(1, 1);
                state.set_free_binder(free_binder[i_time]);
                state.set_effector(0, effectors[i_time][0]).unwrap();
                state.set_effector(1, effectors[i_time][1]).unwrap();
                Snapshot { time, state }
            })
            .collect();
        Trajectory { snapshots }
    }

    fn find<'a>(results: &'a Results, name: &str) -> &'a ObsReport {
        results.observables.iter().find(|obs| obs.name == name).unwrap()
    }

    #[test]
    fn averages_across_trajectories() {
        let mut analyzer = Analyzer::new(vec![0.0, 1.0], 1, 1);
        analyzer
            .add_trajectory(&trajectory([10.0, 6.0], [[4.0, 0.0], [2.0, 2.0]]))
            .unwrap();
        analyzer
            .add_trajectory(&trajectory([10.0, 8.0], [[4.0, 0.0], [3.0, 1.0]]))
            .unwrap();
        let results = analyzer.results();
        assert_eq!(results.n_trajectories, 2);

        let free = find(&results, "free_binder");
        assert_eq!(free.series[0][0].mean, 10.0);
        assert_eq!(free.series[1][0].mean, 7.0);

        let occupancy = find(&results, "effector_occupancy");
        assert_eq!(occupancy.series[1].len(), 2);
        assert!((occupancy.series[1][1].mean - 0.375).abs() < 1e-12);

        // Extinct targets contribute nothing to the distribution.
        assert_eq!(find(&results, "target_occupancy").series[0][0].n_vals, 0);

        assert_eq!(results.mean_states[1].free_binder(), 7.0);
        assert_eq!(results.mean_states[1].effector(0).unwrap(), 2.5);
    }

    #[test]
    fn mismatched_times_are_rejected() {
        let mut analyzer = Analyzer::new(vec![0.0, 2.0], 1, 1);
        let err = analyzer
            .add_trajectory(&trajectory([1.0, 1.0], [[1.0, 0.0], [1.0, 0.0]]))
            .unwrap_err();
        assert!(err.to_string().contains("differ"));
    }
}
