use crate::params::{Params, Rates};
use crate::sampler::uniform_timepoints;
use crate::state::State;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    /// Named rate constants, e.g. `lambda_ET` or `"p_E|T"`.
    pub params: Params,
    pub init: InitConfig,
    pub sampling: SamplingConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Receptors per effector cell.
    pub e_receptors: usize,
    /// Receptors per target cell.
    pub t_receptors: usize,
}

/// Initial condition. Occupancy vectors have `receptors + 1` entries.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    pub free_binder: f64,
    pub effectors: Vec<f64>,
    pub targets: Vec<f64>,
    /// `EDT` matrix (`e_receptors x t_receptors`); empty means all zero.
    #[serde(default)]
    pub trimers: Vec<Vec<f64>>,
    /// `ET` matrix (`e_receptors x t_receptors`); empty means all zero.
    #[serde(default)]
    pub dimers: Vec<Vec<f64>>,
}

/// Sampling schedule: either explicit `timepoints` or `end_time` split
/// into `n_intervals` equal gaps.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    pub timepoints: Option<Vec<f64>>,
    pub end_time: Option<f64>,
    pub n_intervals: Option<usize>,
    /// Replicates per run.
    pub n_replicates: usize,
    /// Master seed; drawn at random when absent.
    pub seed: Option<u64>,
    /// Step budget of each engine run; unlimited when absent.
    pub max_steps: Option<u64>,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;
        config.validate().context("failed to validate config")?;
        Ok(config)
    }

    /// Resolved rate constants.
    pub fn rates(&self) -> Result<Rates> {
        Rates::from_params(&self.params).context("invalid params")
    }

    pub fn initial_state(&self) -> Result<State> {
        let (e, t) = (self.model.e_receptors, self.model.t_receptors);
        let mut state = State::empty(e, t);
        state.set_free_binder(self.init.free_binder);
        for (occ, &count) in self.init.effectors.iter().enumerate() {
            state.set_effector(occ, count)?;
        }
        for (occ, &count) in self.init.targets.iter().enumerate() {
            state.set_target(occ, count)?;
        }
        for (i, row) in self.init.trimers.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                state.set_trimer(i, j, count)?;
            }
        }
        for (i, row) in self.init.dimers.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                state.set_dimer(i, j, count)?;
            }
        }
        Ok(state)
    }

    pub fn timepoints(&self) -> Vec<f64> {
        match (&self.sampling.timepoints, self.sampling.end_time) {
            (Some(timepoints), _) => timepoints.clone(),
            (None, Some(end_time)) => {
                uniform_timepoints(end_time, self.sampling.n_intervals.unwrap_or(1))
            }
            (None, None) => Vec::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        let (e, t) = (self.model.e_receptors, self.model.t_receptors);
        check_num(e, 1..=1000).context("invalid number of effector receptors")?;
        check_num(t, 1..=1000).context("invalid number of target receptors")?;

        self.rates()?;

        check_count(self.init.free_binder).context("invalid initial free binder")?;
        check_vec(&self.init.effectors, e + 1).context("invalid initial effectors")?;
        check_vec(&self.init.targets, t + 1).context("invalid initial targets")?;
        check_mat(&self.init.trimers, (e, t)).context("invalid initial trimers")?;
        check_mat(&self.init.dimers, (e, t)).context("invalid initial dimers")?;

        let sampling = &self.sampling;
        match (&sampling.timepoints, sampling.end_time, sampling.n_intervals) {
            (Some(timepoints), None, None) => {
                if timepoints.is_empty() {
                    bail!("timepoints must not be empty");
                }
                if timepoints.windows(2).any(|pair| pair[1] <= pair[0]) {
                    bail!("timepoints must be strictly increasing");
                }
                for &time in timepoints {
                    check_num(time, 0.0..f64::INFINITY).context("invalid timepoint")?;
                }
            }
            (None, Some(end_time), Some(n_intervals)) => {
                check_num(end_time, 0.0..f64::INFINITY).context("invalid end time")?;
                if end_time == 0.0 {
                    bail!("end time must be positive");
                }
                check_num(n_intervals, 1..=1_000_000).context("invalid number of intervals")?;
            }
            _ => bail!("sampling requires either timepoints or end_time with n_intervals"),
        }
        check_num(sampling.n_replicates, 1..=10_000_000).context("invalid number of replicates")?;
        if let Some(max_steps) = sampling.max_steps {
            check_num(max_steps, 1..).context("invalid step budget")?;
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_count(count: f64) -> Result<()> {
    check_num(count, 0.0..f64::INFINITY)?;
    if count.fract() != 0.0 {
        bail!("count must be a whole number, but is {count}");
    }
    Ok(())
}

fn check_vec(vec: &[f64], exp_len: usize) -> Result<()> {
    let len = vec.len();
    if len != exp_len {
        bail!("vector length must be {exp_len}, but is {len}");
    }
    for (i_ele, &ele) in vec.iter().enumerate() {
        check_count(ele).with_context(|| format!("invalid element {i_ele}"))?;
    }
    Ok(())
}

fn check_mat(mat: &[Vec<f64>], exp_dim: (usize, usize)) -> Result<()> {
    if mat.is_empty() {
        return Ok(());
    }
    let (exp_n_rows, exp_n_cols) = exp_dim;
    let n_rows = mat.len();
    if n_rows != exp_n_rows {
        bail!("matrix must have {exp_n_rows} rows, but has {n_rows}");
    }
    for (i_row, row) in mat.iter().enumerate() {
        check_vec(row, exp_n_cols).with_context(|| format!("invalid row {i_row}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[model]
e_receptors = 2
t_receptors = 2

[params]
b_T = 0.03
d_E = 0.03
lambda_E = 0.001
lambda_T = 0.001
mu_E = 0.01
mu_T = 0.01
lambda_ET = 0.01
"p_E|T" = 0.01
"p_E|DT" = 0.8
"p_ED|T" = 0.8
M = 2
d_EDT = 1
d_ET = 1

[init]
free_binder = 100
effectors = [10, 0, 0]
targets = [10, 0, 0]
dimers = [[0, 1], [0, 0]]

[sampling]
end_time = 4.0
n_intervals = 4
n_replicates = 3
seed = 5
"#;

    #[test]
    fn parses_and_builds_initial_state() {
        let config = Config::from_toml(CONFIG).unwrap();
        assert_eq!(config.timepoints(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(config.rates().unwrap().m, 2.0);

        let state = config.initial_state().unwrap();
        assert_eq!(state.free_binder(), 100.0);
        assert_eq!(state.effectors(), 10.0);
        assert_eq!(state.dimer(0, 1).unwrap(), 1.0);
        assert_eq!(state.trimers(), 0.0);
    }

    #[test]
    fn rejects_invalid_configs() {
        let missing = CONFIG.replace("lambda_ET = 0.01\n", "");
        let err = Config::from_toml(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("lambda_ET"));

        let short = CONFIG.replace("effectors = [10, 0, 0]", "effectors = [10, 0]");
        assert!(Config::from_toml(&short).is_err());

        let fractional = CONFIG.replace("free_binder = 100", "free_binder = 0.5");
        assert!(Config::from_toml(&fractional).is_err());

        let both = CONFIG.replace("n_intervals = 4", "n_intervals = 4\ntimepoints = [1.0]");
        assert!(Config::from_toml(&both).is_err());

        let decreasing = CONFIG
            .replace("end_time = 4.0\n", "timepoints = [2.0, 1.0]\n")
            .replace("n_intervals = 4\n", "");
        assert!(Config::from_toml(&decreasing).is_err());
    }
}
