use crate::analysis::{Analyzer, write_trajectories};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::engine::Engine;
use crate::sampler::Sampler;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Simulation directory holding `config.toml` and one `run-NNNN` dir per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Sample a new batch of replicates into a fresh run directory.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let seed = self.cfg.sampling.seed.unwrap_or_else(rand::random);
        // Distinct runs must not repeat the same replicate streams.
        let seed = seed.wrapping_add(run_idx as u64);
        log::info!("sampling with seed {seed}");

        let catalog = Catalog::new(self.cfg.model.e_receptors, self.cfg.model.t_receptors);
        log::info!("built catalog of {} events", catalog.len());

        let rates = self.cfg.rates()?;
        let engine = Engine::new(&catalog, &rates).with_max_steps(self.cfg.sampling.max_steps);
        let sampler = Sampler::new(engine, self.cfg.timepoints(), seed)
            .context("failed to construct sampler")?;

        let initial = self
            .cfg
            .initial_state()
            .context("failed to build initial state")?;
        let trajectories = sampler
            .sample(&initial, self.cfg.sampling.n_replicates)
            .context("failed to sample trajectories")?;

        // Run dirs exist only for completed samples.
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let trajectory_file = self.trajectory_file(run_idx);
        if let Err(error) = write_trajectories(&trajectory_file, &trajectories) {
            fs::remove_dir_all(&run_dir).ok();
            return Err(error.context("failed to write trajectories"));
        }

        Ok(())
    }

    /// Compute ensemble statistics over the trajectories of every run.
    pub fn analyze_sim(&self) -> Result<()> {
        let mut times = vec![0.0];
        times.extend(self.cfg.timepoints().into_iter().filter(|&time| time > 0.0));
        let mut analyzer = Analyzer::new(
            times,
            self.cfg.model.e_receptors,
            self.cfg.model.t_receptors,
        );

        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            analyzer
                .add_file(self.trajectory_file(run_idx))
                .context("failed to add file")?;
        }

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("analyzed {n_runs} runs into {results_file:?}");

        Ok(())
    }

    /// Remove every run directory and the results file.
    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectories.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}
