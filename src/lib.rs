//! Stochastic simulation of multivalent binders (CSANs) bridging effector
//! and target cells.
//!
//! The core is a continuous-time Markov chain [`engine::Engine`] driven by a
//! [`catalog::Catalog`] of rate-bounded [`event::Event`]s acting on an
//! occupancy-indexed [`state::State`]. The [`sampler::Sampler`] runs
//! independent replicates over a sequence of timepoints.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod manager;
pub mod params;
pub mod sampler;
pub mod state;
pub mod stats;

pub use catalog::Catalog;
pub use engine::{CancelToken, Engine, Halt, RateRefresh, RunSummary};
pub use error::SimError;
pub use params::{Params, Rates};
pub use sampler::{Sampler, Snapshot, Trajectory};
pub use state::State;

/// Random number generator threaded through every run.
pub type SimRng = rand_chacha::ChaCha12Rng;
