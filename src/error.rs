//! Error kinds raised by the simulation core.

use thiserror::Error;

/// Errors produced while building, running or sampling a simulation.
///
/// None of these are retried internally. Rejection in the thinning step is
/// an ordinary branch of the algorithm and never surfaces as an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Occupancy index outside the declared receptor capacity.
    #[error("index {index:?} out of range for {field} with shape {shape:?}")]
    IndexOutOfRange {
        field: &'static str,
        index: (usize, usize),
        shape: (usize, usize),
    },

    /// Required rate constant absent from the parameter mapping.
    #[error("missing parameter {0:?}")]
    MissingParameter(String),

    /// Rate constant present but outside its admissible range.
    #[error("invalid parameter {name:?}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The caller-supplied step ceiling was reached.
    #[error("step budget of {0} steps exceeded")]
    StepBudgetExceeded(u64),

    /// A rate function returned a negative (or NaN) value.
    #[error("event {event} evaluated negative rate {rate}")]
    NegativeRateEvaluated { event: String, rate: f64 },

    /// A rate function exceeded its own upper bound.
    #[error("event {event} evaluated rate {rate} above its bound {max_rate}")]
    RateBoundExceeded {
        event: String,
        rate: f64,
        max_rate: f64,
    },

    /// An event was implemented while its originating bucket was empty.
    #[error("cannot remove from empty {field} bucket {index:?}")]
    EmptyBucket {
        field: &'static str,
        index: (usize, usize),
    },

    /// Two states with different receptor capacities were combined.
    #[error("state shape {found:?} does not match {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Sampling timepoints are not finite, non-negative and strictly increasing.
    #[error("invalid timepoints: {0}")]
    InvalidTimepoints(String),

    /// A sampling distribution could not be constructed.
    #[error("invalid distribution: {0}")]
    Distribution(String),

    /// The run was cancelled through its cancel token.
    #[error("simulation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SimError>;
