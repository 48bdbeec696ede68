//!
//! Error type of the engine
//!
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HmmError>;

#[derive(Error, Debug)]
pub enum HmmError {
    #[error("sequence `{patient}` timepoint #{timepoint} has {got} features, expected {expected}")]
    DimensionMismatch {
        patient: String,
        timepoint: usize,
        expected: usize,
        got: usize,
    },

    #[error("sequence `{patient}` has no timepoints")]
    EmptySequence { patient: String },

    #[error("no sequences were given")]
    NoSequences,

    #[error("sequence `{patient}` timepoint #{timepoint} feature #{feature} is missing")]
    MissingValue {
        patient: String,
        timepoint: usize,
        feature: usize,
    },

    #[error("sequence `{patient}` has timepoint {timepoint} more than once")]
    DuplicateTimepoint { patient: String, timepoint: i64 },

    #[error("covariance of state {state} is not positive-definite after regularization")]
    SingularCovariance { state: usize },

    #[error(
        "log-likelihood decreased from {previous} to {current} at iteration {iteration}"
    )]
    NonMonotonicLikelihood {
        iteration: usize,
        previous: f64,
        current: f64,
    },

    #[error("no feasible state path: every state has zero probability at timepoint #{timepoint}")]
    InfeasiblePath { timepoint: usize },

    #[error("not converged after {iterations} iterations (last improvement {last_improvement})")]
    NotConverged {
        iterations: usize,
        last_improvement: f64,
    },

    #[error("invalid model parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HmmError {
    ///
    /// Input-validation failures, raised before anything is mutated.
    /// A restart cannot recover from these.
    ///
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            HmmError::DimensionMismatch { .. }
                | HmmError::EmptySequence { .. }
                | HmmError::NoSequences
                | HmmError::MissingValue { .. }
                | HmmError::DuplicateTimepoint { .. }
                | HmmError::InvalidConfig(_)
        )
    }
    ///
    /// Numerical anomalies detected inside an iteration.
    ///
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            HmmError::SingularCovariance { .. }
                | HmmError::NonMonotonicLikelihood { .. }
                | HmmError::InfeasiblePath { .. }
        )
    }
    ///
    /// Attach the state index to a `SingularCovariance` raised by a single
    /// Gaussian.
    ///
    pub fn at_state(self, state: usize) -> HmmError {
        match self {
            HmmError::SingularCovariance { .. } => HmmError::SingularCovariance { state },
            e => e,
        }
    }
}
