//!
//! Configuration of model fitting and decoding
//!
use crate::common::default_state_labels;
use crate::error::{HmmError, Result};
use serde::{Deserialize, Serialize};

///
/// Emission family, selected once when a model is constructed.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionKind {
    /// independent features, one variance per feature
    Diagonal,
    /// full `D x D` covariance
    Full,
}

///
/// How the starting parameters of each restart are chosen.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    /// means at randomly picked observations, pooled covariance
    Random,
    /// k-means++ seeded Lloyd clustering of all timepoints
    KMeans,
}

///
/// Immutable configuration passed to the trainer and the initializers.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HmmConfig {
    ///
    /// number of hidden states `K`
    pub n_states: usize,
    pub emission_kind: EmissionKind,
    ///
    /// training stops when the total log-likelihood improves by less than this
    pub tol: f64,
    ///
    /// maximum number of Baum-Welch iterations per restart
    pub max_iter: usize,
    ///
    /// number of independent restarts; the best final log-likelihood wins
    pub n_restarts: usize,
    ///
    /// seed of restart `r` is `seed + r`
    pub seed: u64,
    ///
    /// variance floor and regularization epsilon of covariances
    pub min_covar: f64,
    ///
    /// a state with smaller expected occupancy keeps its emission parameters
    pub min_state_weight: f64,
    ///
    /// largest decrease of log-likelihood between iterations that is still
    /// attributed to rounding
    pub likelihood_drop_tol: f64,
    pub init_method: InitMethod,
    ///
    /// run the E-step of each sequence in parallel with rayon
    pub parallel: bool,
    pub state_labels: Vec<String>,
}

impl HmmConfig {
    pub fn new(n_states: usize, emission_kind: EmissionKind) -> HmmConfig {
        HmmConfig {
            n_states,
            emission_kind,
            tol: 1e-4,
            max_iter: 200,
            n_restarts: 5,
            seed: 42,
            min_covar: 1e-6,
            min_state_weight: 1e-3,
            likelihood_drop_tol: 1e-6,
            init_method: InitMethod::KMeans,
            parallel: false,
            state_labels: default_state_labels(n_states),
        }
    }
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
    pub fn with_restarts(mut self, n_restarts: usize) -> Self {
        self.n_restarts = n_restarts;
        self
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    pub fn with_min_covar(mut self, min_covar: f64) -> Self {
        self.min_covar = min_covar;
        self
    }
    pub fn with_init_method(mut self, init_method: InitMethod) -> Self {
        self.init_method = init_method;
        self
    }
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn with_state_labels(mut self, labels: Vec<String>) -> Self {
        self.state_labels = labels;
        self
    }
    ///
    /// Label of the state, falling back to the index
    ///
    pub fn label(&self, state: usize) -> String {
        self.state_labels
            .get(state)
            .cloned()
            .unwrap_or_else(|| format!("state{}", state))
    }
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(HmmError::InvalidConfig(msg));
        if self.n_states == 0 {
            return invalid("n_states must be at least 1".to_string());
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return invalid(format!("tol must be positive, got {}", self.tol));
        }
        if self.max_iter == 0 {
            return invalid("max_iter must be at least 1".to_string());
        }
        if self.n_restarts == 0 {
            return invalid("n_restarts must be at least 1".to_string());
        }
        if !(self.min_covar > 0.0 && self.min_covar.is_finite()) {
            return invalid(format!("min_covar must be positive, got {}", self.min_covar));
        }
        if !(self.min_state_weight >= 0.0 && self.min_state_weight.is_finite()) {
            return invalid(format!(
                "min_state_weight must be non-negative, got {}",
                self.min_state_weight
            ));
        }
        if !(self.likelihood_drop_tol >= 0.0) {
            return invalid(format!(
                "likelihood_drop_tol must be non-negative, got {}",
                self.likelihood_drop_tol
            ));
        }
        if self.state_labels.len() != self.n_states {
            return invalid(format!(
                "{} state labels for {} states",
                self.state_labels.len(),
                self.n_states
            ));
        }
        Ok(())
    }
}

///
/// Three-state full-covariance model, the configuration of the mock
/// glioblastoma example (200 iterations, seed 42).
///
impl Default for HmmConfig {
    fn default() -> Self {
        HmmConfig::new(3, EmissionKind::Full)
    }
}

impl std::fmt::Display for HmmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "n_states: {}", self.n_states)?;
        writeln!(f, "emission_kind: {:?}", self.emission_kind)?;
        writeln!(f, "tol: {}", self.tol)?;
        writeln!(f, "max_iter: {}", self.max_iter)?;
        writeln!(f, "n_restarts: {}", self.n_restarts)?;
        writeln!(f, "seed: {}", self.seed)?;
        writeln!(f, "min_covar: {}", self.min_covar)?;
        writeln!(f, "min_state_weight: {}", self.min_state_weight)?;
        writeln!(f, "likelihood_drop_tol: {}", self.likelihood_drop_tol)?;
        writeln!(f, "init_method: {:?}", self.init_method)?;
        writeln!(f, "parallel: {}", self.parallel)?;
        write!(f, "state_labels: {:?}", self.state_labels)
    }
}
