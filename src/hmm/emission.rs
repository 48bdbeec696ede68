//!
//! Emission model: per-state Gaussian densities
//!
//! The emission family is a tagged variant chosen once when the model is
//! built: every state of a model is either `Diagonal` or `Full`.
//!
pub mod diagonal;
pub mod full;

pub use diagonal::DiagonalGaussian;
pub use full::FullGaussian;

use crate::config::EmissionKind;
use crate::error::{HmmError, Result};
use crate::linalg::floor_eigenvalues;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// `ln(2 pi)`
pub(crate) const LN_2PI: f64 = 1.837_877_066_409_345_5;

///
/// A standard normal draw by the Box-Muller transform
///
pub(crate) fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // 1 - [0, 1) is in (0, 1], keeps ln away from 0
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

pub(crate) fn check_mean(mean: &Array1<f64>) -> Result<()> {
    if mean.is_empty() {
        return Err(HmmError::InvalidParameters(
            "mean must have at least one feature".to_string(),
        ));
    }
    if mean.iter().any(|x| !x.is_finite()) {
        return Err(HmmError::InvalidParameters(format!(
            "mean has non-finite entries: {}",
            mean
        )));
    }
    Ok(())
}

///
/// Emission distributions of all `K` states.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "states", rename_all = "snake_case")]
pub enum Emissions {
    Diagonal(Vec<DiagonalGaussian>),
    Full(Vec<FullGaussian>),
}

impl Emissions {
    ///
    /// Diagonal-covariance emissions from `K x D` means and variances.
    ///
    pub fn diagonal(means: &Array2<f64>, vars: &Array2<f64>, min_covar: f64) -> Result<Self> {
        if means.dim() != vars.dim() {
            return Err(HmmError::InvalidParameters(format!(
                "means {:?} and variances {:?} differ in shape",
                means.dim(),
                vars.dim()
            )));
        }
        let states = means
            .rows()
            .into_iter()
            .zip(vars.rows())
            .enumerate()
            .map(|(k, (mean, var))| {
                DiagonalGaussian::new(mean.to_owned(), var.to_owned(), min_covar)
                    .map_err(|e| e.at_state(k))
            })
            .collect::<Result<Vec<_>>>()?;
        Emissions::from_diagonal(states)
    }
    ///
    /// Full-covariance emissions from `K x D` means and `K` covariances.
    ///
    pub fn full(means: &Array2<f64>, covs: &[Array2<f64>], min_covar: f64) -> Result<Self> {
        if means.nrows() != covs.len() {
            return Err(HmmError::InvalidParameters(format!(
                "{} means but {} covariances",
                means.nrows(),
                covs.len()
            )));
        }
        let states = means
            .rows()
            .into_iter()
            .zip(covs.iter())
            .enumerate()
            .map(|(k, (mean, cov))| {
                FullGaussian::new(mean.to_owned(), cov.clone(), min_covar)
                    .map_err(|e| e.at_state(k))
            })
            .collect::<Result<Vec<_>>>()?;
        Emissions::from_full(states)
    }
    pub fn from_diagonal(states: Vec<DiagonalGaussian>) -> Result<Self> {
        let e = Emissions::Diagonal(states);
        e.validate()?;
        Ok(e)
    }
    pub fn from_full(states: Vec<FullGaussian>) -> Result<Self> {
        let e = Emissions::Full(states);
        e.validate()?;
        Ok(e)
    }
    ///
    /// At least one state, all states of the same dimension.
    ///
    pub fn validate(&self) -> Result<()> {
        if self.n_states() == 0 {
            return Err(HmmError::InvalidParameters(
                "emissions need at least one state".to_string(),
            ));
        }
        let d = self.dim();
        for k in 0..self.n_states() {
            if self.mean(k).len() != d {
                return Err(HmmError::InvalidParameters(format!(
                    "state {} has dimension {}, state 0 has {}",
                    k,
                    self.mean(k).len(),
                    d
                )));
            }
        }
        if let Emissions::Diagonal(states) = self {
            for (k, g) in states.iter().enumerate() {
                if g.var().iter().any(|&v| !(v > 0.0) || !v.is_finite()) {
                    return Err(HmmError::SingularCovariance { state: k });
                }
            }
        }
        Ok(())
    }
    pub fn kind(&self) -> EmissionKind {
        match self {
            Emissions::Diagonal(_) => EmissionKind::Diagonal,
            Emissions::Full(_) => EmissionKind::Full,
        }
    }
    pub fn n_states(&self) -> usize {
        match self {
            Emissions::Diagonal(states) => states.len(),
            Emissions::Full(states) => states.len(),
        }
    }
    ///
    /// Number of features `D`
    pub fn dim(&self) -> usize {
        match self {
            Emissions::Diagonal(states) => states.first().map_or(0, |g| g.dim()),
            Emissions::Full(states) => states.first().map_or(0, |g| g.dim()),
        }
    }
    pub fn mean(&self, state: usize) -> &Array1<f64> {
        match self {
            Emissions::Diagonal(states) => states[state].mean(),
            Emissions::Full(states) => states[state].mean(),
        }
    }
    ///
    /// Covariance of the state as a `D x D` matrix
    pub fn covariance(&self, state: usize) -> Array2<f64> {
        match self {
            Emissions::Diagonal(states) => Array2::from_diag(states[state].var()),
            Emissions::Full(states) => states[state].covariance().clone(),
        }
    }
    pub fn log_density(&self, state: usize, x: ArrayView1<f64>) -> f64 {
        match self {
            Emissions::Diagonal(states) => states[state].log_density(x),
            Emissions::Full(states) => states[state].log_density(x),
        }
    }
    ///
    /// Probability density of observing `x` from `state`.
    /// Can underflow to 0 far from the mean; the engine uses `log_density`.
    pub fn density(&self, state: usize, x: ArrayView1<f64>) -> f64 {
        self.log_density(state, x).exp()
    }
    pub fn sample<R: Rng>(&self, state: usize, rng: &mut R) -> Array1<f64> {
        match self {
            Emissions::Diagonal(states) => states[state].sample(rng),
            Emissions::Full(states) => states[state].sample(rng),
        }
    }
    ///
    /// Re-estimate every state from posterior state-occupancy weights.
    ///
    /// `data` holds, for each sequence, the `T x D` observations and the
    /// `T x K` weights (gamma). For state `k` with total weight `W_k`:
    ///
    /// ```text
    /// mean_k = sum_t g_tk x_t / W_k
    /// cov_k  = sum_t g_tk (x_t - mean_k)(x_t - mean_k)^T / W_k
    /// ```
    ///
    /// Variances (diagonal) or eigenvalues (full) below `min_covar` are raised
    /// to `min_covar`, which keeps the update the maximizer of the EM objective
    /// over the floored parameter set. A state with `W_k < min_weight` keeps
    /// its current parameters.
    ///
    pub fn reestimate(
        &self,
        data: &[(ArrayView2<f64>, ArrayView2<f64>)],
        min_covar: f64,
        min_weight: f64,
    ) -> Result<Emissions> {
        let k_states = self.n_states();
        let d = self.dim();
        for (x, w) in data.iter() {
            if x.ncols() != d || w.ncols() != k_states || x.nrows() != w.nrows() {
                return Err(HmmError::InvalidParameters(format!(
                    "observations {:?} and weights {:?} do not match a {}-state {}-dim model",
                    x.dim(),
                    w.dim(),
                    k_states,
                    d
                )));
            }
            if w.iter().any(|&g| !(g >= 0.0) || !g.is_finite()) {
                return Err(HmmError::InvalidParameters(
                    "posterior weights must be finite and non-negative".to_string(),
                ));
            }
        }

        match self {
            Emissions::Diagonal(states) => {
                let mut next = Vec::with_capacity(k_states);
                for (k, g) in states.iter().enumerate() {
                    next.push(match weighted_moments(data, k, d, min_weight) {
                        Some((mean, scatter)) => {
                            DiagonalGaussian::new(mean, scatter.diag().to_owned(), min_covar)
                                .map_err(|e| e.at_state(k))?
                        }
                        None => g.clone(),
                    });
                }
                Ok(Emissions::Diagonal(next))
            }
            Emissions::Full(states) => {
                let mut next = Vec::with_capacity(k_states);
                for (k, g) in states.iter().enumerate() {
                    next.push(match weighted_moments(data, k, d, min_weight) {
                        Some((mean, scatter)) => {
                            let cov = floor_eigenvalues(&scatter, min_covar);
                            FullGaussian::new(mean, cov, min_covar).map_err(|e| e.at_state(k))?
                        }
                        None => g.clone(),
                    });
                }
                Ok(Emissions::Full(next))
            }
        }
    }
}

///
/// Weighted mean and scatter matrix of state `k`, or `None` if the state
/// carries less than `min_weight` (or no finite weight at all).
///
fn weighted_moments(
    data: &[(ArrayView2<f64>, ArrayView2<f64>)],
    k: usize,
    d: usize,
    min_weight: f64,
) -> Option<(Array1<f64>, Array2<f64>)> {
    let total: f64 = data.iter().map(|(_, w)| w.column(k).sum()).sum();
    if !(total > 0.0) || !total.is_finite() || total < min_weight {
        return None;
    }
    let mut mean = Array1::<f64>::zeros(d);
    for (x, w) in data.iter() {
        for (row, &g) in x.rows().into_iter().zip(w.column(k).iter()) {
            mean.scaled_add(g, &row);
        }
    }
    mean /= total;

    let mut scatter = Array2::<f64>::zeros((d, d));
    for (x, w) in data.iter() {
        for (row, &g) in x.rows().into_iter().zip(w.column(k).iter()) {
            let diff = &row - &mean;
            for i in 0..d {
                for j in 0..=i {
                    scatter[[i, j]] += g * diff[i] * diff[j];
                }
            }
        }
    }
    for i in 0..d {
        for j in 0..i {
            scatter[[j, i]] = scatter[[i, j]];
        }
    }
    scatter /= total;
    Some((mean, scatter))
}
