//!
//! Gaussian with independent features
//!
use super::{check_mean, standard_normal, LN_2PI};
use crate::error::{HmmError, Result};
use ndarray::{Array1, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiagonalGaussian {
    mean: Array1<f64>,
    var: Array1<f64>,
}

impl DiagonalGaussian {
    ///
    /// Create from mean and per-feature variances.
    ///
    /// Variances below `min_covar` are raised to `min_covar`;
    /// negative or non-finite ones are rejected.
    ///
    pub fn new(mean: Array1<f64>, var: Array1<f64>, min_covar: f64) -> Result<Self> {
        check_mean(&mean)?;
        if var.len() != mean.len() {
            return Err(HmmError::InvalidParameters(format!(
                "{} variances for a {}-dimensional mean",
                var.len(),
                mean.len()
            )));
        }
        if var.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(HmmError::InvalidParameters(format!(
                "variances must be finite and non-negative, got {}",
                var
            )));
        }
        let var = var.mapv(|v| v.max(min_covar));
        if var.iter().any(|&v| !(v > 0.0)) {
            return Err(HmmError::SingularCovariance { state: 0 });
        }
        Ok(DiagonalGaussian { mean, var })
    }
    pub fn dim(&self) -> usize {
        self.mean.len()
    }
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }
    pub fn var(&self) -> &Array1<f64> {
        &self.var
    }
    ///
    /// ```text
    /// log N(x | mu, diag(var)) = -1/2 sum_d ( log(2 pi var_d) + (x_d - mu_d)^2 / var_d )
    /// ```
    pub fn log_density(&self, x: ArrayView1<f64>) -> f64 {
        let mut s = 0.0;
        for d in 0..self.dim() {
            let diff = x[d] - self.mean[d];
            s += LN_2PI + self.var[d].ln() + diff * diff / self.var[d];
        }
        -0.5 * s
    }
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Array1<f64> {
        Array1::from_shape_fn(self.dim(), |d| {
            self.mean[d] + self.var[d].sqrt() * standard_normal(rng)
        })
    }
}
