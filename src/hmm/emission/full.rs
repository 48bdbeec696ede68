//!
//! Gaussian with full covariance
//!
use super::{check_mean, standard_normal, LN_2PI};
use crate::error::{HmmError, Result};
use crate::linalg::{cholesky, log_det_from_cholesky, solve_lower};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};

///
/// Number of times the diagonal jitter is multiplied by 10
/// before giving up on a covariance.
///
const MAX_JITTER_STEPS: usize = 10;

///
/// Multivariate Gaussian `N(mean, cov)`.
///
/// The Cholesky factor of `cov` is cached; only mean and covariance are
/// serialized and the factor is rebuilt (and checked) on load.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GaussianParams", into = "GaussianParams")]
pub struct FullGaussian {
    mean: Array1<f64>,
    cov: Array2<f64>,
    chol: Array2<f64>,
    log_det: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GaussianParams {
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl FullGaussian {
    ///
    /// Create from mean and covariance.
    ///
    /// If `cov` cannot be factorized, `epsilon * I` is added (growing the
    /// epsilon tenfold a few times). The regularized matrix is stored as the
    /// covariance, so the density always agrees with `covariance()`.
    ///
    pub fn new(mean: Array1<f64>, cov: Array2<f64>, epsilon: f64) -> Result<Self> {
        check_shape(&mean, &cov)?;
        if let Some(g) = FullGaussian::factorize(mean.clone(), cov.clone()) {
            return Ok(g);
        }
        let mut jitter = epsilon;
        for _ in 0..MAX_JITTER_STEPS {
            let regularized = &cov + &(Array2::<f64>::eye(mean.len()) * jitter);
            if let Some(g) = FullGaussian::factorize(mean.clone(), regularized) {
                return Ok(g);
            }
            jitter *= 10.0;
        }
        Err(HmmError::SingularCovariance { state: 0 })
    }
    ///
    /// Create without any regularization: `cov` must already be
    /// positive-definite.
    ///
    pub fn exact(mean: Array1<f64>, cov: Array2<f64>) -> Result<Self> {
        check_shape(&mean, &cov)?;
        FullGaussian::factorize(mean, cov).ok_or(HmmError::SingularCovariance { state: 0 })
    }
    fn factorize(mean: Array1<f64>, cov: Array2<f64>) -> Option<Self> {
        let chol = cholesky(&cov)?;
        let log_det = log_det_from_cholesky(&chol);
        if !log_det.is_finite() {
            return None;
        }
        Some(FullGaussian {
            mean,
            cov,
            chol,
            log_det,
        })
    }
    pub fn dim(&self) -> usize {
        self.mean.len()
    }
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }
    pub fn covariance(&self) -> &Array2<f64> {
        &self.cov
    }
    ///
    /// ```text
    /// log N(x | mu, S) = -1/2 ( D log(2 pi) + log|S| + |L^-1 (x - mu)|^2 )
    /// ```
    /// where `S = L L^T`.
    pub fn log_density(&self, x: ArrayView1<f64>) -> f64 {
        let diff = &x - &self.mean;
        let z = solve_lower(&self.chol, diff.view());
        let quad = z.dot(&z);
        -0.5 * (self.dim() as f64 * LN_2PI + self.log_det + quad)
    }
    ///
    /// `mean + L z` with `z ~ N(0, I)`
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Array1<f64> {
        let z = Array1::from_shape_fn(self.dim(), |_| standard_normal(rng));
        &self.mean + &self.chol.dot(&z)
    }
}

fn check_shape(mean: &Array1<f64>, cov: &Array2<f64>) -> Result<()> {
    check_mean(mean)?;
    let d = mean.len();
    if cov.dim() != (d, d) {
        return Err(HmmError::InvalidParameters(format!(
            "covariance of shape {:?} for a {}-dimensional mean",
            cov.dim(),
            d
        )));
    }
    if cov.iter().any(|x| !x.is_finite()) {
        return Err(HmmError::InvalidParameters(
            "covariance has non-finite entries".to_string(),
        ));
    }
    let scale = cov.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    for i in 0..d {
        for j in 0..i {
            if (cov[[i, j]] - cov[[j, i]]).abs() > 1e-9 * scale.max(1.0) {
                return Err(HmmError::InvalidParameters(format!(
                    "covariance is not symmetric at ({}, {})",
                    i, j
                )));
            }
        }
    }
    Ok(())
}

impl TryFrom<GaussianParams> for FullGaussian {
    type Error = HmmError;
    fn try_from(p: GaussianParams) -> Result<Self> {
        FullGaussian::exact(p.mean, p.covariance)
    }
}

impl From<FullGaussian> for GaussianParams {
    fn from(g: FullGaussian) -> Self {
        GaussianParams {
            mean: g.mean,
            covariance: g.cov,
        }
    }
}
