//!
//! Table definitions
//!
//! ## EmissionTable
//!
//! `log b_k(x_t)` for each (timepoint, state), `T x K`
//!
//! ## ForwardTable
//!
//! scaled forward probabilities `F[t, k]`, rows normalized to 1.
//!
//! ## BackwardTable
//!
//! scaled backward probabilities `B[t, k]`.
//!
//! ## Scaling
//!
//! The emission densities of a timepoint are divided by their maximum
//! `exp(m_t)` before use, so the largest of them is exactly 1 and no
//! density underflows because the observation is far from every mean.
//! The forward row is then divided by its sum `c_t`. The unscaled values are
//!
//! ```text
//! alpha_t[k] = F[t, k] * prod_{s<=t} c_s exp(m_s)
//! beta_t[k]  = B[t, k] * prod_{s>t} c_s exp(m_s)
//! log P(x)   = sum_t ln(c_t) + m_t
//! ```
//!
use crate::error::{HmmError, Result};
use crate::prob::Prob;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

///
/// Log emission densities of a sequence
///
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionTable {
    log: Array2<f64>,
}

///
/// Emission densities shifted by the per-timepoint maximum
///
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledEmissions {
    /// `exp(log b_k(x_t) - m_t)`, `T x K`
    pub values: Array2<f64>,
    /// `m_t`
    pub shift: Array1<f64>,
}

impl EmissionTable {
    ///
    /// Wrap a `T x K` table of log densities. `-inf` is a zero density,
    /// `NaN` and `+inf` are rejected.
    ///
    pub fn new(log: Array2<f64>) -> Result<Self> {
        if log.iter().any(|x| x.is_nan() || *x == f64::INFINITY) {
            return Err(HmmError::InvalidParameters(
                "emission table has NaN or +inf log densities".to_string(),
            ));
        }
        Ok(EmissionTable { log })
    }
    /// `T`
    pub fn len(&self) -> usize {
        self.log.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// `K`
    pub fn n_states(&self) -> usize {
        self.log.ncols()
    }
    pub fn log_density(&self, t: usize, k: usize) -> f64 {
        self.log[[t, k]]
    }
    pub fn row(&self, t: usize) -> ArrayView1<'_, f64> {
        self.log.row(t)
    }
    pub fn as_array(&self) -> ArrayView2<'_, f64> {
        self.log.view()
    }
    ///
    /// Overwrite the log densities of a timepoint.
    ///
    pub fn set_row(&mut self, t: usize, log: ArrayView1<f64>) {
        self.log.row_mut(t).assign(&log);
    }
    ///
    /// Shift each row by its maximum and exponentiate.
    ///
    /// Fails with `InfeasiblePath` at the first timepoint where every state
    /// has zero density.
    ///
    pub fn scaled(&self) -> Result<ScaledEmissions> {
        let mut values = Array2::<f64>::zeros(self.log.dim());
        let mut shift = Array1::<f64>::zeros(self.len());
        for (t, row) in self.log.rows().into_iter().enumerate() {
            let m = row.fold(f64::NEG_INFINITY, |m, &x| m.max(x));
            if m == f64::NEG_INFINITY {
                return Err(HmmError::InfeasiblePath { timepoint: t });
            }
            shift[t] = m;
            values.row_mut(t).assign(&row.mapv(|x| (x - m).exp()));
        }
        Ok(ScaledEmissions { values, shift })
    }
}

///
/// Result of the forward algorithm
///
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardTable {
    /// `F[t, k]`, every row sums to 1
    pub alpha: Array2<f64>,
    /// `c_t`
    pub scale: Array1<f64>,
    /// `m_t`
    pub shift: Array1<f64>,
    /// `sum_{u <= t} (ln c_u + m_u)`
    log_prefix: Array1<f64>,
}

impl ForwardTable {
    pub fn new(alpha: Array2<f64>, scale: Array1<f64>, shift: Array1<f64>) -> Self {
        let mut log_prefix = scale.mapv(f64::ln) + &shift;
        for t in 1..log_prefix.len() {
            log_prefix[t] += log_prefix[t - 1];
        }
        ForwardTable {
            alpha,
            scale,
            shift,
            log_prefix,
        }
    }
    pub fn len(&self) -> usize {
        self.alpha.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    ///
    /// `ln c_t + m_t` of every timepoint
    ///
    pub fn log_scales(&self) -> Array1<f64> {
        self.scale.mapv(f64::ln) + &self.shift
    }
    ///
    /// `log P(x_0, ..., x_{T-1})`
    ///
    pub fn log_likelihood(&self) -> f64 {
        self.log_prefix.last().copied().unwrap_or(0.0)
    }
    ///
    /// `P(x_0, ..., x_{T-1})` as a log-space `Prob`
    ///
    pub fn full_prob(&self) -> Prob {
        Prob::from_log_prob(self.log_likelihood())
    }
    ///
    /// unscaled `log alpha_t[k] = log P(x_0..x_t, s_t = k)`
    ///
    pub fn log_value(&self, t: usize, k: usize) -> f64 {
        self.alpha[[t, k]].ln() + self.log_prefix[t]
    }
}

///
/// Result of the backward algorithm
///
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardTable {
    /// `B[t, k]`
    pub beta: Array2<f64>,
    /// `sum_{u > t} (ln c_u + m_u)` from the forward scales
    log_suffix: Array1<f64>,
}

impl BackwardTable {
    pub fn new(beta: Array2<f64>, forward: &ForwardTable) -> Self {
        let log_scales = forward.log_scales();
        let n = log_scales.len();
        let mut log_suffix = Array1::<f64>::zeros(n);
        for t in (0..n.saturating_sub(1)).rev() {
            log_suffix[t] = log_suffix[t + 1] + log_scales[t + 1];
        }
        BackwardTable { beta, log_suffix }
    }
    pub fn len(&self) -> usize {
        self.beta.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    ///
    /// unscaled `log beta_t[k] = log P(x_{t+1}..x_{T-1} | s_t = k)`
    ///
    pub fn log_value(&self, t: usize, k: usize) -> f64 {
        self.beta[[t, k]].ln() + self.log_suffix[t]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scaled_emissions() {
        let et = EmissionTable::new(array![[-1000.0, -1001.0], [0.0, f64::NEG_INFINITY]]).unwrap();
        let s = et.scaled().unwrap();
        assert_eq!(s.shift, array![-1000.0, 0.0]);
        assert_abs_diff_eq!(s.values[[0, 0]], 1.0);
        assert_abs_diff_eq!(s.values[[0, 1]], (-1.0f64).exp(), epsilon = 1e-15);
        assert_eq!(s.values[[1, 1]], 0.0);
    }
    #[test]
    fn log_values_use_cumulative_scales() {
        let alpha = array![[0.5, 0.5], [0.25, 0.75], [1.0, 0.0]];
        let scale = array![2.0, 0.5, 4.0];
        let shift = array![-1.0, 3.0, 0.5];
        let f = ForwardTable::new(alpha, scale.clone(), shift.clone());
        let logs: Vec<f64> = (0..3).map(|t| scale[t].ln() + shift[t]).collect();
        assert_abs_diff_eq!(f.log_likelihood(), logs.iter().sum::<f64>(), epsilon = 1e-12);
        assert_abs_diff_eq!(f.log_value(0, 0), 0.5f64.ln() + logs[0], epsilon = 1e-12);
        assert_abs_diff_eq!(
            f.log_value(1, 1),
            0.75f64.ln() + logs[0] + logs[1],
            epsilon = 1e-12
        );
        assert_eq!(f.log_value(2, 1), f64::NEG_INFINITY);

        let b = BackwardTable::new(array![[2.0, 1.0], [1.0, 0.5], [1.0, 1.0]], &f);
        assert_abs_diff_eq!(b.log_value(0, 0), 2.0f64.ln() + logs[1] + logs[2], epsilon = 1e-12);
        assert_abs_diff_eq!(b.log_value(1, 1), 0.5f64.ln() + logs[2], epsilon = 1e-12);
        assert_eq!(b.log_value(2, 0), 0.0);
    }
    #[test]
    fn infeasible_timepoint() {
        let mut et = EmissionTable::new(array![[0.0, 0.0], [0.0, 0.0], [0.0, 0.0]]).unwrap();
        et.set_row(1, array![f64::NEG_INFINITY, f64::NEG_INFINITY].view());
        assert!(matches!(
            et.scaled(),
            Err(HmmError::InfeasiblePath { timepoint: 1 })
        ));
        assert!(EmissionTable::new(array![[f64::NAN]]).is_err());
    }
}
