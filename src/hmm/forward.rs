//!
//! Forward algorithm
//!
//! ```text
//! alpha_0[k] = pi[k] b_k(x_0)
//! alpha_t[k] = (sum_j alpha_{t-1}[j] A[j, k]) b_k(x_t)
//! ```
//!
//! computed on the scaled emissions and normalized at each timepoint
//! (see `table` for the scaling).
//!
use super::params::ModelParameters;
use super::table::{EmissionTable, ForwardTable, ScaledEmissions};
use crate::error::{HmmError, Result};
use crate::observation::ObservationSequence;
use ndarray::{Array1, Array2};

impl ModelParameters {
    ///
    /// Run forward on the sequence.
    ///
    pub fn forward(&self, seq: &ObservationSequence) -> Result<ForwardTable> {
        let et = self.emission_table(seq)?;
        self.forward_table(&et)
    }
    ///
    /// Run forward on precomputed log densities.
    ///
    pub fn forward_table(&self, et: &EmissionTable) -> Result<ForwardTable> {
        self.check_table(et)?;
        self.forward_scaled(&et.scaled()?)
    }
    pub(crate) fn check_table(&self, et: &EmissionTable) -> Result<()> {
        if et.n_states() != self.n_states() {
            return Err(HmmError::InvalidParameters(format!(
                "emission table has {} states, model has {}",
                et.n_states(),
                self.n_states()
            )));
        }
        if et.is_empty() {
            return Err(HmmError::InvalidParameters(
                "emission table has no timepoints".to_string(),
            ));
        }
        Ok(())
    }
    pub(crate) fn forward_scaled(&self, e: &ScaledEmissions) -> Result<ForwardTable> {
        let (n, k) = e.values.dim();
        let a = self.transition.as_array();
        let mut alpha = Array2::<f64>::zeros((n, k));
        let mut scale = Array1::<f64>::zeros(n);

        for t in 0..n {
            let mut row = if t == 0 {
                self.initial.as_array() * &e.values.row(0)
            } else {
                alpha.row(t - 1).dot(a) * &e.values.row(t)
            };
            let c = row.sum();
            if !(c > 0.0) || !c.is_finite() {
                return Err(HmmError::InfeasiblePath { timepoint: t });
            }
            row /= c;
            alpha.row_mut(t).assign(&row);
            scale[t] = c;
        }

        Ok(ForwardTable::new(alpha, scale, e.shift.clone()))
    }
}
