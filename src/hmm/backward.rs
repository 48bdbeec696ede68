//!
//! Backward algorithm
//!
//! ```text
//! beta_{T-1}[k] = 1
//! beta_t[j]     = sum_k A[j, k] b_k(x_{t+1}) beta_{t+1}[k]
//! ```
//!
//! Each step is divided by the forward scaling factor `c_{t+1}` of the same
//! sequence, which keeps `F[t, k] * B[t, k]` equal to the posterior.
//!
use super::params::ModelParameters;
use super::table::{BackwardTable, EmissionTable, ForwardTable, ScaledEmissions};
use crate::error::Result;
use crate::observation::ObservationSequence;
use ndarray::Array2;

impl ModelParameters {
    ///
    /// Run backward on the sequence. The forward pass is run as well, as it
    /// provides the scaling factors.
    ///
    pub fn backward(&self, seq: &ObservationSequence) -> Result<BackwardTable> {
        let et = self.emission_table(seq)?;
        self.backward_table(&et)
    }
    pub fn backward_table(&self, et: &EmissionTable) -> Result<BackwardTable> {
        self.check_table(et)?;
        let e = et.scaled()?;
        let forward = self.forward_scaled(&e)?;
        Ok(self.backward_scaled(&e, &forward))
    }
    pub(crate) fn backward_scaled(&self, e: &ScaledEmissions, forward: &ForwardTable) -> BackwardTable {
        let (n, k) = e.values.dim();
        let a = self.transition.as_array();
        let mut beta = Array2::<f64>::ones((n, k));

        for t in (0..n.saturating_sub(1)).rev() {
            let weighted = &e.values.row(t + 1) * &beta.row(t + 1);
            let row = a.dot(&weighted) / forward.scale[t + 1];
            beta.row_mut(t).assign(&row);
        }

        BackwardTable::new(beta, forward)
    }
}
