//!
//! Viterbi algorithm
//!
//! Most probable state path given the parameters, in log space:
//!
//! ```text
//! delta_0[k] = log pi[k] + log b_k(x_0)
//! delta_t[k] = max_j (delta_{t-1}[j] + log A[j, k]) + log b_k(x_t)
//! psi_t[k]   = argmax_j (delta_{t-1}[j] + log A[j, k])
//! ```
//!
//! Ties are broken toward the lowest state index, both for the predecessor
//! and for the final state.
//!
use super::params::ModelParameters;
use super::table::EmissionTable;
use crate::common::{st, State};
use crate::config::HmmConfig;
use crate::error::{HmmError, Result};
use crate::observation::ObservationSequence;
use crate::prob::Prob;
use serde::{Deserialize, Serialize};

///
/// Decoded state path of a sequence
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedPath {
    /// one state per timepoint
    pub states: Vec<State>,
    /// `log P(x, path)`
    pub log_prob: Prob,
}

impl DecodedPath {
    pub fn len(&self) -> usize {
        self.states.len()
    }
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
    pub fn indices(&self) -> Vec<usize> {
        self.states.iter().map(|s| s.index()).collect()
    }
    pub fn labels(&self, config: &HmmConfig) -> Vec<String> {
        self.states.iter().map(|s| config.label(s.index())).collect()
    }
    ///
    /// Fraction of timepoints where the path agrees with `truth`
    ///
    /// `None` if `truth` has another length or the path is empty.
    ///
    pub fn accuracy(&self, truth: &[State]) -> Option<f64> {
        if self.is_empty() || self.len() != truth.len() {
            return None;
        }
        let n_match = self
            .states
            .iter()
            .zip(truth.iter())
            .filter(|(a, b)| a == b)
            .count();
        Some(n_match as f64 / self.len() as f64)
    }
}

impl std::fmt::Display for DecodedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let states: Vec<String> = self.states.iter().map(|s| s.to_string()).collect();
        write!(f, "{} {}", states.join(","), self.log_prob)
    }
}

///
/// index of the first maximum
///
fn argmax<I: Iterator<Item = Prob>>(iter: I) -> Option<(usize, Prob)> {
    let mut best: Option<(usize, Prob)> = None;
    for (i, p) in iter.enumerate() {
        match best {
            Some((_, q)) if !(p > q) => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

impl ModelParameters {
    ///
    /// Most probable state path of the sequence.
    ///
    pub fn decode(&self, seq: &ObservationSequence) -> Result<DecodedPath> {
        let et = self.emission_table(seq)?;
        self.decode_table(&et)
    }
    ///
    /// Most probable state path for precomputed log densities.
    ///
    /// Fails with `InfeasiblePath` if at some timepoint no state can be
    /// reached with a non-zero probability.
    ///
    pub fn decode_table(&self, et: &EmissionTable) -> Result<DecodedPath> {
        self.check_table(et)?;
        let n = et.len();
        let k = self.n_states();
        let log_trans: Vec<Vec<Prob>> = (0..k)
            .map(|i| (0..k).map(|j| self.transition.log_probability(st(i), st(j))).collect())
            .collect();
        let emission = |t: usize, s: usize| Prob::from_log_prob(et.log_density(t, s));

        let mut delta: Vec<Prob> = (0..k)
            .map(|s| self.initial.log_probability(st(s)) * emission(0, s))
            .collect();
        if delta.iter().all(|p| p.is_zero()) {
            return Err(HmmError::InfeasiblePath { timepoint: 0 });
        }
        let mut psi: Vec<Vec<usize>> = Vec::with_capacity(n);
        psi.push(vec![0; k]);

        for t in 1..n {
            let mut next = Vec::with_capacity(k);
            let mut back = Vec::with_capacity(k);
            for s in 0..k {
                let (j, p) = argmax((0..k).map(|j| delta[j] * log_trans[j][s]))
                    .ok_or(HmmError::InfeasiblePath { timepoint: t })?;
                next.push(p * emission(t, s));
                back.push(j);
            }
            if next.iter().all(|p| p.is_zero()) {
                return Err(HmmError::InfeasiblePath { timepoint: t });
            }
            delta = next;
            psi.push(back);
        }

        let (last, log_prob) = argmax(delta.iter().copied())
            .ok_or(HmmError::InfeasiblePath { timepoint: n - 1 })?;
        let mut states = vec![st(0); n];
        states[n - 1] = st(last);
        for t in (1..n).rev() {
            states[t - 1] = st(psi[t][states[t].index()]);
        }
        Ok(DecodedPath { states, log_prob })
    }
}
