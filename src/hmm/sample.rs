//!
//! Sampling state paths and observations from ModelParameters
//!
use super::params::ModelParameters;
use crate::common::{st, State};
use crate::error::{HmmError, Result};
use crate::observation::ObservationSequence;
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;

///
/// A sampled hidden path and its `T x D` observations
///
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub states: Vec<State>,
    pub values: Array2<f64>,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.states.len()
    }
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
    pub fn to_sequence(&self, id: &str) -> ObservationSequence {
        ObservationSequence::from_values(id, self.values.clone())
    }
}

///
/// Pick a state index according to the probabilities
///
pub fn pick_with_prob<R: Rng>(rng: &mut R, probs: ArrayView1<f64>) -> Result<State> {
    let choices: Vec<usize> = (0..probs.len()).collect();
    choices
        .choose_weighted(rng, |&i| probs[i])
        .map(|&i| st(i))
        .map_err(|e| HmmError::InvalidParameters(format!("cannot pick a state: {}", e)))
}

impl ModelParameters {
    ///
    /// Sample a sequence of `length` timepoints.
    ///
    pub fn sample<R: Rng>(&self, length: usize, rng: &mut R) -> Result<Sample> {
        let mut states = Vec::with_capacity(length);
        let mut values = Array2::<f64>::zeros((length, self.n_features()));
        for t in 0..length {
            let state = if t == 0 {
                pick_with_prob(rng, self.initial.as_array().view())?
            } else {
                pick_with_prob(rng, self.transition.row(states[t - 1]))?
            };
            values
                .row_mut(t)
                .assign(&self.emissions.sample(state.index(), rng));
            states.push(state);
        }
        Ok(Sample { states, values })
    }
    ///
    /// Sample `n` sequences of `length` timepoints, named `seq0, seq1, ...`
    ///
    pub fn sample_sequences<R: Rng>(
        &self,
        n: usize,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<(Sample, ObservationSequence)>> {
        (0..n)
            .map(|i| {
                let sample = self.sample(length, rng)?;
                let seq = sample.to_sequence(&format!("seq{}", i));
                Ok((sample, seq))
            })
            .collect()
    }
}
