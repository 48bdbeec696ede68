//!
//! Calculate state/transition usage frequencies
//! from the result of Forward/Backward.
//!
//! - **gamma** (for each timepoint and state)
//!     The posterior probability `P(s_t = k | x)` of being in state `k` at `t`.
//!
//! - **xi** (for each adjacent pair of timepoints)
//!     The posterior probability `P(s_t = j, s_{t+1} = k | x)`.
//!
//! - **Freqs** (for each sequence, summable over sequences)
//!     Expected initial counts (gamma at `t = 0`), expected transition counts
//!     (sum of xi) and expected state occupancy (sum of gamma).
//!
use super::params::ModelParameters;
use super::table::{BackwardTable, EmissionTable, ForwardTable, ScaledEmissions};
use crate::common::Freq;
use crate::error::Result;
use crate::observation::ObservationSequence;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::ops::{Add, AddAssign};

///
/// Struct for storing forward and backward results of a sequence
///
#[derive(Debug, Clone)]
pub struct FbOutput {
    pub emissions: ScaledEmissions,
    pub forward: ForwardTable,
    pub backward: BackwardTable,
    transition: Array2<f64>,
}

impl FbOutput {
    pub fn len(&self) -> usize {
        self.forward.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn log_likelihood(&self) -> f64 {
        self.forward.log_likelihood()
    }
    ///
    /// `T x K` posterior state probabilities, every row sums to 1
    ///
    pub fn gamma(&self) -> Array2<f64> {
        let mut gamma = &self.forward.alpha * &self.backward.beta;
        for mut row in gamma.rows_mut() {
            let s = row.sum();
            row /= s;
        }
        gamma
    }
    ///
    /// `K x K` posterior transition probabilities between `t` and `t+1`
    ///
    /// ```text
    /// xi_t[j, k] = F[t, j] A[j, k] e'_{t+1}[k] B[t+1, k] / c_{t+1}
    /// ```
    ///
    /// `None` for the last timepoint `t >= T - 1`, which has no successor.
    pub fn xi(&self, t: usize) -> Option<Array2<f64>> {
        if t + 1 >= self.len() {
            return None;
        }
        let alpha = self.forward.alpha.row(t);
        let next = &self.emissions.values.row(t + 1) * &self.backward.beta.row(t + 1);
        let c = self.forward.scale[t + 1];
        let mut xi = Array2::from_shape_fn(self.transition.dim(), |(j, k)| {
            alpha[j] * self.transition[[j, k]] * next[k] / c
        });
        let s = xi.sum();
        if s > 0.0 {
            xi /= s;
        }
        Some(xi)
    }
    ///
    /// Expected counts of this sequence
    ///
    pub fn to_freqs(&self) -> Freqs {
        self.freqs_with_gamma(&self.gamma())
    }
    fn freqs_with_gamma(&self, gamma: &Array2<f64>) -> Freqs {
        let k = gamma.ncols();
        let mut trans = Array2::<Freq>::zeros((k, k));
        for xi in (0..self.len()).map_while(|t| self.xi(t)) {
            trans += &xi;
        }
        Freqs {
            init: gamma.row(0).to_owned(),
            trans,
            occupancy: gamma.sum_axis(Axis(0)),
            log_likelihood: self.log_likelihood(),
        }
    }
}

///
/// Expected counts, summed over sequences
///
#[derive(Debug, Clone, PartialEq)]
pub struct Freqs {
    /// expected number of sequences starting in each state
    pub init: Array1<Freq>,
    /// expected number of `j -> k` transitions
    pub trans: Array2<Freq>,
    /// expected number of timepoints spent in each state
    pub occupancy: Array1<Freq>,
    /// sum of `log P(x)`
    pub log_likelihood: f64,
}

impl Freqs {
    pub fn zeros(n_states: usize) -> Self {
        Freqs {
            init: Array1::zeros(n_states),
            trans: Array2::zeros((n_states, n_states)),
            occupancy: Array1::zeros(n_states),
            log_likelihood: 0.0,
        }
    }
}

impl<'a> AddAssign<&'a Freqs> for Freqs {
    fn add_assign(&mut self, other: &'a Freqs) {
        self.init += &other.init;
        self.trans += &other.trans;
        self.occupancy += &other.occupancy;
        self.log_likelihood += other.log_likelihood;
    }
}

impl Add for Freqs {
    type Output = Freqs;
    fn add(mut self, other: Freqs) -> Freqs {
        self += &other;
        self
    }
}

impl std::iter::Sum for Freqs {
    fn sum<I: Iterator<Item = Freqs>>(mut iter: I) -> Freqs {
        match iter.next() {
            Some(first) => iter.fold(first, |acc, x| acc + x),
            None => Freqs::zeros(0),
        }
    }
}

///
/// Output of the E-step over a set of sequences
///
#[derive(Debug, Clone)]
pub struct EStep {
    /// gamma of each sequence, in input order
    pub gammas: Vec<Array2<f64>>,
    pub freqs: Freqs,
}

impl EStep {
    pub fn log_likelihood(&self) -> f64 {
        self.freqs.log_likelihood
    }
}

///
/// methods to generate FbOutput from ModelParameters
///
impl ModelParameters {
    ///
    /// Run forward and backward for the sequence.
    ///
    pub fn run(&self, seq: &ObservationSequence) -> Result<FbOutput> {
        let et = self.emission_table(seq)?;
        self.run_table(&et)
    }
    pub fn run_table(&self, et: &EmissionTable) -> Result<FbOutput> {
        self.check_table(et)?;
        let emissions = et.scaled()?;
        let forward = self.forward_scaled(&emissions)?;
        let backward = self.backward_scaled(&emissions, &forward);
        Ok(FbOutput {
            emissions,
            forward,
            backward,
            transition: self.transition.as_array().clone(),
        })
    }
    ///
    /// Run forward/backward on all sequences and sum the expected counts.
    ///
    /// With `parallel`, the sequences are processed with rayon. Per-sequence
    /// results are collected in input order and summed sequentially, so both
    /// paths return identical numbers. On failure the error of the first
    /// failing sequence (in input order) is returned.
    ///
    pub fn expectations(&self, seqs: &[ObservationSequence], parallel: bool) -> Result<EStep> {
        let per_seq = |seq: &ObservationSequence| -> Result<(Array2<f64>, Freqs)> {
            let o = self.run(seq)?;
            let gamma = o.gamma();
            let freqs = o.freqs_with_gamma(&gamma);
            Ok((gamma, freqs))
        };
        let results: Vec<Result<(Array2<f64>, Freqs)>> = if parallel {
            seqs.par_iter().map(per_seq).collect()
        } else {
            seqs.iter().map(per_seq).collect()
        };

        let mut gammas = Vec::with_capacity(seqs.len());
        let mut freqs = Freqs::zeros(self.n_states());
        for r in results {
            let (gamma, f) = r?;
            freqs += &f;
            gammas.push(gamma);
        }
        Ok(EStep { gammas, freqs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::mocks::{mock_three_state_1d, mock_two_state_2d_full};
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn gamma_and_xi_are_distributions() {
        let params = mock_three_state_1d();
        let seq = ObservationSequence::from_scalars("a", &[0.1, 0.2, 4.9, 5.1, 10.0]);
        let o = params.run(&seq).unwrap();
        let gamma = o.gamma();
        for row in gamma.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        for t in 0..seq.len() - 1 {
            let xi = o.xi(t).unwrap();
            assert_abs_diff_eq!(xi.sum(), 1.0, epsilon = 1e-12);
            // marginals of xi are the gammas
            let from = xi.sum_axis(Axis(1));
            let to = xi.sum_axis(Axis(0));
            for k in 0..3 {
                assert_abs_diff_eq!(from[k], gamma[[t, k]], epsilon = 1e-9);
                assert_abs_diff_eq!(to[k], gamma[[t + 1, k]], epsilon = 1e-9);
            }
        }
        // well separated: posteriors are sharp
        assert!(gamma[[0, 0]] > 0.99);
        assert!(gamma[[4, 2]] > 0.99);
    }
    #[test]
    fn freqs_of_a_sequence() {
        let params = mock_three_state_1d();
        let seq = ObservationSequence::from_scalars("a", &[0.1, 0.2, 4.9, 5.1, 10.0]);
        let f = params.run(&seq).unwrap().to_freqs();
        assert_abs_diff_eq!(f.init.sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.occupancy.sum(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(f.trans.sum(), 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(f.trans[[0, 0]], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(f.trans[[0, 1]], 1.0, epsilon = 1e-3);
    }
    #[test]
    fn single_timepoint_has_no_transitions() {
        let params = mock_three_state_1d();
        let seq = ObservationSequence::from_scalars("one", &[5.0]);
        let f = params.run(&seq).unwrap().to_freqs();
        assert_eq!(f.trans.sum(), 0.0);
        assert_abs_diff_eq!(f.occupancy.sum(), 1.0, epsilon = 1e-12);
    }
    #[test]
    fn xi_is_not_defined_past_the_last_transition() {
        let params = mock_three_state_1d();
        let o = params
            .run(&ObservationSequence::from_scalars("a", &[0.1, 5.0]))
            .unwrap();
        assert!(o.xi(0).is_some());
        assert_eq!(o.xi(1), None);
        assert_eq!(o.xi(7), None);
        let one = params
            .run(&ObservationSequence::from_scalars("one", &[5.0]))
            .unwrap();
        assert_eq!(one.xi(0), None);
    }
    #[test]
    fn parallel_estep_is_identical() {
        let params = mock_two_state_2d_full();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let seqs: Vec<ObservationSequence> = (0..12)
            .map(|i| {
                params
                    .sample(3 + i, &mut rng)
                    .unwrap()
                    .to_sequence(&format!("s{}", i))
            })
            .collect();
        let serial = params.expectations(&seqs, false).unwrap();
        let parallel = params.expectations(&seqs, true).unwrap();
        assert_eq!(serial.freqs, parallel.freqs);
        assert_eq!(serial.gammas, parallel.gammas);
        assert_abs_diff_eq!(
            serial.log_likelihood(),
            params.total_log_likelihood(&seqs).unwrap(),
            epsilon = 1e-9
        );
    }
    #[test]
    fn estep_reports_first_failure() {
        let params = mock_two_state_2d_full();
        let seqs = vec![
            ObservationSequence::from_values("ok", array![[0.0, 0.0]]),
            ObservationSequence::from_values("bad", array![[0.0, 0.0, 1.0]]),
            ObservationSequence::from_values("empty", Array2::zeros((0, 2))),
        ];
        match params.expectations(&seqs, true) {
            Err(crate::error::HmmError::DimensionMismatch { patient, .. }) => {
                assert_eq!(patient, "bad")
            }
            r => panic!("unexpected {:?}", r.map(|e| e.log_likelihood())),
        }
    }
    #[test]
    fn freqs_sum() {
        let a = Freqs {
            init: array![1.0, 0.0],
            trans: array![[1.0, 2.0], [3.0, 4.0]],
            occupancy: array![2.0, 3.0],
            log_likelihood: -1.0,
        };
        let total: Freqs = vec![a.clone(), a.clone()].into_iter().sum();
        assert_eq!(total.trans, array![[2.0, 4.0], [6.0, 8.0]]);
        assert_eq!(total.log_likelihood, -2.0);
    }
}
