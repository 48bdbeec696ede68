//!
//! Transition matrix and initial state distribution
//!
//! ```text
//! A[j, k] = P(state at t+1 = k | state at t = j)
//! pi[k]   = P(state at 0 = k)
//! ```
//!
use crate::common::{Freq, State};
use crate::error::{HmmError, Result};
use crate::prob::Prob;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Tolerance of a row sum in the constructors. Accepted rows are then
/// renormalized exactly.
const ROW_SUM_TOL: f64 = 1e-6;

fn check_distribution(xs: ArrayView1<f64>, what: &str) -> Result<f64> {
    if xs.iter().any(|&x| !(x >= 0.0) || !x.is_finite()) {
        return Err(HmmError::InvalidParameters(format!(
            "{} has negative or non-finite entries: {}",
            what, xs
        )));
    }
    let sum = xs.sum();
    if (sum - 1.0).abs() > ROW_SUM_TOL {
        return Err(HmmError::InvalidParameters(format!(
            "{} sums to {}, not 1",
            what, sum
        )));
    }
    Ok(sum)
}

///
/// Normalize expected counts into a distribution, or `None` if the counts
/// carry no usable mass.
///
fn normalize_counts(counts: ArrayView1<Freq>) -> Option<Array1<f64>> {
    if counts.iter().any(|&c| !(c >= 0.0) || !c.is_finite()) {
        return None;
    }
    let sum = counts.sum();
    if sum > 0.0 {
        Some(counts.mapv(|c| c / sum))
    } else {
        None
    }
}

///
/// `K x K` row-stochastic matrix
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Array2<f64>", into = "Array2<f64>")]
pub struct TransitionMatrix(Array2<f64>);

impl TransitionMatrix {
    ///
    /// Validate a square, non-negative matrix whose rows sum to 1.
    ///
    pub fn new(a: Array2<f64>) -> Result<Self> {
        let mut a = TransitionMatrix::checked(a)?.0;
        for mut row in a.rows_mut() {
            let sum = row.sum();
            row /= sum;
        }
        Ok(TransitionMatrix(a))
    }
    ///
    /// Validate without renormalizing, so that stored parameters load back
    /// bit for bit.
    ///
    fn checked(a: Array2<f64>) -> Result<Self> {
        if a.nrows() != a.ncols() || a.nrows() == 0 {
            return Err(HmmError::InvalidParameters(format!(
                "transition matrix must be square and non-empty, got {:?}",
                a.dim()
            )));
        }
        for (j, row) in a.rows().into_iter().enumerate() {
            check_distribution(row, &format!("transition row {}", j))?;
        }
        Ok(TransitionMatrix(a))
    }
    pub fn uniform(n_states: usize) -> Self {
        let p = 1.0 / n_states as f64;
        TransitionMatrix(Array2::from_elem((n_states, n_states), p))
    }
    ///
    /// Self-loop probability `p_stay`, the rest spread evenly over the other
    /// states.
    ///
    /// ```text
    /// K=3, p_stay=0.8:
    /// 0.8 0.1 0.1
    /// 0.1 0.8 0.1
    /// 0.1 0.1 0.8
    /// ```
    pub fn sticky(n_states: usize, p_stay: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p_stay) {
            return Err(HmmError::InvalidParameters(format!(
                "p_stay must be in [0, 1], got {}",
                p_stay
            )));
        }
        if n_states == 1 {
            return Ok(TransitionMatrix::uniform(1));
        }
        let p_move = (1.0 - p_stay) / (n_states - 1) as f64;
        let a = Array2::from_shape_fn((n_states, n_states), |(j, k)| {
            if j == k {
                p_stay
            } else {
                p_move
            }
        });
        TransitionMatrix::new(a)
    }
    pub fn n_states(&self) -> usize {
        self.0.nrows()
    }
    pub fn probability(&self, from: State, to: State) -> f64 {
        self.0[[from.index(), to.index()]]
    }
    pub fn log_probability(&self, from: State, to: State) -> Prob {
        Prob::from_prob(self.probability(from, to))
    }
    pub fn row(&self, from: State) -> ArrayView1<'_, f64> {
        self.0.row(from.index())
    }
    pub fn as_array(&self) -> &Array2<f64> {
        &self.0
    }
    ///
    /// New matrix from expected transition counts (`sum_t xi_t`).
    ///
    /// A row without counts (state never left) keeps the current row.
    ///
    pub fn reestimate(&self, counts: &Array2<Freq>) -> Result<Self> {
        if counts.dim() != self.0.dim() {
            return Err(HmmError::InvalidParameters(format!(
                "transition counts {:?} for a {}-state model",
                counts.dim(),
                self.n_states()
            )));
        }
        let mut a = self.0.clone();
        for (j, mut row) in a.rows_mut().into_iter().enumerate() {
            if let Some(p) = normalize_counts(counts.row(j)) {
                row.assign(&p);
            }
        }
        Ok(TransitionMatrix(a))
    }
}

impl TryFrom<Array2<f64>> for TransitionMatrix {
    type Error = HmmError;
    fn try_from(a: Array2<f64>) -> Result<Self> {
        TransitionMatrix::checked(a)
    }
}

impl From<TransitionMatrix> for Array2<f64> {
    fn from(a: TransitionMatrix) -> Self {
        a.0
    }
}

impl std::fmt::Display for TransitionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (j, row) in self.0.rows().into_iter().enumerate() {
            if j > 0 {
                writeln!(f)?;
            }
            let cells: Vec<String> = row.iter().map(|p| format!("{:.4}", p)).collect();
            write!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

///
/// Distribution of the state at the first timepoint
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Array1<f64>", into = "Array1<f64>")]
pub struct InitialDistribution(Array1<f64>);

impl InitialDistribution {
    pub fn new(pi: Array1<f64>) -> Result<Self> {
        let pi = InitialDistribution::checked(pi)?.0;
        let sum = pi.sum();
        Ok(InitialDistribution(pi / sum))
    }
    fn checked(pi: Array1<f64>) -> Result<Self> {
        if pi.is_empty() {
            return Err(HmmError::InvalidParameters(
                "initial distribution must be non-empty".to_string(),
            ));
        }
        check_distribution(pi.view(), "initial distribution")?;
        Ok(InitialDistribution(pi))
    }
    pub fn uniform(n_states: usize) -> Self {
        InitialDistribution(Array1::from_elem(n_states, 1.0 / n_states as f64))
    }
    pub fn n_states(&self) -> usize {
        self.0.len()
    }
    pub fn probability(&self, state: State) -> f64 {
        self.0[state.index()]
    }
    pub fn log_probability(&self, state: State) -> Prob {
        Prob::from_prob(self.probability(state))
    }
    pub fn as_array(&self) -> &Array1<f64> {
        &self.0
    }
    ///
    /// New distribution from expected initial counts (`sum gamma_0`).
    /// Without counts, the current distribution is kept.
    ///
    pub fn reestimate(&self, counts: &Array1<Freq>) -> Result<Self> {
        if counts.len() != self.n_states() {
            return Err(HmmError::InvalidParameters(format!(
                "{} initial counts for a {}-state model",
                counts.len(),
                self.n_states()
            )));
        }
        Ok(match normalize_counts(counts.view()) {
            Some(p) => InitialDistribution(p),
            None => self.clone(),
        })
    }
}

impl TryFrom<Array1<f64>> for InitialDistribution {
    type Error = HmmError;
    fn try_from(pi: Array1<f64>) -> Result<Self> {
        InitialDistribution::checked(pi)
    }
}

impl From<InitialDistribution> for Array1<f64> {
    fn from(pi: InitialDistribution) -> Self {
        pi.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::st;
    use ndarray::array;

    #[test]
    fn sticky_rows_sum_to_one() {
        let a = TransitionMatrix::sticky(3, 0.8).unwrap();
        println!("{}", a);
        for row in a.as_array().rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(a.probability(st(0), st(0)), 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(a.probability(st(0), st(2)), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(a.log_probability(st(1), st(2)).to_value(), 0.1, epsilon = 1e-12);
        assert!(TransitionMatrix::sticky(3, 1.5).is_err());
        assert_eq!(TransitionMatrix::sticky(1, 0.8).unwrap().as_array(), &array![[1.0]]);
    }
    #[test]
    fn invalid_matrices() {
        assert!(TransitionMatrix::new(array![[0.5, 0.5]]).is_err());
        assert!(TransitionMatrix::new(array![[0.5, 0.6], [0.5, 0.5]]).is_err());
        assert!(TransitionMatrix::new(array![[1.5, -0.5], [0.5, 0.5]]).is_err());
        assert!(TransitionMatrix::new(array![[f64::NAN, 1.0], [0.5, 0.5]]).is_err());
        assert!(InitialDistribution::new(array![0.2, 0.2]).is_err());
        // within tolerance: renormalized
        let a = TransitionMatrix::new(array![[0.5, 0.5 + 1e-8], [0.3, 0.7]]).unwrap();
        assert_abs_diff_eq!(a.row(st(0)).sum(), 1.0, epsilon = 1e-12);
    }
    #[test]
    fn reestimate_transition() {
        let a = TransitionMatrix::sticky(3, 0.8).unwrap();
        let counts = array![[3.0, 1.0, 0.0], [0.0, 0.0, 0.0], [1e-300, 0.0, 2.0]];
        let b = a.reestimate(&counts).unwrap();
        assert_abs_diff_eq!(b.probability(st(0), st(0)), 0.75);
        assert_abs_diff_eq!(b.probability(st(0), st(1)), 0.25);
        assert_abs_diff_eq!(b.probability(st(0), st(2)), 0.0);
        // no counts: row kept
        assert_eq!(b.row(st(1)), a.row(st(1)));
        for row in b.as_array().rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
        assert!(a.reestimate(&array![[1.0]]).is_err());
    }
    #[test]
    fn reestimate_initial() {
        let pi = InitialDistribution::uniform(2);
        let next = pi.reestimate(&array![1.0, 3.0]).unwrap();
        assert_abs_diff_eq!(next.probability(st(1)), 0.75);
        let same = pi.reestimate(&array![0.0, 0.0]).unwrap();
        assert_eq!(same, pi);
        let same = pi.reestimate(&array![f64::NAN, 1.0]).unwrap();
        assert_eq!(same, pi);
    }
    #[test]
    fn serde_validates() {
        let a = TransitionMatrix::sticky(2, 0.9).unwrap();
        let json = serde_json::to_string(&a).unwrap();
        let b: TransitionMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(a, b);
        let bad = serde_json::to_string(&array![[0.9, 0.9], [0.5, 0.5]]).unwrap();
        assert!(serde_json::from_str::<TransitionMatrix>(&bad).is_err());
    }
}
