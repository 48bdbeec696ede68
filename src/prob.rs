//!
//! Log-space probability
//!
//! Path probabilities of a long follow-up easily underflow `f64`, so the
//! Viterbi recursion carries them as `ln p` and multiplies by adding logs.
//!
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

///
/// Wrapper of f64 that represents probability (or density) `p >= 0`
/// by storing `ln p`.
///
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, SerializeDisplay, DeserializeFromStr)]
pub struct Prob(f64);

impl Prob {
    pub fn from_prob(value: f64) -> Prob {
        Prob(value.ln())
    }
    pub fn from_log_prob(log_value: f64) -> Prob {
        Prob(log_value)
    }
    ///
    /// Get the probability in linear space.
    /// Can underflow to `0.0` for very long paths.
    pub fn to_value(self) -> f64 {
        self.0.exp()
    }
    pub fn to_log_value(self) -> f64 {
        self.0
    }
    ///
    /// Is `p == 0` or not? (log p = -inf)
    ///
    pub fn is_zero(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
}

///
/// `ln p` is written first so that it round-trips exactly,
/// the linear value in brackets is only for the reader.
///
impl std::fmt::Display for Prob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}({:.4})", self.0, self.to_value())
    }
}

impl FromStr for Prob {
    type Err = std::num::ParseFloatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let front = match s.split_once('(') {
            Some((front, _)) => front,
            None => s,
        };
        front.trim().parse::<f64>().map(Prob)
    }
}

/// `log(px * py) = log(px) + log(py)`
impl std::ops::Mul for Prob {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Prob(self.0 + other.0)
    }
}
