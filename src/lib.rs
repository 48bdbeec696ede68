//!
//! Gaussian hidden Markov models for longitudinal glioblastoma imaging
//!
//! * `observation`: per-patient multivariate sequences
//! * `hmm`: emissions, transitions, forward-backward and Viterbi
//! * `em`: Baum-Welch training with restarts
//! * `report`: decoded per-patient trajectories
//!
pub mod common;
pub mod config;
pub mod em;
pub mod error;
pub mod hmm;
pub mod linalg;
pub mod observation;
pub mod prelude;
pub mod prob;
pub mod report;
pub mod utils;

#[cfg(test)]
#[macro_use]
extern crate approx;
