//!
//! Gaussian HMM engine
//!
//! ## Model
//!
//! A discrete hidden state `s_t` in `0..K` follows a Markov chain with
//! initial distribution `pi` and transition matrix `A`; each state emits a
//! `D`-dimensional feature vector from a Gaussian.
//!
//! ```text
//! P(x, s) = pi[s_0] b_{s_0}(x_0) prod_{t>0} A[s_{t-1}, s_t] b_{s_t}(x_t)
//! ```
//!
//! ## Modules
//!
//! * `emission`: per-state Gaussians (diagonal or full covariance)
//! * `trans_table`: `A` and `pi`
//! * `params`: `ModelParameters` bundling the three
//! * `table`: emission/forward/backward tables and their scaling
//! * `forward`, `backward`: scaled forward and backward algorithms
//! * `freq`: gamma, xi and expected counts (E-step)
//! * `viterbi`: most probable state path
//! * `sample`: draw paths and observations
//!
pub mod backward;
pub mod emission;
pub mod forward;
pub mod freq;
pub mod mocks;
pub mod params;
pub mod sample;
pub mod table;
pub mod trans_table;
pub mod viterbi;

pub use emission::{DiagonalGaussian, Emissions, FullGaussian};
pub use freq::{EStep, FbOutput, Freqs};
pub use params::ModelParameters;
pub use sample::Sample;
pub use table::{BackwardTable, EmissionTable, ForwardTable};
pub use trans_table::{InitialDistribution, TransitionMatrix};
pub use viterbi::DecodedPath;
