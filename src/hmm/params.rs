//!
//! ModelParameters: everything the engine needs to evaluate a sequence
//!
use super::emission::Emissions;
use super::table::EmissionTable;
use super::trans_table::{InitialDistribution, TransitionMatrix};
use crate::common::st;
use crate::config::EmissionKind;
use crate::error::{HmmError, Result};
use crate::observation::ObservationSequence;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

///
/// Initial distribution, transition matrix and emissions of a `K`-state HMM.
///
/// Parameters are immutable; the trainer replaces the whole value after each
/// M-step.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub initial: InitialDistribution,
    pub transition: TransitionMatrix,
    pub emissions: Emissions,
}

impl ModelParameters {
    pub fn new(
        initial: InitialDistribution,
        transition: TransitionMatrix,
        emissions: Emissions,
    ) -> Result<Self> {
        let params = ModelParameters {
            initial,
            transition,
            emissions,
        };
        params.validate()?;
        Ok(params)
    }
    ///
    /// Check that all three parts agree on `K`.
    ///
    pub fn validate(&self) -> Result<()> {
        let k = self.transition.n_states();
        if self.initial.n_states() != k || self.emissions.n_states() != k {
            return Err(HmmError::InvalidParameters(format!(
                "state counts differ: initial {}, transition {}, emissions {}",
                self.initial.n_states(),
                k,
                self.emissions.n_states()
            )));
        }
        self.emissions.validate()
    }
    /// `K`
    pub fn n_states(&self) -> usize {
        self.transition.n_states()
    }
    /// `D`
    pub fn n_features(&self) -> usize {
        self.emissions.dim()
    }
    pub fn kind(&self) -> EmissionKind {
        self.emissions.kind()
    }
    ///
    /// Log densities of every (timepoint, state) of the sequence.
    ///
    /// The sequence is checked first (non-empty, `D` features, no missing
    /// values).
    ///
    pub fn emission_table(&self, seq: &ObservationSequence) -> Result<EmissionTable> {
        seq.validate(self.n_features())?;
        let k = self.n_states();
        let log = Array2::from_shape_fn((seq.len(), k), |(t, s)| {
            self.emissions.log_density(s, seq.observation(t))
        });
        EmissionTable::new(log)
    }
    ///
    /// `log P(x)` of the sequence by the forward algorithm
    ///
    pub fn log_likelihood(&self, seq: &ObservationSequence) -> Result<f64> {
        Ok(self.forward(seq)?.log_likelihood())
    }
    ///
    /// Sum of `log P(x)` over sequences
    ///
    pub fn total_log_likelihood(&self, seqs: &[ObservationSequence]) -> Result<f64> {
        let mut total = 0.0;
        for seq in seqs {
            total += self.log_likelihood(seq)?;
        }
        Ok(total)
    }
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
    ///
    /// Parse and validate.
    ///
    pub fn from_json(json: &str) -> Result<Self> {
        let params: ModelParameters = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let params: ModelParameters = serde_json::from_reader(std::io::BufReader::new(file))?;
        params.validate()?;
        Ok(params)
    }
}

impl std::fmt::Display for ModelParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "# K={} D={} emissions={:?}",
            self.n_states(),
            self.n_features(),
            self.kind()
        )?;
        for k in 0..self.n_states() {
            let cov: Vec<String> = self
                .emissions
                .covariance(k)
                .iter()
                .map(|x| format!("{:.4}", x))
                .collect();
            writeln!(
                f,
                "{}\tpi={:.4}\tmean={}\tcov=[{}]",
                st(k),
                self.initial.probability(st(k)),
                self.emissions.mean(k),
                cov.join(",")
            )?;
        }
        writeln!(f, "# transition")?;
        write!(f, "{}", self.transition)
    }
}
