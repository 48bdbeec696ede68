//!
//! Per-patient decoded trajectories
//!
//! A `Report` bundles, for every patient of a store, the decoded state of each
//! visit next to the observed features. It is serialized to JSON for the
//! (external) plotting, or printed as tab-separated tables.
//!
use crate::config::HmmConfig;
use crate::error::Result;
use crate::hmm::ModelParameters;
use crate::observation::{ObservationSequence, ObservationStore};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::warn;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

///
/// Decoded visits of a patient
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatientTrajectory {
    pub patient: String,
    pub timepoints: Vec<i64>,
    /// observed features, one row per visit
    pub values: Vec<Vec<f64>>,
    pub states: Vec<usize>,
    pub labels: Vec<String>,
    /// `log P(x, path)` of the decoded path
    pub path_log_prob: f64,
    /// `log P(x)`
    pub log_likelihood: f64,
}

///
/// A patient that could not be decoded
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedPatient {
    pub patient: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub created_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub state_labels: Vec<String>,
    pub trajectories: Vec<PatientTrajectory>,
    pub skipped: Vec<SkippedPatient>,
    /// `[j][k]`: number of decoded `j -> k` moves over all patients
    pub transition_counts: Vec<Vec<usize>>,
}

fn trajectory(
    params: &ModelParameters,
    config: &HmmConfig,
    seq: &ObservationSequence,
) -> Result<PatientTrajectory> {
    let path = params.decode(seq)?;
    let log_likelihood = params.log_likelihood(seq)?;
    Ok(PatientTrajectory {
        patient: seq.id().to_string(),
        timepoints: seq.timepoints().iter().map(|t| t.index).collect(),
        values: seq.values().rows().into_iter().map(|r| r.to_vec()).collect(),
        states: path.indices(),
        labels: path.labels(config),
        path_log_prob: path.log_prob.to_log_value(),
        log_likelihood,
    })
}

///
/// `[j, k]`: number of adjacent `j -> k` pairs over the paths
///
pub fn count_transitions<'a, I>(paths: I, n_states: usize) -> Array2<usize>
where
    I: IntoIterator<Item = &'a [usize]>,
{
    let mut counts = Array2::<usize>::zeros((n_states, n_states));
    for path in paths {
        for (&j, &k) in path.iter().tuple_windows() {
            counts[[j, k]] += 1;
        }
    }
    counts
}

impl Report {
    ///
    /// Decode every patient of the store.
    ///
    /// A patient that fails (e.g. `InfeasiblePath` or a missing value) is
    /// recorded in `skipped` and the others are still reported.
    ///
    pub fn build(params: &ModelParameters, config: &HmmConfig, store: &ObservationStore) -> Report {
        let mut trajectories = Vec::new();
        let mut skipped = Vec::new();
        for seq in store.iter() {
            match trajectory(params, config, seq) {
                Ok(t) => trajectories.push(t),
                Err(e) => {
                    warn!("patient {} skipped: {}", seq.id(), e);
                    skipped.push(SkippedPatient {
                        patient: seq.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        let counts = count_transitions(
            trajectories.iter().map(|t| t.states.as_slice()),
            params.n_states(),
        );
        Report {
            created_at: Utc::now(),
            feature_names: store.feature_names().to_vec(),
            state_labels: (0..params.n_states()).map(|k| config.label(k)).collect(),
            trajectories,
            skipped,
            transition_counts: counts.rows().into_iter().map(|r| r.to_vec()).collect(),
        }
    }
    pub fn get(&self, patient: &str) -> Option<&PatientTrajectory> {
        self.trajectories.iter().find(|t| t.patient == patient)
    }
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_writer(std::io::BufWriter::new(file))
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Report> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for t in self.trajectories.iter() {
            writeln!(f, "Patient {} trajectory:", t.patient)?;
            writeln!(f, "timepoint\t{}\tstate", self.feature_names.join("\t"))?;
            for i in 0..t.states.len() {
                writeln!(
                    f,
                    "{}\t{}\t{}({})",
                    t.timepoints[i],
                    t.values[i].iter().join("\t"),
                    t.states[i],
                    t.labels[i]
                )?;
            }
            writeln!(f)?;
        }
        for s in self.skipped.iter() {
            writeln!(f, "Patient {} skipped: {}", s.patient, s.reason)?;
        }
        Ok(())
    }
}
