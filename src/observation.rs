//!
//! Observation store
//!
//! Per-patient longitudinal feature sequences, as handed over by the
//! (external) imaging/radiomics preprocessing.
//!
//! * `ObservationSequence`: one patient, `T x D` values ordered by visit
//! * `ObservationStore`: all patients with the names of the `D` features
//! * `MissingPolicy`: what to do with missing (`NaN`) entries
//!
pub mod mocks;

use crate::error::{HmmError, Result};
use chrono::NaiveDate;
use derive_new::new;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// A clinical visit. Only kept for traceability; the model is discrete-time
/// and looks at the order of visits, not at their spacing.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Timepoint {
    /// ordinal of the visit (e.g. 0 = baseline scan)
    pub index: i64,
    #[new(default)]
    pub label: Option<String>,
    #[new(default)]
    pub date: Option<NaiveDate>,
}

///
/// Feature vectors of a patient ordered by time.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationSequence {
    id: String,
    timepoints: Vec<Timepoint>,
    values: Array2<f64>,
}

impl ObservationSequence {
    ///
    /// Create a sequence from visits and a `T x D` matrix.
    ///
    pub fn new(id: &str, timepoints: Vec<Timepoint>, values: Array2<f64>) -> Result<Self> {
        if timepoints.len() != values.nrows() {
            return Err(HmmError::InvalidParameters(format!(
                "sequence `{}` has {} timepoints but {} rows",
                id,
                timepoints.len(),
                values.nrows()
            )));
        }
        Ok(ObservationSequence {
            id: id.to_string(),
            timepoints,
            values,
        })
    }
    ///
    /// Create a sequence whose visits are numbered `0, 1, ...`
    ///
    pub fn from_values(id: &str, values: Array2<f64>) -> Self {
        let timepoints = (0..values.nrows() as i64).map(Timepoint::new).collect();
        ObservationSequence {
            id: id.to_string(),
            timepoints,
            values,
        }
    }
    ///
    /// One-dimensional sequence from a slice of scalars
    ///
    pub fn from_scalars(id: &str, xs: &[f64]) -> Self {
        let values = Array1::from(xs.to_vec()).insert_axis(Axis(1));
        ObservationSequence::from_values(id, values)
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn timepoints(&self) -> &[Timepoint] {
        &self.timepoints
    }
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }
    pub fn observation(&self, t: usize) -> ArrayView1<'_, f64> {
        self.values.row(t)
    }
    /// Number of timepoints `T`
    pub fn len(&self) -> usize {
        self.values.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Number of features `D`
    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }
    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|x| x.is_nan())
    }
    ///
    /// Check that the sequence can be fed to the engine:
    /// non-empty, `D` features, no missing or infinite entries.
    ///
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.is_empty() {
            return Err(HmmError::EmptySequence {
                patient: self.id.clone(),
            });
        }
        if self.n_features() != n_features {
            return Err(HmmError::DimensionMismatch {
                patient: self.id.clone(),
                timepoint: 0,
                expected: n_features,
                got: self.n_features(),
            });
        }
        for ((t, d), x) in self.values.indexed_iter() {
            if !x.is_finite() {
                return Err(HmmError::MissingValue {
                    patient: self.id.clone(),
                    timepoint: t,
                    feature: d,
                });
            }
        }
        Ok(())
    }
}

///
/// A flat row of a longitudinal table
/// (`patient_id, timepoint, feature_1, ..., feature_D`).
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, new)]
pub struct Record {
    pub patient: String,
    pub timepoint: i64,
    pub values: Vec<f64>,
}

///
/// Missing value policy, applied before the sequences reach the engine.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// fail with `MissingValue`
    Reject,
    /// drop every timepoint that has a missing feature
    DropTimepoint,
    /// last observation carried forward; leading gaps take the first
    /// observed value of the patient
    CarryForward,
    /// mean of the feature over the patient's visits, or over the whole
    /// store if the patient never has it
    FeatureMean,
}

///
/// All patients' sequences sharing the same feature set.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservationStore {
    feature_names: Vec<String>,
    sequences: Vec<ObservationSequence>,
}

impl ObservationStore {
    pub fn new(feature_names: Vec<String>, sequences: Vec<ObservationSequence>) -> Result<Self> {
        let d = feature_names.len();
        for seq in sequences.iter() {
            if seq.n_features() != d {
                return Err(HmmError::DimensionMismatch {
                    patient: seq.id().to_string(),
                    timepoint: 0,
                    expected: d,
                    got: seq.n_features(),
                });
            }
        }
        Ok(ObservationStore {
            feature_names,
            sequences,
        })
    }
    ///
    /// Group flat records into per-patient sequences.
    ///
    /// Patients are ordered by id and each patient's visits by timepoint.
    ///
    pub fn from_records<I>(feature_names: Vec<String>, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let d = feature_names.len();
        let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for record in records {
            if record.values.len() != d {
                let timepoint = groups.get(&record.patient).map_or(0, |g| g.len());
                return Err(HmmError::DimensionMismatch {
                    patient: record.patient,
                    timepoint,
                    expected: d,
                    got: record.values.len(),
                });
            }
            groups.entry(record.patient.clone()).or_default().push(record);
        }

        let mut sequences = Vec::with_capacity(groups.len());
        for (patient, mut rows) in groups {
            rows.sort_by_key(|r| r.timepoint);
            if let Some(w) = rows.windows(2).find(|w| w[0].timepoint == w[1].timepoint) {
                return Err(HmmError::DuplicateTimepoint {
                    patient,
                    timepoint: w[0].timepoint,
                });
            }
            let t = rows.len();
            let flat: Vec<f64> = rows.iter().flat_map(|r| r.values.iter().copied()).collect();
            let values = Array2::from_shape_vec((t, d), flat)
                .map_err(|e| HmmError::InvalidParameters(e.to_string()))?;
            let timepoints = rows.iter().map(|r| Timepoint::new(r.timepoint)).collect();
            sequences.push(ObservationSequence::new(&patient, timepoints, values)?);
        }
        ObservationStore::new(feature_names, sequences)
    }
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
    pub fn n_sequences(&self) -> usize {
        self.sequences.len()
    }
    /// Total number of timepoints over all patients
    pub fn n_observations(&self) -> usize {
        self.sequences.iter().map(|s| s.len()).sum()
    }
    pub fn sequences(&self) -> &[ObservationSequence] {
        &self.sequences
    }
    pub fn get(&self, id: &str) -> Option<&ObservationSequence> {
        self.sequences.iter().find(|s| s.id() == id)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, ObservationSequence> {
        self.sequences.iter()
    }
    ///
    /// Mean of each feature over all non-missing entries of the store
    ///
    pub fn feature_means(&self) -> Array1<f64> {
        let d = self.n_features();
        let mut sum = Array1::<f64>::zeros(d);
        let mut count = vec![0usize; d];
        for seq in self.sequences.iter() {
            for row in seq.values().rows() {
                for (j, &x) in row.iter().enumerate() {
                    if !x.is_nan() {
                        sum[j] += x;
                        count[j] += 1;
                    }
                }
            }
        }
        for j in 0..d {
            sum[j] = if count[j] > 0 {
                sum[j] / count[j] as f64
            } else {
                f64::NAN
            };
        }
        sum
    }
    ///
    /// Resolve missing entries according to `policy` and return a store
    /// without `NaN`s (or an error).
    ///
    pub fn apply_missing_policy(&self, policy: MissingPolicy) -> Result<ObservationStore> {
        let global_means = self.feature_means();
        let sequences = self
            .sequences
            .iter()
            .map(|seq| impute(seq, policy, &global_means))
            .collect::<Result<Vec<_>>>()?;
        ObservationStore::new(self.feature_names.clone(), sequences)
    }
}

impl<'a> IntoIterator for &'a ObservationStore {
    type Item = &'a ObservationSequence;
    type IntoIter = std::slice::Iter<'a, ObservationSequence>;
    fn into_iter(self) -> Self::IntoIter {
        self.sequences.iter()
    }
}

fn first_missing(seq: &ObservationSequence) -> Option<(usize, usize)> {
    seq.values
        .indexed_iter()
        .find(|(_, x)| x.is_nan())
        .map(|((t, d), _)| (t, d))
}

fn impute(
    seq: &ObservationSequence,
    policy: MissingPolicy,
    global_means: &Array1<f64>,
) -> Result<ObservationSequence> {
    let missing = |(timepoint, feature): (usize, usize)| HmmError::MissingValue {
        patient: seq.id.clone(),
        timepoint,
        feature,
    };
    match policy {
        MissingPolicy::Reject => match first_missing(seq) {
            Some(pos) => Err(missing(pos)),
            None => Ok(seq.clone()),
        },
        MissingPolicy::DropTimepoint => {
            let keep: Vec<usize> = seq
                .values
                .rows()
                .into_iter()
                .enumerate()
                .filter(|(_, row)| row.iter().all(|x| !x.is_nan()))
                .map(|(t, _)| t)
                .collect();
            let values = seq.values.select(Axis(0), &keep);
            let timepoints = keep.iter().map(|&t| seq.timepoints[t].clone()).collect();
            ObservationSequence::new(&seq.id, timepoints, values)
        }
        MissingPolicy::CarryForward => {
            let mut values = seq.values.clone();
            for (d, mut column) in values.columns_mut().into_iter().enumerate() {
                let first = match column.iter().copied().find(|x| !x.is_nan()) {
                    Some(x) => x,
                    None if column.is_empty() => continue,
                    None => return Err(missing((0, d))),
                };
                let mut last = first;
                for x in column.iter_mut() {
                    if x.is_nan() {
                        *x = last;
                    } else {
                        last = *x;
                    }
                }
            }
            ObservationSequence::new(&seq.id, seq.timepoints.clone(), values)
        }
        MissingPolicy::FeatureMean => {
            let mut values = seq.values.clone();
            for (d, mut column) in values.columns_mut().into_iter().enumerate() {
                let observed: Vec<f64> = column.iter().copied().filter(|x| !x.is_nan()).collect();
                let fill = if observed.is_empty() {
                    global_means[d]
                } else {
                    observed.iter().sum::<f64>() / observed.len() as f64
                };
                if fill.is_nan() && column.iter().any(|x| x.is_nan()) {
                    return Err(missing((0, d)));
                }
                column.mapv_inplace(|x| if x.is_nan() { fill } else { x });
            }
            ObservationSequence::new(&seq.id, seq.timepoints.clone(), values)
        }
    }
}
