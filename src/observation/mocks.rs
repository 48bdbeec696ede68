//!
//! Mock glioblastoma dataset for tests and demos
//!
//! Three patients with five scans each. Features are the total tumor volume
//! and the contrast-enhancing volume (cm^3).
//!
//! * P1: stable / responding, around 22 cm^3
//! * P2: stable, then clear progression up to 70 cm^3
//! * P3: pseudoprogression-like, grows to 38 cm^3 and regresses
//!
use super::{ObservationStore, Record};

pub const MOCK_FEATURES: [&str; 2] = ["tumor_volume", "enhancing_volume"];

const MOCK_ROWS: [(&str, i64, f64, f64); 15] = [
    ("P1", 0, 22.0, 8.0),
    ("P1", 1, 23.0, 8.1),
    ("P1", 2, 21.5, 7.8),
    ("P1", 3, 22.3, 7.9),
    ("P1", 4, 21.8, 7.7),
    ("P2", 0, 28.0, 10.0),
    ("P2", 1, 30.0, 11.0),
    ("P2", 2, 40.0, 16.0),
    ("P2", 3, 55.0, 23.0),
    ("P2", 4, 70.0, 30.0),
    ("P3", 0, 24.0, 9.0),
    ("P3", 1, 32.0, 13.0),
    ("P3", 2, 38.0, 16.0),
    ("P3", 3, 30.0, 11.5),
    ("P3", 4, 27.0, 10.0),
];

///
/// Flat records of the mock dataset, in table order.
///
pub fn mock_gbm_records() -> Vec<Record> {
    MOCK_ROWS
        .iter()
        .map(|&(patient, timepoint, tumor, enhancing)| {
            Record::new(patient.to_string(), timepoint, vec![tumor, enhancing])
        })
        .collect()
}

///
/// The mock dataset grouped per patient.
///
pub fn mock_gbm_store() -> ObservationStore {
    let features = MOCK_FEATURES.iter().map(|s| s.to_string()).collect();
    ObservationStore::from_records(features, mock_gbm_records())
        .expect("mock rows are complete and unique")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_store_shape() {
        let store = mock_gbm_store();
        assert_eq!(store.n_sequences(), 3);
        assert_eq!(store.n_features(), 2);
        assert_eq!(store.n_observations(), 15);
        let ids: Vec<&str> = store.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["P1", "P2", "P3"]);
        assert_eq!(store.get("P2").unwrap().observation(4)[0], 70.0);
    }
}
