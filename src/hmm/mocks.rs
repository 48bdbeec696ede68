//!
//! Mock ModelParameters for testing
//!
use super::emission::Emissions;
use super::params::ModelParameters;
use super::trans_table::{InitialDistribution, TransitionMatrix};
use ndarray::{array, Array2};

///
/// Three well separated 1-dimensional states
///
/// ```text
/// means      0, 5, 10
/// variance   0.25
/// self-loop  0.8
/// ```
///
pub fn mock_three_state_1d() -> ModelParameters {
    mock_three_state_1d_with_var(0.25)
}

///
/// `mock_three_state_1d` with another emission variance
///
pub fn mock_three_state_1d_with_var(var: f64) -> ModelParameters {
    let emissions = Emissions::diagonal(
        &array![[0.0], [5.0], [10.0]],
        &Array2::from_elem((3, 1), var),
        1e-12,
    )
    .unwrap();
    ModelParameters::new(
        InitialDistribution::uniform(3),
        TransitionMatrix::sticky(3, 0.8).unwrap(),
        emissions,
    )
    .unwrap()
}

///
/// Two correlated 2-dimensional states
///
pub fn mock_two_state_2d_full() -> ModelParameters {
    let emissions = Emissions::full(
        &array![[0.0, 0.0], [3.0, -1.0]],
        &[
            array![[1.0, 0.6], [0.6, 1.0]],
            array![[0.5, -0.2], [-0.2, 0.8]],
        ],
        1e-6,
    )
    .unwrap();
    ModelParameters::new(
        InitialDistribution::new(array![0.6, 0.4]).unwrap(),
        TransitionMatrix::new(array![[0.9, 0.1], [0.2, 0.8]]).unwrap(),
        emissions,
    )
    .unwrap()
}

///
/// Stable / Indeterminate / Progression model on
/// `(tumor_volume, enhancing_volume)`, roughly what a fit of the mock
/// glioblastoma dataset looks like.
///
pub fn mock_gbm_params() -> ModelParameters {
    let emissions = Emissions::full(
        &array![[22.0, 8.0], [31.0, 11.5], [58.0, 24.0]],
        &[
            array![[1.0, 0.3], [0.3, 0.2]],
            array![[20.0, 8.0], [8.0, 5.0]],
            array![[150.0, 70.0], [70.0, 40.0]],
        ],
        1e-6,
    )
    .unwrap();
    ModelParameters::new(
        InitialDistribution::new(array![0.6, 0.3, 0.1]).unwrap(),
        TransitionMatrix::new(array![[0.8, 0.15, 0.05], [0.2, 0.6, 0.2], [0.05, 0.15, 0.8]])
            .unwrap(),
        emissions,
    )
    .unwrap()
}
