//!
//! test of hmm
//!
#[macro_use]
extern crate approx;

use gbmhmm::common::st;
use gbmhmm::config::{EmissionKind, HmmConfig};
use gbmhmm::em::{fit, fit_store, BaumWelch, TrainerStatus};
use gbmhmm::error::HmmError;
use gbmhmm::hmm::mocks::{
    mock_gbm_params, mock_three_state_1d, mock_three_state_1d_with_var, mock_two_state_2d_full,
};
use gbmhmm::hmm::ModelParameters;
use gbmhmm::observation::mocks::mock_gbm_store;
use gbmhmm::observation::ObservationSequence;
use gbmhmm::report::Report;
use ndarray::{array, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

#[test]
fn well_separated_states_are_decoded() {
    let params = mock_three_state_1d();
    let seq = ObservationSequence::from_scalars("a", &[0.1, 0.2, 4.9, 5.1, 10.0]);
    let path = params.decode(&seq).unwrap();
    assert_eq!(path.indices(), vec![0, 0, 1, 1, 2]);
    assert!(path.log_prob.to_log_value() <= params.log_likelihood(&seq).unwrap());
}

#[test]
fn empty_sequence_is_rejected_by_trainer() {
    let config = HmmConfig::new(3, EmissionKind::Diagonal);
    let params = mock_three_state_1d();
    let seqs = vec![
        ObservationSequence::from_scalars("a", &[0.0, 5.0]),
        ObservationSequence::from_scalars("b", &[]),
    ];
    let r = BaumWelch::new(&config, &seqs, params.clone());
    assert!(matches!(r, Err(HmmError::EmptySequence { patient }) if patient == "b"));
    assert_eq!(params, mock_three_state_1d());
}

#[test]
fn wrong_dimension_leaves_parameters_unchanged() {
    let config = HmmConfig::new(3, EmissionKind::Diagonal);
    let seqs = vec![ObservationSequence::from_values(
        "a",
        array![[0.0, 1.0], [5.0, 1.0]],
    )];
    let r = BaumWelch::new(&config, &seqs, mock_three_state_1d());
    assert!(matches!(
        r,
        Err(HmmError::DimensionMismatch {
            expected: 1,
            got: 2,
            ..
        })
    ));
    let params = mock_three_state_1d();
    assert!(matches!(
        params.decode(&seqs[0]),
        Err(HmmError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        params.expectations(&seqs, false),
        Err(HmmError::DimensionMismatch { .. })
    ));
    assert_eq!(params, mock_three_state_1d());
}

#[test]
fn zero_density_at_one_timepoint_is_infeasible() {
    let params = mock_three_state_1d();
    let seq = ObservationSequence::from_scalars("a", &[0.0, 5.0, 10.0, 10.0]);
    let mut table = params.emission_table(&seq).unwrap();
    table.set_row(2, Array2::from_elem((1, 3), f64::NEG_INFINITY).row(0));
    assert!(matches!(
        params.decode_table(&table),
        Err(HmmError::InfeasiblePath { timepoint: 2 })
    ));
    assert!(matches!(
        params.run_table(&table),
        Err(HmmError::InfeasiblePath { timepoint: 2 })
    ));
}

#[test]
fn exact_recovery_with_tiny_variance() {
    let params = mock_three_state_1d_with_var(1e-4);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    for _ in 0..5 {
        let sample = params.sample(50, &mut rng).unwrap();
        let path = params.decode(&sample.to_sequence("s")).unwrap();
        assert_eq!(path.states, sample.states);
    }
}

#[test]
fn recovery_above_chance_with_low_noise() {
    let params = mock_three_state_1d_with_var(1.0);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
    let sample = params.sample(500, &mut rng).unwrap();
    let path = params.decode(&sample.to_sequence("s")).unwrap();
    let accuracy = path.accuracy(&sample.states).unwrap();
    println!("accuracy={}", accuracy);
    assert!(accuracy > 0.8);
}

#[test]
fn fitted_model_recovers_generating_paths() {
    let truth = mock_three_state_1d();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
    let samples = truth.sample_sequences(10, 40, &mut rng).unwrap();
    let seqs: Vec<ObservationSequence> = samples.iter().map(|(_, s)| s.clone()).collect();
    let config = HmmConfig::new(3, EmissionKind::Diagonal).with_restarts(3);
    let result = fit(&config, &seqs).unwrap();
    println!("{}", result.params);
    for k in 0..3 {
        assert_abs_diff_eq!(
            result.params.emissions.mean(k)[0],
            truth.emissions.mean(k)[0],
            epsilon = 0.3
        );
    }
    let (sample, seq) = &samples[0];
    let path = result.params.decode(seq).unwrap();
    assert!(path.accuracy(&sample.states).unwrap() > 0.9);
}

#[test]
fn trainer_can_be_stepped() {
    let truth = mock_two_state_2d_full();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
    let seqs: Vec<ObservationSequence> = truth
        .sample_sequences(5, 30, &mut rng)
        .unwrap()
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    let config = HmmConfig::new(2, EmissionKind::Full).with_max_iter(3);
    let mut trainer = BaumWelch::new(&config, &seqs, truth.clone()).unwrap();
    assert_eq!(trainer.status(), TrainerStatus::Initialized);
    let mut n_steps = 0;
    while !trainer.status().is_finished() {
        trainer.step().unwrap();
        n_steps += 1;
        // every intermediate snapshot is usable
        assert!(trainer.params().validate().is_ok());
    }
    assert!(n_steps <= 4);
    let result = trainer.result();
    assert_eq!(result.history.len(), result.iterations + 1);
    for w in result.history.windows(2) {
        assert!(w[1] >= w[0] - 1e-6 * w[0].abs().max(1.0));
    }
}

#[test]
fn mock_gbm_fit_and_report() {
    let store = mock_gbm_store();
    let config = HmmConfig::default();
    let result = fit_store(&config, &store).unwrap();
    assert_eq!(result.params.n_features(), 2);
    let report = Report::build(&result.params, &config, &store);
    print!("{}", report);
    assert_eq!(report.trajectories.len() + report.skipped.len(), 3);
    for t in report.trajectories.iter() {
        assert_eq!(t.states.len(), 5);
        assert!(t.log_likelihood >= t.path_log_prob);
    }
}

#[test]
fn parameters_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let probes = [
        array![0.0, 0.0],
        array![22.0, 8.0],
        array![35.0, 12.0],
        array![70.0, 30.0],
    ];
    for params in [mock_gbm_params(), mock_two_state_2d_full()] {
        let path = dir.path().join("params.json");
        params.to_file(&path).unwrap();
        let back = ModelParameters::from_file(&path).unwrap();
        assert_eq!(params, back);
        for j in 0..params.n_states() {
            assert_eq!(
                params.initial.probability(st(j)),
                back.initial.probability(st(j))
            );
            for k in 0..params.n_states() {
                assert_eq!(
                    params.transition.probability(st(j), st(k)),
                    back.transition.probability(st(j), st(k))
                );
            }
            for x in probes.iter() {
                assert_eq!(
                    params.emissions.density(j, x.view()),
                    back.emissions.density(j, x.view())
                );
            }
        }
    }
}

#[test]
fn missing_values_are_rejected_before_training() {
    let seqs = vec![ObservationSequence::from_scalars("a", &[1.0, f64::NAN])];
    let config = HmmConfig::new(2, EmissionKind::Diagonal).with_restarts(2);
    assert!(matches!(
        fit(&config, &seqs),
        Err(HmmError::MissingValue { timepoint: 1, .. })
    ));
}
