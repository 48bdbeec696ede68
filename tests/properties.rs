//! Property-based tests of the engine over random parameters and sequences.

use gbmhmm::config::{EmissionKind, HmmConfig, InitMethod};
use gbmhmm::em::{initialize, BaumWelch};
use gbmhmm::hmm::mocks::{mock_three_state_1d_with_var, mock_two_state_2d_full};
use gbmhmm::hmm::{InitialDistribution, TransitionMatrix};
use gbmhmm::observation::ObservationSequence;
use ndarray::{Array1, Array2, Axis};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Tolerance of row sums.
const ROW_TOL: f64 = 1e-9;

fn synthetic(seed: u64, n: usize, len: usize, var: f64) -> Vec<ObservationSequence> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    mock_three_state_1d_with_var(var)
        .sample_sequences(n, len, &mut rng)
        .unwrap()
        .into_iter()
        .map(|(_, s)| s)
        .collect()
}

fn counts(k: usize) -> impl Strategy<Value = Vec<f64>> {
    // zero entries are frequent so that whole rows can be empty
    prop::collection::vec(prop_oneof![Just(0.0), 0.0..50.0f64], k * k)
}

fn count_matrix() -> impl Strategy<Value = Array2<f64>> {
    (1usize..5).prop_flat_map(|k| {
        counts(k).prop_map(move |flat| Array2::from_shape_vec((k, k), flat).unwrap())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every row of a reestimated transition matrix sums to 1.
    #[test]
    fn reestimated_rows_sum_to_one(c in count_matrix()) {
        let k = c.nrows();
        let a = TransitionMatrix::uniform(k).reestimate(&c).unwrap();
        for row in a.as_array().rows() {
            prop_assert!((row.sum() - 1.0).abs() < ROW_TOL, "row {} sums to {}", row, row.sum());
        }
        let pi = InitialDistribution::uniform(k).reestimate(&c.sum_axis(Axis(0))).unwrap();
        prop_assert!((pi.as_array().sum() - 1.0).abs() < ROW_TOL);
    }

    /// Row sums also hold for arbitrary count matrices.
    #[test]
    fn reestimated_rows_of_random_counts(flat in counts(3)) {
        let c = Array2::from_shape_vec((3, 3), flat).unwrap();
        let a = TransitionMatrix::sticky(3, 0.9).unwrap().reestimate(&c).unwrap();
        for (i, row) in a.as_array().rows().into_iter().enumerate() {
            prop_assert!((row.sum() - 1.0).abs() < ROW_TOL);
            if c.row(i).sum() == 0.0 {
                // no evidence: the previous row is kept
                prop_assert!((row[i] - 0.9).abs() < 1e-12);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Total log-likelihood never decreases across Baum-Welch iterations.
    #[test]
    fn baum_welch_is_monotone(
        data_seed in any::<u64>(),
        init_seed in any::<u64>(),
        k in 2usize..4,
        var in 0.2..4.0f64,
        random_init in any::<bool>(),
    ) {
        let seqs = synthetic(data_seed, 4, 20, var);
        let method = if random_init { InitMethod::Random } else { InitMethod::KMeans };
        let config = HmmConfig::new(k, EmissionKind::Diagonal)
            .with_init_method(method)
            .with_max_iter(30);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(init_seed);
        let start = initialize(&config, &seqs, &mut rng).unwrap();
        let result = BaumWelch::new(&config, &seqs, start).unwrap().run().unwrap();
        for w in result.history.windows(2) {
            prop_assert!(
                w[1] >= w[0] - 1e-6 * w[0].abs().max(1.0),
                "log-likelihood decreased from {} to {}", w[0], w[1]
            );
        }
    }

    /// Posterior state occupancy sums to 1 at every timepoint.
    #[test]
    fn gamma_rows_sum_to_one(seed in any::<u64>(), len in 1usize..60) {
        let params = mock_two_state_2d_full();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let seq = params.sample(len, &mut rng).unwrap().to_sequence("s");
        let o = params.run(&seq).unwrap();
        let gamma = o.gamma();
        prop_assert_eq!(gamma.nrows(), len);
        for row in gamma.rows() {
            prop_assert!((row.sum() - 1.0).abs() < 1e-9);
            prop_assert!(row.iter().all(|&g| (0.0..=1.0 + 1e-12).contains(&g)));
        }
        for t in 0..len.saturating_sub(1) {
            let xi = o.xi(t).unwrap();
            prop_assert!((xi.sum() - 1.0).abs() < 1e-9);
            // marginal of xi over the next state is gamma
            let marginal: Array1<f64> = xi.sum_axis(Axis(1));
            for j in 0..2 {
                prop_assert!((marginal[j] - gamma[[t, j]]).abs() < 1e-9);
            }
        }
    }

    /// The best path never has more probability than the whole sequence.
    #[test]
    fn viterbi_is_bounded_by_likelihood(seed in any::<u64>(), len in 1usize..60) {
        let params = mock_three_state_1d_with_var(1.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let seq = params.sample(len, &mut rng).unwrap().to_sequence("s");
        let path = params.decode(&seq).unwrap();
        let ll = params.log_likelihood(&seq).unwrap();
        prop_assert_eq!(path.len(), len);
        prop_assert!(path.log_prob.to_log_value() <= ll + 1e-9);
    }
}
