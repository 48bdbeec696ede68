//!
//! Parameter estimation by Baum-Welch with restarts
//!
//! * `init`: starting parameters of a restart
//! * `trainer`: the Baum-Welch state machine
//! * `fit`: run `n_restarts` restarts and keep the best
//!
pub mod init;
pub mod trainer;

pub use init::initialize;
pub use trainer::{BaumWelch, FitResult, TrainerStatus};

use crate::config::HmmConfig;
use crate::error::{HmmError, Result};
use crate::hmm::ModelParameters;
use crate::observation::{ObservationSequence, ObservationStore};
use crate::utils::timer;
use log::{info, warn};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

///
/// Check that the sequences can be trained on: at least one sequence, all
/// non-empty with `n_features >= 1` features and no missing values.
///
pub fn validate_sequences(seqs: &[ObservationSequence], n_features: usize) -> Result<()> {
    if seqs.is_empty() {
        return Err(HmmError::NoSequences);
    }
    if n_features == 0 {
        return Err(HmmError::InvalidConfig(
            "observations need at least one feature".to_string(),
        ));
    }
    for seq in seqs {
        seq.validate(n_features)?;
    }
    Ok(())
}

///
/// Fit a model with `config.n_restarts` restarts.
///
/// Restart `r` draws its starting parameters with seed `config.seed + r`.
/// The result with the highest final log-likelihood is returned (the earliest
/// restart on ties). A restart failing with a numerical error is skipped; if
/// all restarts fail, the last error is returned. Input errors are returned
/// right away.
///
pub fn fit(config: &HmmConfig, seqs: &[ObservationSequence]) -> Result<FitResult> {
    config.validate()?;
    let n_features = seqs.first().ok_or(HmmError::NoSequences)?.n_features();
    validate_sequences(seqs, n_features)?;

    let mut best: Option<FitResult> = None;
    let mut last_error: Option<HmmError> = None;

    for restart in 0..config.n_restarts {
        let seed = config.seed.wrapping_add(restart as u64);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let (result, t) = timer(|| -> Result<FitResult> {
            let start = initialize(config, seqs, &mut rng)?;
            BaumWelch::new(config, seqs, start)?.run()
        });
        match result {
            Ok(mut result) => {
                result.restart = restart;
                info!(
                    "restart #{} seed={} ll={} iterations={} converged={} ({}ms)",
                    restart, seed, result.log_likelihood, result.iterations, result.converged, t
                );
                let is_better = best
                    .as_ref()
                    .map_or(true, |b| result.log_likelihood > b.log_likelihood);
                if is_better {
                    best = Some(result);
                }
            }
            Err(e) if e.is_input_error() => return Err(e),
            Err(e) => {
                warn!("restart #{} seed={} failed: {}", restart, seed, e);
                last_error = Some(e);
            }
        }
    }

    match (best, last_error) {
        (Some(best), _) => {
            info!("best restart #{} ll={}", best.restart, best.log_likelihood);
            Ok(best)
        }
        (None, Some(e)) => Err(e),
        (None, None) => Err(HmmError::InvalidConfig(
            "n_restarts must be at least 1".to_string(),
        )),
    }
}

///
/// `fit` on all sequences of a store
///
pub fn fit_store(config: &HmmConfig, store: &ObservationStore) -> Result<FitResult> {
    fit(config, store.sequences())
}

///
/// A single Baum-Welch run from caller-supplied parameters
///
pub fn fit_from(
    config: &HmmConfig,
    seqs: &[ObservationSequence],
    params: ModelParameters,
) -> Result<FitResult> {
    BaumWelch::new(config, seqs, params)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmissionKind;
    use crate::hmm::mocks::mock_three_state_1d;
    use crate::observation::mocks::mock_gbm_store;
    use ndarray::Array2;

    fn synthetic(seed: u64) -> Vec<ObservationSequence> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        mock_three_state_1d()
            .sample_sequences(8, 25, &mut rng)
            .unwrap()
            .into_iter()
            .map(|(_, s)| s)
            .collect()
    }

    #[test]
    fn fit_is_reproducible() {
        let seqs = synthetic(2);
        let config = HmmConfig::new(3, EmissionKind::Diagonal).with_restarts(3);
        let a = fit(&config, &seqs).unwrap();
        let b = fit(&config, &seqs).unwrap();
        assert_eq!(a, b);
        assert!(a.restart < 3);
        let p = fit(&config.clone().with_parallel(true), &seqs).unwrap();
        assert_eq!(a, p);
    }
    #[test]
    fn best_restart_wins() {
        let seqs = synthetic(4);
        let config = HmmConfig::new(3, EmissionKind::Diagonal)
            .with_restarts(4)
            .with_init_method(crate::config::InitMethod::Random);
        let best = fit(&config, &seqs).unwrap();
        for r in 0..4 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed + r as u64);
            let start = initialize(&config, &seqs, &mut rng).unwrap();
            if let Ok(single) = fit_from(&config, &seqs, start) {
                assert!(single.log_likelihood <= best.log_likelihood);
            }
        }
    }
    #[test]
    fn input_errors_are_returned() {
        let config = HmmConfig::default();
        assert!(matches!(fit(&config, &[]), Err(HmmError::NoSequences)));
        let store = mock_gbm_store();
        let config = HmmConfig::default().with_tol(-1.0);
        assert!(matches!(
            fit_store(&config, &store),
            Err(HmmError::InvalidConfig(_))
        ));
    }
    #[test]
    fn featureless_sequences_are_rejected() {
        let seqs = vec![ObservationSequence::from_values("a", Array2::zeros((3, 0)))];
        let config = HmmConfig::new(2, EmissionKind::Diagonal).with_restarts(1);
        assert!(matches!(fit(&config, &seqs), Err(HmmError::InvalidConfig(_))));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        assert!(matches!(
            initialize(&config, &seqs, &mut rng),
            Err(HmmError::InvalidConfig(_))
        ));
    }
    #[test]
    fn fit_mock_gbm() {
        let store = mock_gbm_store();
        let config = HmmConfig::default();
        let result = fit_store(&config, &store).unwrap();
        assert_eq!(result.params.n_states(), 3);
        assert!(result.log_likelihood.is_finite());
        for w in result.history.windows(2) {
            assert!(w[1] >= w[0] - 1e-6 * w[0].abs().max(1.0));
        }
        for seq in store.iter() {
            let path = result.params.decode(seq).unwrap();
            assert_eq!(path.len(), seq.len());
        }
    }
}
