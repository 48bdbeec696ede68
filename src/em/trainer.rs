//!
//! Baum-Welch trainer
//!
//! * E-step: run forward/backward on every sequence and sum the expected counts
//! * M-step: re-estimate initial distribution, transitions and emissions
//! * iterate E/M-steps until the log-likelihood stops improving
//!
//! ```text
//! Initialized -> Iterating{1} -> Iterating{2} -> ... -> Converged
//!                                                   \-> MaxIterationsReached
//!            (numerical error in any step)          \-> Failed
//! ```
//!
//! One `step()` is one E-step plus, if training goes on, one M-step. The
//! parameters are swapped only after the M-step has built all of them, so
//! `params()` is always a valid model between steps.
//!
use super::validate_sequences;
use crate::config::HmmConfig;
use crate::error::{HmmError, Result};
use crate::hmm::{EStep, ModelParameters};
use crate::observation::ObservationSequence;
use crate::utils::timer;
use log::{debug, info, warn};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainerStatus {
    /// no step was taken yet
    Initialized,
    /// `iteration` M-steps were done
    Iterating { iteration: usize },
    /// improvement fell below `tol` after `iterations` M-steps
    Converged { iterations: usize },
    /// `max_iter` M-steps were done without converging
    MaxIterationsReached { iterations: usize },
    /// a step failed; the parameters are the last valid ones
    Failed,
}

impl TrainerStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TrainerStatus::Converged { .. }
                | TrainerStatus::MaxIterationsReached { .. }
                | TrainerStatus::Failed
        )
    }
}

///
/// Result of a training run
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: ModelParameters,
    /// total log-likelihood of `params` over the training sequences
    pub log_likelihood: f64,
    /// log-likelihood of each evaluated parameter set, in order
    pub history: Vec<f64>,
    /// number of M-steps
    pub iterations: usize,
    pub converged: bool,
    /// index of the restart this result came from
    pub restart: usize,
}

impl FitResult {
    ///
    /// Improvement of the log-likelihood in the last iteration
    ///
    pub fn last_improvement(&self) -> f64 {
        match self.history.as_slice() {
            [.., a, b] => b - a,
            _ => f64::NAN,
        }
    }
    ///
    /// Turn a non-converged result into `NotConverged`.
    ///
    pub fn ensure_converged(self) -> Result<FitResult> {
        if self.converged {
            Ok(self)
        } else {
            Err(HmmError::NotConverged {
                iterations: self.iterations,
                last_improvement: self.last_improvement(),
            })
        }
    }
}

///
/// Baum-Welch state machine over a fixed set of sequences
///
pub struct BaumWelch<'a> {
    config: &'a HmmConfig,
    seqs: &'a [ObservationSequence],
    params: ModelParameters,
    /// parameters before the last M-step
    previous: Option<ModelParameters>,
    status: TrainerStatus,
    history: Vec<f64>,
    iterations: usize,
}

impl<'a> BaumWelch<'a> {
    ///
    /// Check configuration, parameters and sequences, and set up the trainer.
    /// Nothing is computed yet.
    ///
    pub fn new(
        config: &'a HmmConfig,
        seqs: &'a [ObservationSequence],
        params: ModelParameters,
    ) -> Result<Self> {
        config.validate()?;
        params.validate()?;
        if params.n_states() != config.n_states {
            return Err(HmmError::InvalidConfig(format!(
                "model has {} states, configuration {}",
                params.n_states(),
                config.n_states
            )));
        }
        if params.kind() != config.emission_kind {
            return Err(HmmError::InvalidConfig(format!(
                "model has {:?} emissions, configuration {:?}",
                params.kind(),
                config.emission_kind
            )));
        }
        validate_sequences(seqs, params.n_features())?;
        Ok(BaumWelch {
            config,
            seqs,
            params,
            previous: None,
            status: TrainerStatus::Initialized,
            history: Vec::new(),
            iterations: 0,
        })
    }
    pub fn status(&self) -> TrainerStatus {
        self.status
    }
    pub fn params(&self) -> &ModelParameters {
        &self.params
    }
    pub fn history(&self) -> &[f64] {
        &self.history
    }
    /// number of M-steps done
    pub fn iterations(&self) -> usize {
        self.iterations
    }
    pub fn into_params(self) -> ModelParameters {
        self.params
    }
    ///
    /// Back to the parameters before the last M-step, the last ones whose
    /// log-likelihood is in the history.
    ///
    fn revert(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.params = previous;
        }
    }
    fn fail(&mut self, e: HmmError) -> Result<TrainerStatus> {
        warn!("baum-welch failed at iteration {}: {}", self.iterations, e);
        self.status = TrainerStatus::Failed;
        Err(e)
    }
    ///
    /// One E-step and, unless training is over, one M-step.
    ///
    /// Does nothing once the trainer is finished. On error the trainer is
    /// `Failed` and keeps the last parameters whose log-likelihood did not
    /// decrease.
    ///
    pub fn step(&mut self) -> Result<TrainerStatus> {
        if self.status.is_finished() {
            return Ok(self.status);
        }

        let (estep, t_e) = timer(|| self.params.expectations(self.seqs, self.config.parallel));
        let estep = match estep {
            Ok(estep) => estep,
            Err(e) => {
                self.revert();
                return self.fail(e);
            }
        };
        let ll = estep.log_likelihood();
        debug!("#{} ll={} ({}ms)", self.iterations, ll, t_e);

        if let Some(&prev) = self.history.last() {
            let allowed_drop = self.config.likelihood_drop_tol * prev.abs().max(1.0);
            if !ll.is_finite() || ll < prev - allowed_drop {
                self.revert();
                return self.fail(HmmError::NonMonotonicLikelihood {
                    iteration: self.iterations,
                    previous: prev,
                    current: ll,
                });
            }
            self.history.push(ll);
            if ll - prev < self.config.tol {
                info!(
                    "converged after {} iterations ll={} improvement={}",
                    self.iterations,
                    ll,
                    ll - prev
                );
                self.status = TrainerStatus::Converged {
                    iterations: self.iterations,
                };
                return Ok(self.status);
            }
        } else {
            self.history.push(ll);
        }

        if self.iterations >= self.config.max_iter {
            warn!("not converged after {} iterations ll={}", self.iterations, ll);
            self.status = TrainerStatus::MaxIterationsReached {
                iterations: self.iterations,
            };
            return Ok(self.status);
        }

        let next = match self.m_step(&estep) {
            Ok(next) => next,
            Err(e) => return self.fail(e),
        };
        self.previous = Some(std::mem::replace(&mut self.params, next));
        self.iterations += 1;
        self.status = TrainerStatus::Iterating {
            iteration: self.iterations,
        };
        Ok(self.status)
    }
    ///
    /// New parameters from the expected counts of an E-step.
    ///
    fn m_step(&self, estep: &EStep) -> Result<ModelParameters> {
        let freqs = &estep.freqs;
        let initial = self.params.initial.reestimate(&freqs.init)?;
        let transition = self.params.transition.reestimate(&freqs.trans)?;
        let data: Vec<(ArrayView2<f64>, ArrayView2<f64>)> = self
            .seqs
            .iter()
            .zip(estep.gammas.iter())
            .map(|(seq, gamma)| (seq.values(), gamma.view()))
            .collect();
        let emissions = self.params.emissions.reestimate(
            &data,
            self.config.min_covar,
            self.config.min_state_weight,
        )?;
        debug!("occupancy={}", freqs.occupancy);
        ModelParameters::new(initial, transition, emissions)
    }
    ///
    /// Step until the trainer is finished.
    ///
    pub fn run(&mut self) -> Result<FitResult> {
        while !self.status.is_finished() {
            self.step()?;
        }
        Ok(self.result())
    }
    ///
    /// Snapshot of the current parameters and history
    ///
    pub fn result(&self) -> FitResult {
        FitResult {
            params: self.params.clone(),
            log_likelihood: self.history.last().copied().unwrap_or(f64::NEG_INFINITY),
            history: self.history.clone(),
            iterations: self.iterations,
            converged: matches!(self.status, TrainerStatus::Converged { .. }),
            restart: 0,
        }
    }
}
