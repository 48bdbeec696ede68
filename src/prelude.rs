//!
//! globally-available parts
//!
pub use crate::common::{st, Freq, State};
pub use crate::config::{EmissionKind, HmmConfig, InitMethod};
pub use crate::em::{fit, fit_store, BaumWelch, FitResult, TrainerStatus};
pub use crate::error::{HmmError, Result};
pub use crate::hmm::{
    DecodedPath, Emissions, InitialDistribution, ModelParameters, TransitionMatrix,
};
pub use crate::observation::{ObservationSequence, ObservationStore, Record};
pub use crate::prob::Prob;
