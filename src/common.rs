//!
//! Common definitions shared by the observation store and the HMM engine
//!
use serde::{Deserialize, Serialize};

///
/// Expected count (sum of posterior probabilities)
///
pub type Freq = f64;

///
/// Index of a hidden state.
///
/// States carry no payload; human-readable labels are kept in
/// `HmmConfig::state_labels`.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct State(pub usize);

impl State {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// short-hand of `State`
pub fn st(i: usize) -> State {
    State(i)
}

///
/// Default labels of states.
///
/// `Stable/Indeterminate/Progression` for the three-state model,
/// `state0, state1, ...` otherwise.
///
pub fn default_state_labels(n_states: usize) -> Vec<String> {
    if n_states == 3 {
        vec![
            "Stable".to_string(),
            "Indeterminate".to_string(),
            "Progression".to_string(),
        ]
    } else {
        (0..n_states).map(|i| format!("state{}", i)).collect()
    }
}
