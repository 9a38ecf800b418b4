use thiserror::Error;

use crate::simulation::RoundPhase;

/// Failures reported by a card source while serving a draw.
#[derive(Debug, Error)]
pub enum CardSourceError {
    #[error("invalid card {0:?}")]
    InvalidCard(String),
    #[error("card source has no more cards")]
    Exhausted,
    #[error("delegate failed: {0}")]
    Delegate(String),
    #[error("no valid card after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{method} is only allowed in {expected:?} phase (current phase is {actual:?})")]
    WrongPhase {
        method: &'static str,
        expected: RoundPhase,
        actual: RoundPhase,
    },
    #[error("dealer upcard has not been dealt")]
    MissingUpcard,
    #[error("card source failed: {0}")]
    CardSource(#[from] CardSourceError),
}

#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("cannot normalize a frequency table whose total count is zero")]
    DegenerateInput,
    #[error("{table} frequency table is empty")]
    EmptyTable {
        table: &'static str,
        #[source]
        source: Box<ComparisonError>,
    },
    #[error("epsilon must be in (0, 1), got {0}")]
    InvalidEpsilon(f64),
}
