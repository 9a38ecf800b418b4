pub mod comparison;
pub mod error;
pub mod simulation;
pub mod statistics;
pub mod strategy;

pub use error::{CardSourceError, ComparisonError, SimulationError};
pub use simulation::Card;
pub use statistics::{Batch, BatchReport, FrequencyTable, Metrics, WinRecord};

/// The best possible hand value. Anything above it is a bust.
pub const BLACKJACK: u16 = 21;

/// The value at which the dealer stops drawing (unless the 17 is soft and the rule says hit).
pub const DEALER_STAND_VALUE: u16 = 17;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub dealer_hit_on_soft17: bool,
}

impl Default for Rule {
    fn default() -> Self {
        Rule {
            dealer_hit_on_soft17: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Hit,
    Stand,
}
