use serde::{Deserialize, Serialize};

use crate::BLACKJACK;

use super::{hand::Hand, Card};

/// Which accumulator bucket a round counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    Player,
    Dealer,
    Tie,
}

/// The five ways a round can end. Checked in declaration order, so a player bust wins for the
/// dealer even if the dealer would also have busted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    PlayerBusted,
    DealerBusted,
    PlayerHigher,
    DealerHigher,
    Push,
}

impl Verdict {
    pub fn winner(&self) -> Winner {
        match self {
            Verdict::PlayerBusted | Verdict::DealerHigher => Winner::Dealer,
            Verdict::DealerBusted | Verdict::PlayerHigher => Winner::Player,
            Verdict::Push => Winner::Tie,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Verdict::PlayerBusted => "Dealer wins! Player busted.",
            Verdict::DealerBusted => "Player wins! Dealer busted.",
            Verdict::PlayerHigher => "Player wins!",
            Verdict::DealerHigher => "Dealer wins!",
            Verdict::Push => "It's a tie!",
        };
        write!(f, "{}", text)
    }
}

/// Classifies a finished round. Two-card 21 is not treated differently from any other 21.
pub fn resolve(player_value: u16, dealer_value: u16) -> Verdict {
    if player_value > BLACKJACK {
        Verdict::PlayerBusted
    } else if dealer_value > BLACKJACK {
        Verdict::DealerBusted
    } else if player_value > dealer_value {
        Verdict::PlayerHigher
    } else if dealer_value > player_value {
        Verdict::DealerHigher
    } else {
        Verdict::Push
    }
}

/// Everything recorded about one completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub dealer_upcard: Card,
    pub player_hand: Hand,
    pub dealer_hand: Hand,
    pub player_value: u16,
    pub dealer_value: u16,
    pub verdict: Verdict,
    pub player_busted: bool,
    pub dealer_busted: bool,
}

impl RoundResult {
    pub fn winner(&self) -> Winner {
        self.verdict.winner()
    }
}
