use crate::BLACKJACK;

use super::Card;

/// The cards one side holds during a round. Cards are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand {
            cards: Vec::with_capacity(5),
        }
    }

    pub fn with_cards(cards: &[Card]) -> Hand {
        Hand {
            cards: cards.to_vec(),
        }
    }

    pub fn receive_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn first(&self) -> Option<Card> {
        self.cards.first().copied()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Recomputed on every call so the value can never go stale after a draw.
    pub fn value(&self) -> u16 {
        evaluate(&self.cards)
    }

    pub fn is_soft(&self) -> bool {
        is_soft(&self.cards)
    }

    pub fn contains_ace(&self) -> bool {
        self.cards.contains(&Card::Ace)
    }

    pub fn bust(&self) -> bool {
        self.value() > BLACKJACK
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }
}

/// Computes the optimal value of the given cards.
///
/// Every Ace starts out as 11. While the total exceeds 21 and some Ace is still counted as 11,
/// one Ace is softened to 1. The result may still exceed 21, which is a bust rather than an error.
pub fn evaluate(cards: &[Card]) -> u16 {
    resolve_aces(cards).0
}

/// Returns true if at least one Ace is still counted as 11 after resolution.
pub fn is_soft(cards: &[Card]) -> bool {
    resolve_aces(cards).1 > 0
}

fn resolve_aces(cards: &[Card]) -> (u16, u16) {
    let mut total: u16 = 0;
    let mut hard_aces: u16 = 0;
    for card in cards {
        total += card.blackjack_value();
        if *card == Card::Ace {
            hard_aces += 1;
        }
    }

    while total > BLACKJACK && hard_aces > 0 {
        total -= 10;
        hard_aces -= 1;
    }

    (total, hard_aces)
}
