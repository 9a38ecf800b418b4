use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use tracing::{event, Level};

use crate::CardSourceError;

use super::{Card, ALL_CARDS};

/// Who the requested card is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrawRole {
    Setup,
    Player,
    Dealer,
}

/// The game state visible at the moment a card is requested.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DrawRequest<'a> {
    pub role: DrawRole,
    pub player_hand: &'a [Card],
    pub dealer_hand: &'a [Card],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealer_upcard: Option<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_value: Option<u16>,
}

impl<'a> DrawRequest<'a> {
    pub fn setup(player_hand: &'a [Card], dealer_hand: &'a [Card]) -> Self {
        DrawRequest {
            role: DrawRole::Setup,
            player_hand,
            dealer_hand,
            dealer_upcard: None,
            hand_value: None,
        }
    }

    pub fn player(
        player_hand: &'a [Card],
        dealer_hand: &'a [Card],
        dealer_upcard: Card,
        player_value: u16,
    ) -> Self {
        DrawRequest {
            role: DrawRole::Player,
            player_hand,
            dealer_hand,
            dealer_upcard: Some(dealer_upcard),
            hand_value: Some(player_value),
        }
    }

    pub fn dealer(player_hand: &'a [Card], dealer_hand: &'a [Card], dealer_value: u16) -> Self {
        DrawRequest {
            role: DrawRole::Dealer,
            player_hand,
            dealer_hand,
            dealer_upcard: dealer_hand.first().copied(),
            hand_value: Some(dealer_value),
        }
    }
}

/// Supplies one card per call. The returned card is trusted to be one of the 13 ranks, which
/// the `Card` type guarantees; sources that read free-form input must validate before returning.
pub trait CardSource {
    fn draw(&mut self, request: &DrawRequest<'_>) -> Result<Card, CardSourceError>;
}

impl<T: CardSource + ?Sized> CardSource for &mut T {
    fn draw(&mut self, request: &DrawRequest<'_>) -> Result<Card, CardSourceError> {
        (**self).draw(request)
    }
}

impl<T: CardSource + ?Sized> CardSource for Box<T> {
    fn draw(&mut self, request: &DrawRequest<'_>) -> Result<Card, CardSourceError> {
        (**self).draw(request)
    }
}

/// Draws a rank uniformly at random.
pub fn random_card<R: Rng + ?Sized>(rng: &mut R) -> Card {
    ALL_CARDS[rng.gen_range(0..ALL_CARDS.len())]
}

/// Every rank is equally likely on every draw, independent of what was dealt before.
#[derive(Debug, Clone)]
pub struct UniformCardSource<R: Rng> {
    rng: R,
}

impl<R: Rng> UniformCardSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl UniformCardSource<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> CardSource for UniformCardSource<R> {
    fn draw(&mut self, _: &DrawRequest<'_>) -> Result<Card, CardSourceError> {
        Ok(random_card(&mut self.rng))
    }
}

/// An external decision maker that names the card to deal. Its answer is free-form text.
pub trait CardOracle {
    fn propose(&mut self, request: &DrawRequest<'_>) -> Result<String, CardSourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_enum_str, Deserialize_enum_str)]
pub enum FallbackPolicy {
    UniformRandom,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fallback: FallbackPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            fallback: FallbackPolicy::UniformRandom,
        }
    }
}

/// Asks an oracle for each card. An answer that names no card, or a failed request, is retried
/// up to `max_attempts` times before the fallback policy applies.
pub struct DelegatedCardSource<O: CardOracle, R: Rng> {
    oracle: O,
    policy: RetryPolicy,
    rng: R,
    fallbacks: u64,
}

impl<O: CardOracle, R: Rng> DelegatedCardSource<O, R> {
    pub fn new(oracle: O, policy: RetryPolicy, rng: R) -> Self {
        Self {
            oracle,
            policy,
            rng,
            fallbacks: 0,
        }
    }

    /// How many cards were substituted at random because the oracle gave no valid answer.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O: CardOracle, R: Rng> CardSource for DelegatedCardSource<O, R> {
    fn draw(&mut self, request: &DrawRequest<'_>) -> Result<Card, CardSourceError> {
        for attempt in 1..=self.policy.max_attempts {
            match self.oracle.propose(request) {
                Ok(answer) => match Card::from_text(&answer)
                    .ok()
                    .or_else(|| Card::find_in_text(&answer))
                {
                    Some(card) => return Ok(card),
                    None => event!(
                        Level::DEBUG,
                        attempt,
                        answer = %answer,
                        "oracle answer names no card"
                    ),
                },
                Err(err) => event!(
                    Level::WARN,
                    attempt,
                    error = %err,
                    "oracle request failed"
                ),
            }
        }

        match self.policy.fallback {
            FallbackPolicy::UniformRandom => {
                let card = random_card(&mut self.rng);
                self.fallbacks += 1;
                event!(
                    Level::WARN,
                    attempts = self.policy.max_attempts,
                    card = %card,
                    "oracle gave no valid card; falling back to a random card"
                );
                Ok(card)
            }
            FallbackPolicy::Fail => Err(CardSourceError::RetriesExhausted {
                attempts: self.policy.max_attempts,
            }),
        }
    }
}

/// Deals a fixed sequence of cards, then reports exhaustion.
#[cfg(test)]
pub(crate) struct ScriptedCardSource {
    cards: std::collections::VecDeque<Card>,
    pub roles: Vec<DrawRole>,
}

#[cfg(test)]
impl ScriptedCardSource {
    pub(crate) fn new(cards: &[Card]) -> Self {
        Self {
            cards: cards.iter().copied().collect(),
            roles: Vec::new(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.cards.len()
    }
}

#[cfg(test)]
impl CardSource for ScriptedCardSource {
    fn draw(&mut self, request: &DrawRequest<'_>) -> Result<Card, CardSourceError> {
        self.roles.push(request.role);
        self.cards.pop_front().ok_or(CardSourceError::Exhausted)
    }
}
