pub mod card_source;
pub mod hand;
pub mod outcome;

use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use shiftjack_macros::allowed_phase;
use strum_macros::{EnumCount, EnumIter};
use tracing::{event, Level};

use crate::{
    statistics::Batch,
    strategy::{DealerPolicy, PlayerPolicy},
    CardSourceError, Rule, SimulationError, BLACKJACK,
};

use self::{
    card_source::{CardSource, DrawRequest},
    hand::Hand,
    outcome::{resolve, RoundResult},
};

static CARD_TO_BLACKJACK_VALUE: [u16; 13] = [2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10, 11];

pub(crate) static ALL_CARDS: [Card; 13] = [
    Card::Two,
    Card::Three,
    Card::Four,
    Card::Five,
    Card::Six,
    Card::Seven,
    Card::Eight,
    Card::Nine,
    Card::Ten,
    Card::Jack,
    Card::Queen,
    Card::King,
    Card::Ace,
];

/// A card rank. Suits play no part in this game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumCount,
    Serialize_enum_str,
    Deserialize_enum_str,
)]
pub enum Card {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Card {
    /// Ace counts 11 here; softening happens when a whole hand is evaluated.
    pub fn blackjack_value(&self) -> u16 {
        CARD_TO_BLACKJACK_VALUE[*self as usize]
    }

    pub fn is_ten_valued(&self) -> bool {
        matches!(self, Card::Ten | Card::Jack | Card::Queen | Card::King)
    }

    /// The printed number of a number card. Face cards and the Ace have none.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            Card::Jack | Card::Queen | Card::King | Card::Ace => None,
            _ => Some(*self as u8 + 2),
        }
    }

    /// Parses the exact card name, ignoring surrounding whitespace.
    pub fn from_text(text: &str) -> Result<Card, CardSourceError> {
        text.trim()
            .parse()
            .map_err(|_| CardSourceError::InvalidCard(text.to_string()))
    }

    /// Finds the first whole word in `text` that names a card, e.g. `"I deal the Queen."`.
    pub fn find_in_text(text: &str) -> Option<Card> {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .find_map(|word| word.parse::<Card>().ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Deal,
    PlayerTurn,
    DealerTurn,
    Summary,
}

/// Plays rounds of one-player blackjack against a card source.
///
/// A round can be driven step by step (`deal_initial_cards`, `player_plays`, `dealer_plays`,
/// `summarize`) or in one call with `play_round`. Each step is only allowed in its own phase.
/// If the card source fails at any step the round is discarded and the table goes back to
/// the `Deal` phase.
pub struct Simulator<S: CardSource> {
    rule: Rule,
    source: S,

    phase: RoundPhase,
    player_hand: Hand,
    dealer_hand: Hand,
    dealer_upcard: Option<Card>,
    player_value: u16,
    dealer_value: u16,
    dealer_busted: bool,
}

impl<S: CardSource> Simulator<S> {
    pub fn new(rule: &Rule, source: S) -> Self {
        Self {
            rule: *rule,
            source,
            phase: RoundPhase::Deal,
            player_hand: Hand::new(),
            dealer_hand: Hand::new(),
            dealer_upcard: None,
            player_value: 0,
            dealer_value: 0,
            dealer_busted: false,
        }
    }

    /// Deals two cards to the dealer, then two to the player. Returns the dealer's upcard.
    #[allowed_phase(Deal)]
    pub fn deal_initial_cards(&mut self) -> Result<Card, SimulationError> {
        self.new_round();
        self.deal_setup_cards()
            .map_err(|err| self.abandon_round(err))
    }

    /// Runs the player policy. Returns the player's final value.
    #[allowed_phase(PlayerTurn)]
    pub fn player_plays(&mut self) -> Result<u16, SimulationError> {
        let upcard = self.dealer_upcard.ok_or(SimulationError::MissingUpcard)?;
        let value = PlayerPolicy
            .play(
                upcard,
                &mut self.player_hand,
                &self.dealer_hand,
                &mut self.source,
            )
            .map_err(|err| self.abandon_round(err))?;
        self.player_value = value;

        if value > BLACKJACK {
            // The dealer hand stays as dealt; its value is only recorded.
            self.dealer_value = self.dealer_hand.value();
            self.dealer_busted = false;
            self.phase = RoundPhase::Summary;
        } else {
            self.phase = RoundPhase::DealerTurn;
        }
        Ok(value)
    }

    /// Runs the dealer policy. Returns the dealer's final value and whether it busted.
    #[allowed_phase(DealerTurn)]
    pub fn dealer_plays(&mut self) -> Result<(u16, bool), SimulationError> {
        let policy = DealerPolicy::new(&self.rule);
        let (value, busted) = policy
            .play(&mut self.dealer_hand, &self.player_hand, &mut self.source)
            .map_err(|err| self.abandon_round(err))?;
        self.dealer_value = value;
        self.dealer_busted = busted;
        self.phase = RoundPhase::Summary;
        Ok((value, busted))
    }

    /// Resolves the round and hands over its record. The table is ready to deal again.
    #[allowed_phase(Summary)]
    pub fn summarize(&mut self) -> Result<RoundResult, SimulationError> {
        let dealer_upcard = self.dealer_upcard.ok_or(SimulationError::MissingUpcard)?;
        let verdict = resolve(self.player_value, self.dealer_value);
        let player_busted = self.player_hand.bust();
        let result = RoundResult {
            dealer_upcard,
            player_hand: std::mem::take(&mut self.player_hand),
            dealer_hand: std::mem::take(&mut self.dealer_hand),
            player_value: self.player_value,
            dealer_value: self.dealer_value,
            verdict,
            player_busted,
            dealer_busted: self.dealer_busted,
        };

        event!(
            Level::DEBUG,
            dealer_hand = ?result.dealer_hand.cards(),
            dealer_value = result.dealer_value,
            player_hand = ?result.player_hand.cards(),
            player_value = result.player_value,
            "{}",
            verdict
        );

        self.new_round();
        Ok(result)
    }

    /// Plays one complete round.
    pub fn play_round(&mut self) -> Result<RoundResult, SimulationError> {
        self.automatic_play_round(&mut ())
    }

    /// Plays one complete round, reporting its steps to `handler`.
    #[allowed_phase(Deal)]
    pub fn automatic_play_round<U: SimulatorEventHandler>(
        &mut self,
        handler: &mut U,
    ) -> Result<RoundResult, SimulationError> {
        let upcard = self.deal_initial_cards()?;
        handler.on_deal_cards(upcard, &self.player_hand);

        let player_value = self.player_plays()?;
        if player_value > BLACKJACK {
            handler.on_player_bust(player_value);
        } else {
            let (dealer_value, busted) = self.dealer_plays()?;
            if busted {
                handler.on_dealer_bust(dealer_value);
            }
        }

        self.summarize()
    }

    /// Plays up to `rounds` rounds into `batch`. Returns how many rounds were completed.
    ///
    /// The handler may stop the batch between rounds. If a round fails, the error is returned
    /// and `batch` holds exactly the rounds completed before it.
    pub fn run_batch<U: SimulatorEventHandler>(
        &mut self,
        rounds: u64,
        batch: &mut Batch,
        handler: &mut U,
    ) -> Result<u64, SimulationError> {
        let mut completed = 0;
        for _ in 0..rounds {
            if handler.should_stop(batch) {
                event!(Level::INFO, completed, "batch stopped by handler");
                break;
            }

            let round_id = batch.rounds() + 1;
            handler.on_round_begin(round_id);
            match self.automatic_play_round(handler) {
                Ok(result) => {
                    batch.record(&result);
                    completed += 1;
                    handler.on_summary_round(round_id, &result, batch);
                }
                Err(err) => {
                    handler.on_round_discarded(round_id, &err);
                    return Err(err);
                }
            }
        }
        Ok(completed)
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn dealer_upcard(&self) -> Option<Card> {
        self.dealer_upcard
    }

    pub fn player_hand(&self) -> &Hand {
        &self.player_hand
    }

    pub fn dealer_hand(&self) -> &Hand {
        &self.dealer_hand
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn deal_setup_cards(&mut self) -> Result<Card, CardSourceError> {
        for _ in 0..2 {
            let request = DrawRequest::setup(self.player_hand.cards(), self.dealer_hand.cards());
            let card = self.source.draw(&request)?;
            self.dealer_hand.receive_card(card);
        }
        for _ in 0..2 {
            let request = DrawRequest::setup(self.player_hand.cards(), self.dealer_hand.cards());
            let card = self.source.draw(&request)?;
            self.player_hand.receive_card(card);
        }

        let upcard = self.dealer_hand.first().ok_or(CardSourceError::Exhausted)?;
        self.dealer_upcard = Some(upcard);
        self.phase = RoundPhase::PlayerTurn;
        Ok(upcard)
    }

    fn abandon_round(&mut self, err: CardSourceError) -> SimulationError {
        event!(
            Level::WARN,
            phase = ?self.phase,
            error = %err,
            "round discarded"
        );
        self.new_round();
        err.into()
    }

    fn new_round(&mut self) {
        self.phase = RoundPhase::Deal;
        self.player_hand.clear();
        self.dealer_hand.clear();
        self.dealer_upcard = None;
        self.player_value = 0;
        self.dealer_value = 0;
        self.dealer_busted = false;
    }
}

/// Hooks into a running batch. Every method has an empty default.
pub trait SimulatorEventHandler {
    fn on_round_begin(&mut self, _round_id: u64) {}
    fn on_deal_cards(&mut self, _dealer_upcard: Card, _player_hand: &Hand) {}
    fn on_player_bust(&mut self, _player_value: u16) {}
    fn on_dealer_bust(&mut self, _dealer_value: u16) {}
    fn on_summary_round(&mut self, _round_id: u64, _result: &RoundResult, _batch: &Batch) {}
    fn on_round_discarded(&mut self, _round_id: u64, _error: &SimulationError) {}

    /// Checked before each round.
    fn should_stop(&mut self, _batch: &Batch) -> bool {
        false
    }
}

impl SimulatorEventHandler for () {}
