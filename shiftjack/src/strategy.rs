use crate::{
    simulation::{
        card_source::{CardSource, DrawRequest},
        hand::Hand,
        Card,
    },
    CardSourceError, Decision, Rule, BLACKJACK, DEALER_STAND_VALUE,
};

/// Below this the player keeps hitting against a ten-valued upcard.
const HIT_BELOW_AGAINST_TEN: u16 = 17;
/// Below this the player keeps hitting against an upcard of 2 to 6.
const HIT_BELOW_AGAINST_LOW: u16 = 12;

/// Fixed-threshold player heuristic. It only looks at the dealer's upcard and the current hand
/// value, never at whether the hand is soft.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerPolicy;

impl PlayerPolicy {
    pub fn decide(dealer_upcard: Card, player_value: u16) -> Decision {
        if player_value >= BLACKJACK {
            return Decision::Stand;
        }

        if dealer_upcard.is_ten_valued() && player_value < HIT_BELOW_AGAINST_TEN {
            return Decision::Hit;
        }

        match dealer_upcard.numeric_rank() {
            Some(2..=6) if player_value < HIT_BELOW_AGAINST_LOW => Decision::Hit,
            _ => Decision::Stand,
        }
    }

    /// Draws into `player_hand` until the policy stands, the hand reaches 21, or it busts.
    /// Returns the final value, which is above 21 on a bust.
    pub fn play<S: CardSource + ?Sized>(
        &self,
        dealer_upcard: Card,
        player_hand: &mut Hand,
        dealer_hand: &Hand,
        source: &mut S,
    ) -> Result<u16, CardSourceError> {
        let mut value = player_hand.value();
        while Self::decide(dealer_upcard, value) == Decision::Hit {
            let request =
                DrawRequest::player(player_hand.cards(), dealer_hand.cards(), dealer_upcard, value);
            let card = source.draw(&request)?;
            player_hand.receive_card(card);
            value = player_hand.value();
        }
        Ok(value)
    }
}

/// The house rule: hit below 17, and on a 17 that contains an Ace when hitting soft 17.
#[derive(Debug, Clone, Copy)]
pub struct DealerPolicy {
    hit_on_soft17: bool,
}

impl DealerPolicy {
    pub fn new(rule: &Rule) -> Self {
        DealerPolicy {
            hit_on_soft17: rule.dealer_hit_on_soft17,
        }
    }

    pub fn decide(&self, dealer_hand: &Hand) -> Decision {
        let value = dealer_hand.value();
        if value < DEALER_STAND_VALUE {
            Decision::Hit
        } else if value == DEALER_STAND_VALUE && self.hit_on_soft17 && dealer_hand.contains_ace() {
            Decision::Hit
        } else {
            Decision::Stand
        }
    }

    /// Draws into `dealer_hand` until the rule stands. Returns the final value and whether it
    /// busted.
    pub fn play<S: CardSource + ?Sized>(
        &self,
        dealer_hand: &mut Hand,
        player_hand: &Hand,
        source: &mut S,
    ) -> Result<(u16, bool), CardSourceError> {
        while self.decide(dealer_hand) == Decision::Hit {
            let request =
                DrawRequest::dealer(player_hand.cards(), dealer_hand.cards(), dealer_hand.value());
            let card = source.draw(&request)?;
            dealer_hand.receive_card(card);
        }
        Ok((dealer_hand.value(), dealer_hand.bust()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::card_source::{DrawRole, ScriptedCardSource};
    use Card::*;

    #[test]
    fn player_stands_on_17_against_king() {
        let mut hand = Hand::with_cards(&[Ten, Seven]);
        let dealer = Hand::with_cards(&[King, Five]);
        let mut source = ScriptedCardSource::new(&[]);
        let value = PlayerPolicy
            .play(King, &mut hand, &dealer, &mut source)
            .unwrap();
        assert_eq!(value, 17);
        assert_eq!(hand.len(), 2);
        assert!(source.roles.is_empty());
    }

    #[test]
    fn player_draws_on_10_against_5_until_12() {
        let mut hand = Hand::with_cards(&[Six, Four]);
        let dealer = Hand::with_cards(&[Five, Nine]);
        let mut source = ScriptedCardSource::new(&[Ace, Three, Nine]);
        let value = PlayerPolicy
            .play(Five, &mut hand, &dealer, &mut source)
            .unwrap();
        // 10 + A = 21 stops at once
        assert_eq!(value, 21);
        assert_eq!(source.remaining(), 2);

        let mut hand = Hand::with_cards(&[Two, Three]);
        let mut source = ScriptedCardSource::new(&[Two, Four, Nine]);
        let value = PlayerPolicy
            .play(Five, &mut hand, &dealer, &mut source)
            .unwrap();
        // 5 -> 7 -> 11 -> 20; the threshold is re-checked after every draw
        assert_eq!(value, 20);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.roles, vec![DrawRole::Player; 3]);
    }

    #[test]
    fn player_bust_stops_drawing() {
        let mut hand = Hand::with_cards(&[Ten, Six]);
        let dealer = Hand::with_cards(&[Queen, Two]);
        let mut source = ScriptedCardSource::new(&[Nine, Two]);
        let value = PlayerPolicy
            .play(Queen, &mut hand, &dealer, &mut source)
            .unwrap();
        assert_eq!(value, 25);
        assert_eq!(source.remaining(), 1);
    }

    #[test]
    fn player_never_hits_against_seven_to_ace() {
        for upcard in [Seven, Eight, Nine, Ace] {
            assert_eq!(PlayerPolicy::decide(upcard, 5), Decision::Stand);
        }
    }

    #[test]
    fn player_thresholds() {
        assert_eq!(PlayerPolicy::decide(Jack, 16), Decision::Hit);
        assert_eq!(PlayerPolicy::decide(Jack, 17), Decision::Stand);
        assert_eq!(PlayerPolicy::decide(Ten, 12), Decision::Hit);
        assert_eq!(PlayerPolicy::decide(Two, 11), Decision::Hit);
        assert_eq!(PlayerPolicy::decide(Six, 12), Decision::Stand);
        assert_eq!(PlayerPolicy::decide(Four, 21), Decision::Stand);
    }

    #[test]
    fn dealer_hits_soft_17_and_stands_on_hard_17() {
        let policy = DealerPolicy::new(&Rule::default());
        assert_eq!(policy.decide(&Hand::with_cards(&[Ace, Six])), Decision::Hit);
        assert_eq!(policy.decide(&Hand::with_cards(&[Ten, Seven])), Decision::Stand);

        let mut hand = Hand::with_cards(&[Ace, Six]);
        let mut source = ScriptedCardSource::new(&[Two]);
        let (value, busted) = policy
            .play(&mut hand, &Hand::new(), &mut source)
            .unwrap();
        assert_eq!((value, busted), (19, false));
        assert_eq!(source.roles, vec![DrawRole::Dealer]);

        let mut hand = Hand::with_cards(&[Ten, Seven]);
        let mut source = ScriptedCardSource::new(&[]);
        assert_eq!(
            policy.play(&mut hand, &Hand::new(), &mut source).unwrap(),
            (17, false)
        );
    }

    #[test]
    fn dealer_can_stand_on_soft_17() {
        let policy = DealerPolicy::new(&Rule {
            dealer_hit_on_soft17: false,
        });
        assert_eq!(policy.decide(&Hand::with_cards(&[Ace, Six])), Decision::Stand);
    }

    #[test]
    fn dealer_bust_is_reported() {
        let policy = DealerPolicy::new(&Rule::default());
        let mut hand = Hand::with_cards(&[Ten, Six]);
        let mut source = ScriptedCardSource::new(&[King]);
        assert_eq!(
            policy.play(&mut hand, &Hand::new(), &mut source).unwrap(),
            (26, true)
        );
    }

    #[test]
    fn source_failure_is_propagated() {
        let policy = DealerPolicy::new(&Rule::default());
        let mut hand = Hand::with_cards(&[Two, Three]);
        let mut source = ScriptedCardSource::new(&[Four]);
        let err = policy
            .play(&mut hand, &Hand::new(), &mut source)
            .unwrap_err();
        assert!(matches!(err, CardSourceError::Exhausted));
    }
}
