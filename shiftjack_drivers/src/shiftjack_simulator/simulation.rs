use std::path::Path;

use anyhow::Context;
use shiftjack::simulation::{hand::Hand, outcome::RoundResult, Simulator, SimulatorEventHandler};
use shiftjack::{Batch, BatchReport, Card, Rule, SimulationError};
use shiftjack_drivers::{build_card_source, ConfigSimulator};
use tracing::{event, Level};

struct Handler {
    progress_interval: u64,
    target_rounds: u64,
}

impl SimulatorEventHandler for Handler {
    fn on_deal_cards(&mut self, dealer_upcard: Card, player_hand: &Hand) {
        event!(
            Level::TRACE,
            upcard = %dealer_upcard,
            player = %cards_to_string(player_hand.cards()),
            "cards dealt"
        );
    }

    fn on_summary_round(&mut self, round_id: u64, _result: &RoundResult, batch: &Batch) {
        if round_id % self.progress_interval == 0 {
            let metrics = batch.metrics();
            event!(
                Level::INFO,
                completed = round_id,
                total = self.target_rounds,
                player_win_rate = metrics.player_win_rate,
                dealer_bust_rate = metrics.dealer_bust_rate,
                "progress"
            );
        }
    }

    fn on_round_discarded(&mut self, round_id: u64, error: &SimulationError) {
        event!(Level::ERROR, round = round_id, error = %error, "batch aborted");
    }
}

pub struct SimulationOutcome {
    pub report: BatchReport,
    /// Set when a round failed; `report` then holds the rounds completed before it.
    pub error: Option<SimulationError>,
}

pub fn simulate(
    rule: &Rule,
    simulator_config: &ConfigSimulator,
) -> anyhow::Result<SimulationOutcome> {
    let source = build_card_source(&simulator_config.card_source, simulator_config.seed)
        .context("building card source")?;
    let mut simulator = Simulator::new(rule, source);
    let mut handler = Handler {
        progress_interval: simulator_config.progress_interval.max(1),
        target_rounds: simulator_config.rounds,
    };
    let mut batch = Batch::new();

    event!(
        Level::INFO,
        rounds = simulator_config.rounds,
        seed = ?simulator_config.seed,
        source = ?simulator_config.card_source.kind,
        "starting batch"
    );
    let error = simulator
        .run_batch(simulator_config.rounds, &mut batch, &mut handler)
        .err();

    let metrics = batch.metrics();
    event!(
        Level::INFO,
        rounds = batch.rounds(),
        player_win_rate = metrics.player_win_rate,
        dealer_bust_rate = metrics.dealer_bust_rate,
        player_bust_rate = metrics.player_bust_rate,
        average_player_hand_value = metrics.average_player_hand_value,
        average_dealer_hand_value = metrics.average_dealer_hand_value,
        "batch finished"
    );

    Ok(SimulationOutcome {
        report: batch.into_report(simulator_config.label.clone()),
        error,
    })
}

pub fn print_summary(report: &BatchReport, output: &Path) {
    let metrics = &report.metrics;
    let win_record = &report.win_record;
    if let Some(label) = &report.label {
        println!("Run: {}", label);
    }
    println!("Rounds: {}", report.rounds());
    println!(
        "Player {} / Dealer {} / Tie {}",
        win_record.player, win_record.dealer, win_record.tie
    );
    println!("Player win rate: {:.2}%", metrics.player_win_rate);
    println!("Dealer bust rate: {:.2}%", metrics.dealer_bust_rate);
    println!("Player bust rate: {:.2}%", metrics.player_bust_rate);
    println!(
        "Average hand value: player {:.2}, dealer {:.2}",
        metrics.average_player_hand_value, metrics.average_dealer_hand_value
    );

    print!("Player cards:");
    for (card, count) in report.player_card_frequencies.iter() {
        print!(" {}={}", card, count);
    }
    println!();
    print!("Dealer cards:");
    for (card, count) in report.dealer_card_frequencies.iter() {
        print!(" {}={}", card, count);
    }
    println!();
    println!("Report written to {}", output.display());
}

fn cards_to_string(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|card| card.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftjack_drivers::ConfigCardSource;

    fn simulator_config(rounds: u64) -> ConfigSimulator {
        ConfigSimulator {
            rounds,
            seed: Some(11),
            progress_interval: 7,
            label: Some(String::from("uniform")),
            output: "unused.json".into(),
            card_source: ConfigCardSource::default(),
        }
    }

    #[test]
    fn uniform_run_completes_every_round() {
        let outcome = simulate(&Rule::default(), &simulator_config(60)).unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(outcome.report.rounds(), 60);
        assert_eq!(outcome.report.win_record.total(), 60);
        assert_eq!(outcome.report.label.as_deref(), Some("uniform"));
    }

    #[test]
    fn same_seed_same_report() {
        let a = simulate(&Rule::default(), &simulator_config(40)).unwrap();
        let b = simulate(&Rule::default(), &simulator_config(40)).unwrap();
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn failing_oracle_keeps_completed_rounds_only() {
        let mut config = simulator_config(5);
        config.card_source = ConfigCardSource {
            kind: shiftjack_drivers::CardSourceKind::External,
            command: Some(String::from("/no/such/oracle")),
            args: Vec::new(),
            max_attempts: 1,
            fallback: String::from("Fail"),
        };
        let outcome = simulate(&Rule::default(), &config).unwrap();
        assert!(matches!(
            outcome.error,
            Some(SimulationError::CardSource(_))
        ));
        assert_eq!(outcome.report.rounds(), 0);
    }

    #[test]
    fn cards_are_joined_by_spaces() {
        assert_eq!(cards_to_string(&[Card::Ace, Card::Ten]), "Ace 10");
    }
}
