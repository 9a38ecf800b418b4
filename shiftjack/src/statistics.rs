use std::collections::BTreeMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::simulation::{
    outcome::{RoundResult, Winner},
    Card,
};

static ZERO: u64 = 0;

/// Counts how often each key was seen. Keys that were never seen are absent rather than zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "K: Serialize",
    deserialize = "K: Deserialize<'de> + Ord"
))]
pub struct FrequencyTable<K> {
    counts: BTreeMap<K, u64>,
}

impl<K: Ord> FrequencyTable<K> {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, key: K) {
        self.add_count(key, 1);
    }

    pub fn add_count(&mut self, key: K, count: u64) {
        if count > 0 {
            *self.counts.entry(key).or_insert(0) += count;
        }
    }

    pub fn count(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(key, count)| (key, *count))
    }
}

impl<K: Ord> Default for FrequencyTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> Index<&K> for FrequencyTable<K> {
    type Output = u64;
    fn index(&self, key: &K) -> &Self::Output {
        self.counts.get(key).unwrap_or(&ZERO)
    }
}

impl<K: Ord> FromIterator<K> for FrequencyTable<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl<K: Ord> Extend<K> for FrequencyTable<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.add(key);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRecord {
    #[serde(rename = "Player")]
    pub player: u64,
    #[serde(rename = "Dealer")]
    pub dealer: u64,
    #[serde(rename = "Tie")]
    pub tie: u64,
}

impl WinRecord {
    pub fn record(&mut self, winner: Winner) {
        match winner {
            Winner::Player => self.player += 1,
            Winner::Dealer => self.dealer += 1,
            Winner::Tie => self.tie += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.player + self.dealer + self.tie
    }
}

impl Index<Winner> for WinRecord {
    type Output = u64;
    fn index(&self, winner: Winner) -> &Self::Output {
        match winner {
            Winner::Player => &self.player,
            Winner::Dealer => &self.dealer,
            Winner::Tie => &self.tie,
        }
    }
}

/// Scalar summary of a batch. Rates are percentages of all completed rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub player_win_rate: f64,
    pub dealer_bust_rate: f64,
    #[serde(default)]
    pub player_bust_rate: f64,
    pub average_player_hand_value: f64,
    pub average_dealer_hand_value: f64,
}

/// Accumulates completed rounds. Only whole rounds are ever recorded.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    player_card_frequencies: FrequencyTable<Card>,
    dealer_card_frequencies: FrequencyTable<Card>,
    player_final_hand_values: Vec<u16>,
    dealer_final_hand_values: Vec<u16>,
    win_record: WinRecord,
    player_busts: u64,
    dealer_busts: u64,
}

impl Batch {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds one round. Every card in both final hands counts, the initial deal included.
    pub fn record(&mut self, result: &RoundResult) {
        self.player_card_frequencies
            .extend(result.player_hand.cards().iter().copied());
        self.dealer_card_frequencies
            .extend(result.dealer_hand.cards().iter().copied());
        self.player_final_hand_values.push(result.player_value);
        self.dealer_final_hand_values.push(result.dealer_value);
        self.win_record.record(result.winner());
        if result.player_busted {
            self.player_busts += 1;
        }
        if result.dealer_busted {
            self.dealer_busts += 1;
        }
    }

    pub fn rounds(&self) -> u64 {
        self.player_final_hand_values.len() as u64
    }

    pub fn win_record(&self) -> WinRecord {
        self.win_record
    }

    pub fn player_card_frequencies(&self) -> &FrequencyTable<Card> {
        &self.player_card_frequencies
    }

    pub fn dealer_card_frequencies(&self) -> &FrequencyTable<Card> {
        &self.dealer_card_frequencies
    }

    pub fn player_final_hand_values(&self) -> &[u16] {
        &self.player_final_hand_values
    }

    pub fn dealer_final_hand_values(&self) -> &[u16] {
        &self.dealer_final_hand_values
    }

    pub fn player_busts(&self) -> u64 {
        self.player_busts
    }

    pub fn dealer_busts(&self) -> u64 {
        self.dealer_busts
    }

    /// All zeros for an empty batch.
    pub fn metrics(&self) -> Metrics {
        let rounds = self.rounds();
        if rounds == 0 {
            return Metrics::default();
        }
        let rounds = rounds as f64;
        Metrics {
            player_win_rate: self.win_record.player as f64 / rounds * 100.0,
            dealer_bust_rate: self.dealer_busts as f64 / rounds * 100.0,
            player_bust_rate: self.player_busts as f64 / rounds * 100.0,
            average_player_hand_value: mean(&self.player_final_hand_values),
            average_dealer_hand_value: mean(&self.dealer_final_hand_values),
        }
    }

    pub fn into_report(self, label: Option<String>) -> BatchReport {
        let metrics = self.metrics();
        BatchReport {
            label,
            player_card_frequencies: self.player_card_frequencies,
            dealer_card_frequencies: self.dealer_card_frequencies,
            player_final_hand_values: self.player_final_hand_values,
            dealer_final_hand_values: self.dealer_final_hand_values,
            win_record: self.win_record,
            metrics,
        }
    }
}

fn mean(values: &[u16]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

/// The interchange form of a finished batch, written to and read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub player_card_frequencies: FrequencyTable<Card>,
    pub dealer_card_frequencies: FrequencyTable<Card>,
    pub player_final_hand_values: Vec<u16>,
    pub dealer_final_hand_values: Vec<u16>,
    pub win_record: WinRecord,
    pub metrics: Metrics,
}

impl BatchReport {
    pub fn rounds(&self) -> u64 {
        self.player_final_hand_values.len() as u64
    }

    pub fn player_value_frequencies(&self) -> FrequencyTable<u16> {
        self.player_final_hand_values.iter().copied().collect()
    }

    pub fn dealer_value_frequencies(&self) -> FrequencyTable<u16> {
        self.dealer_final_hand_values.iter().copied().collect()
    }
}
