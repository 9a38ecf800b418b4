use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    simulation::Card,
    statistics::{BatchReport, FrequencyTable},
    ComparisonError,
};

/// Probability given to a key that one side of a comparison never saw.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// A normalized frequency table. Every stored probability is in (0, 1] and they sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "K: Serialize",
    deserialize = "K: Deserialize<'de> + Ord"
))]
pub struct Distribution<K> {
    probabilities: BTreeMap<K, f64>,
}

impl<K: Ord> Distribution<K> {
    /// Zero for a key that is not in the distribution.
    pub fn probability(&self, key: &K) -> f64 {
        self.probabilities.get(key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.probabilities.iter().map(|(key, p)| (key, *p))
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }
}

/// Divides every count by the table's total.
pub fn normalize<K: Ord + Clone>(
    table: &FrequencyTable<K>,
) -> Result<Distribution<K>, ComparisonError> {
    let total = table.total();
    if total == 0 {
        return Err(ComparisonError::DegenerateInput);
    }
    let total = total as f64;
    let probabilities = table
        .iter()
        .map(|(key, count)| (key.clone(), count as f64 / total))
        .collect();
    Ok(Distribution { probabilities })
}

/// Kullback–Leibler divergence of `q` from the reference `p`, in nats.
///
/// Both sides are evaluated over the union of their keys. A key missing from one side gets
/// `epsilon` there, and each side is renormalized afterwards so the result stays finite.
/// `epsilon` must lie in (0, 1). Not symmetric: swapping `p` and `q` changes the result.
pub fn divergence<K: Ord>(
    p: &Distribution<K>,
    q: &Distribution<K>,
    epsilon: f64,
) -> Result<f64, ComparisonError> {
    if !(epsilon > 0.0 && epsilon < 1.0) {
        return Err(ComparisonError::InvalidEpsilon(epsilon));
    }

    let keys: BTreeSet<&K> = p
        .probabilities
        .keys()
        .chain(q.probabilities.keys())
        .collect();

    let p_floored = floored(p, &keys, epsilon);
    let q_floored = floored(q, &keys, epsilon);

    Ok(p_floored
        .iter()
        .zip(q_floored.iter())
        .filter(|(p, _)| **p > 0.0)
        .map(|(p, q)| p * (p / q).ln())
        .sum())
}

fn floored<K: Ord>(distribution: &Distribution<K>, keys: &BTreeSet<&K>, epsilon: f64) -> Vec<f64> {
    let values: Vec<f64> = keys
        .iter()
        .map(|key| {
            distribution
                .probabilities
                .get(*key)
                .copied()
                .unwrap_or(epsilon)
        })
        .collect();
    let sum: f64 = values.iter().sum();
    values.into_iter().map(|v| v / sum).collect()
}

/// One divergence score together with the two distributions it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceEntry<K: Ord> {
    pub divergence: f64,
    pub reference: Distribution<K>,
    pub candidate: Distribution<K>,
}

fn divergence_entry<K: Ord + Clone>(
    name: &'static str,
    reference: &FrequencyTable<K>,
    candidate: &FrequencyTable<K>,
    epsilon: f64,
) -> Result<DivergenceEntry<K>, ComparisonError> {
    let empty_table = |source| ComparisonError::EmptyTable {
        table: name,
        source: Box::new(source),
    };
    let reference = normalize(reference).map_err(empty_table)?;
    let candidate = normalize(candidate).map_err(empty_table)?;
    Ok(DivergenceEntry {
        divergence: divergence(&reference, &candidate, epsilon)?,
        reference,
        candidate,
    })
}

/// How far a candidate batch has drifted from a reference batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub reference: String,
    pub candidate: String,
    pub player_cards: DivergenceEntry<Card>,
    pub dealer_cards: DivergenceEntry<Card>,
    pub player_final_values: DivergenceEntry<u16>,
    pub dealer_final_values: DivergenceEntry<u16>,
}

impl Comparison {
    /// (player cards, dealer cards, player final values, dealer final values)
    pub fn scores(&self) -> [f64; 4] {
        [
            self.player_cards.divergence,
            self.dealer_cards.divergence,
            self.player_final_values.divergence,
            self.dealer_final_values.divergence,
        ]
    }
}

pub fn compare(
    reference: &BatchReport,
    candidate: &BatchReport,
    epsilon: f64,
) -> Result<Comparison, ComparisonError> {
    Ok(Comparison {
        reference: reference.label.clone().unwrap_or_default(),
        candidate: candidate.label.clone().unwrap_or_default(),
        player_cards: divergence_entry(
            "player card",
            &reference.player_card_frequencies,
            &candidate.player_card_frequencies,
            epsilon,
        )?,
        dealer_cards: divergence_entry(
            "dealer card",
            &reference.dealer_card_frequencies,
            &candidate.dealer_card_frequencies,
            epsilon,
        )?,
        player_final_values: divergence_entry(
            "player final value",
            &reference.player_value_frequencies(),
            &candidate.player_value_frequencies(),
            epsilon,
        )?,
        dealer_final_values: divergence_entry(
            "dealer final value",
            &reference.dealer_value_frequencies(),
            &candidate.dealer_value_frequencies(),
            epsilon,
        )?,
    })
}

/// Compares every pair of reports in order: report `i` is the reference for every `j > i`.
pub fn compare_all(
    reports: &[BatchReport],
    epsilon: f64,
) -> Result<Vec<Comparison>, ComparisonError> {
    let mut comparisons = Vec::with_capacity(reports.len() * reports.len().saturating_sub(1) / 2);
    for (i, reference) in reports.iter().enumerate() {
        for candidate in &reports[i + 1..] {
            comparisons.push(compare(reference, candidate, epsilon)?);
        }
    }
    Ok(comparisons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::card_source::UniformCardSource;
    use crate::simulation::Simulator;
    use crate::statistics::Batch;
    use crate::Rule;
    use Card::*;

    fn table(entries: &[(Card, u64)]) -> FrequencyTable<Card> {
        let mut table = FrequencyTable::new();
        for (card, count) in entries {
            table.add_count(*card, *count);
        }
        table
    }

    fn uniform_report(seed: u64, rounds: u64, label: &str) -> BatchReport {
        let mut simulator = Simulator::new(&Rule::default(), UniformCardSource::seeded(seed));
        let mut batch = Batch::new();
        simulator.run_batch(rounds, &mut batch, &mut ()).unwrap();
        batch.into_report(Some(label.to_string()))
    }

    #[test]
    fn normalize_sums_to_one() {
        let p = normalize(&table(&[(Two, 3), (Ace, 7), (King, 11), (Five, 1)])).unwrap();
        assert!((p.total() - 1.0).abs() < 1e-9);
        assert_eq!(p.probability(&Two), 3.0 / 22.0);
        assert_eq!(p.probability(&Nine), 0.0);
        assert!(p.iter().all(|(_, prob)| prob > 0.0 && prob <= 1.0));
    }

    #[test]
    fn normalize_rejects_empty_table() {
        let empty: FrequencyTable<Card> = FrequencyTable::new();
        assert!(matches!(
            normalize(&empty),
            Err(ComparisonError::DegenerateInput)
        ));
    }

    #[test]
    fn self_divergence_is_zero() {
        let p = normalize(&table(&[(Two, 5), (Three, 1), (Queen, 9)])).unwrap();
        assert!(divergence(&p, &p, DEFAULT_EPSILON).unwrap().abs() < 1e-12);
    }

    #[test]
    fn divergence_is_asymmetric() {
        let p = normalize(&table(&[(Two, 9), (Three, 1)])).unwrap();
        let q = normalize(&table(&[(Two, 1), (Three, 1)])).unwrap();
        let pq = divergence(&p, &q, DEFAULT_EPSILON).unwrap();
        let qp = divergence(&q, &p, DEFAULT_EPSILON).unwrap();
        assert!((pq - 0.368_064).abs() < 1e-5, "{}", pq);
        assert!((qp - 0.510_826).abs() < 1e-5, "{}", qp);
        assert!(pq != qp);
    }

    #[test]
    fn missing_keys_are_floored_not_infinite() {
        let p = normalize(&table(&[(Two, 1), (Ace, 1)])).unwrap();
        let q = normalize(&table(&[(Two, 1)])).unwrap();
        let d = divergence(&p, &q, DEFAULT_EPSILON).unwrap();
        assert!(d.is_finite());
        assert!(d > 1.0);

        // Only the reference's mass counts, so a key the reference lacks adds almost nothing.
        let d_rev = divergence(&q, &p, DEFAULT_EPSILON).unwrap();
        assert!((d_rev - 2f64.ln()).abs() < 1e-6);
    }

    #[test]
    fn compare_reports_four_scores() {
        let a = uniform_report(1, 400, "a");
        let b = uniform_report(2, 400, "b");
        let comparison = compare(&a, &b, DEFAULT_EPSILON).unwrap();
        assert_eq!(comparison.reference, "a");
        assert_eq!(comparison.candidate, "b");
        assert!(comparison.scores().iter().all(|d| d.is_finite() && *d >= 0.0));
        // Two uniform runs only differ by sampling noise.
        assert!(comparison.player_cards.divergence < 0.1);

        let same = compare(&a, &a, DEFAULT_EPSILON).unwrap();
        assert!(same.scores().iter().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn compare_all_walks_every_ordered_pair() {
        let reports = vec![
            uniform_report(1, 50, "baseline"),
            uniform_report(2, 50, "deceptive"),
            uniform_report(3, 50, "fewshot"),
        ];
        let comparisons = compare_all(&reports, DEFAULT_EPSILON).unwrap();
        let pairs: Vec<(&str, &str)> = comparisons
            .iter()
            .map(|c| (c.reference.as_str(), c.candidate.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("baseline", "deceptive"),
                ("baseline", "fewshot"),
                ("deceptive", "fewshot")
            ]
        );
    }

    #[test]
    fn compare_rejects_empty_report() {
        let a = uniform_report(1, 10, "a");
        let empty = Batch::new().into_report(None);
        match compare(&a, &empty, DEFAULT_EPSILON).unwrap_err() {
            ComparisonError::EmptyTable { table, source } => {
                assert_eq!(table, "player card");
                assert!(matches!(*source, ComparisonError::DegenerateInput));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn epsilon_outside_unit_interval_is_rejected() {
        let p = normalize(&table(&[(Two, 1), (Ace, 1)])).unwrap();
        let q = normalize(&table(&[(Two, 1)])).unwrap();
        for epsilon in [0.0, -0.1, f64::NAN, 1.0] {
            assert!(matches!(
                divergence(&p, &q, epsilon),
                Err(ComparisonError::InvalidEpsilon(_))
            ));
        }

        let a = uniform_report(1, 20, "a");
        let b = uniform_report(2, 20, "b");
        assert!(matches!(
            compare(&a, &b, 0.0),
            Err(ComparisonError::InvalidEpsilon(_))
        ));
        assert!(matches!(
            compare_all(&[a, b], f64::NAN),
            Err(ComparisonError::InvalidEpsilon(_))
        ));
    }
}
