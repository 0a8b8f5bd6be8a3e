use std::collections::BTreeMap;
use std::ops::Add;

use itertools::Itertools;

use crate::model::entity::{Player, Points, Position, Price};
use crate::model::sample::SimulationSample;
use crate::model::squad::Squad;

/// Buckets reported even when empty.
pub const MIN_BUCKETS: usize = 10;

/// Fewer samples than this yield no percentiles for a bucket.
pub const MIN_BUCKET_SAMPLES: usize = 5;

pub const PERCENTILE_RANKS: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Premium,
    Mid,
    Budget,
}

#[derive(Debug, Clone, Copy)]
enum PremiumRule {
    Exactly(Price),
    AtLeast(Price),
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    premium: PremiumRule,
    /// Anything strictly above this (and not premium) is mid tier.
    budget_ceiling: Price,
}

const fn thresholds(position: Position) -> Thresholds {
    match position {
        Position::Goalkeeper => Thresholds { premium: PremiumRule::Exactly(60), budget_ceiling: 45 },
        Position::Defender => Thresholds { premium: PremiumRule::AtLeast(65), budget_ceiling: 50 },
        Position::Midfielder => Thresholds { premium: PremiumRule::AtLeast(90), budget_ceiling: 65 },
        Position::Forward => Thresholds { premium: PremiumRule::AtLeast(90), budget_ceiling: 65 },
    }
}

pub fn tier_of(player: &Player) -> Tier {
    let table = thresholds(player.position);
    let premium = match table.premium {
        PremiumRule::Exactly(price) => player.price == price,
        PremiumRule::AtLeast(price) => player.price >= price,
    };
    if premium {
        Tier::Premium
    } else if player.price > table.budget_ceiling {
        Tier::Mid
    } else {
        Tier::Budget
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierCounts {
    pub premium: usize,
    pub mid: usize,
    pub budget: usize,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.premium + self.mid + self.budget
    }
}

impl From<Tier> for TierCounts {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Premium => TierCounts { premium: 1, ..TierCounts::default() },
            Tier::Mid => TierCounts { mid: 1, ..TierCounts::default() },
            Tier::Budget => TierCounts { budget: 1, ..TierCounts::default() },
        }
    }
}

impl Add for TierCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        TierCounts {
            premium: self.premium + rhs.premium,
            mid: self.mid + rhs.mid,
            budget: self.budget + rhs.budget,
        }
    }
}

pub fn classify(squad: &Squad) -> TierCounts {
    squad
        .players()
        .iter()
        .map(|player| TierCounts::from(tier_of(player)))
        .fold(TierCounts::default(), Add::add)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Percentiles {
    pub p5: Points,
    pub p25: Points,
    pub p50: Points,
    pub p75: Points,
    pub p95: Points,
}

impl Percentiles {
    pub fn to_array(self) -> [Points; 5] {
        [self.p5, self.p25, self.p50, self.p75, self.p95]
    }
}

/// Sorts `values` in place. `None` below [`MIN_BUCKET_SAMPLES`].
pub fn percentiles(values: &mut [Points]) -> Option<Percentiles> {
    if values.len() < MIN_BUCKET_SAMPLES {
        return None;
    }
    values.sort_unstable();
    let n = values.len();
    let at = |rank: f64| values[((rank * n as f64).floor() as usize).min(n - 1)];
    let [p5, p25, p50, p75, p95] = PERCENTILE_RANKS.map(at);
    Some(Percentiles { p5, p25, p50, p75, p95 })
}

pub type Summary = BTreeMap<usize, Option<Percentiles>>;

/// Keys run from 0 up to the larger of the highest observed premium count
/// and `MIN_BUCKETS - 1`; sparse buckets map to `None`.
pub fn summarize(samples: &[SimulationSample]) -> Summary {
    let mut buckets = samples
        .iter()
        .map(|sample| (sample.premium_count(), sample.total_points))
        .into_group_map();
    let top = buckets.keys().copied().max().unwrap_or(0).max(MIN_BUCKETS - 1);
    (0..=top)
        .map(|key| {
            let summary = buckets.get_mut(&key).and_then(|points| percentiles(points));
            (key, summary)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceCurve {
    points_by_price: BTreeMap<Price, Vec<Points>>,
}

impl PriceCurve {
    pub fn merge(&mut self, samples: &[SimulationSample]) {
        for sample in samples {
            self.points_by_price
                .entry(sample.total_price)
                .or_default()
                .push(sample.total_points);
        }
    }

    pub fn len(&self) -> usize {
        self.points_by_price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_by_price.is_empty()
    }

    pub fn points_at(&self, price: Price) -> &[Points] {
        self.points_by_price.get(&price).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mean points per price, in ascending price order.
    pub fn averages(&self) -> Vec<(Price, f64)> {
        self.points_by_price
            .iter()
            .map(|(price, points)| {
                let mean = points.iter().map(|&p| p as f64).sum::<f64>() / points.len() as f64;
                (*price, mean)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::Id;
    use crate::model::squad::SLOTS;
    use proptest::prelude::*;

    fn player(id: Id, position: Position, price: Price) -> Player {
        Player {
            id,
            first_name: "Test".into(),
            last_name: format!("P{id}"),
            position,
            team: "TST".into(),
            price,
        }
    }

    fn squad_with_prices(prices: &[Price; 15]) -> Squad {
        let players = SLOTS
            .iter()
            .flat_map(|(position, range)| range.clone().map(move |i| (i, *position)))
            .map(|(i, position)| player(i as Id, position, prices[i]))
            .collect();
        Squad::from_players(players).unwrap()
    }

    fn sample(premium: usize, points: Points) -> SimulationSample {
        SimulationSample {
            total_price: 950,
            total_points: points,
            tiers: TierCounts { premium, mid: 0, budget: 15 - premium },
        }
    }

    #[test]
    fn goalkeeper_premium_is_exact_price() {
        assert_eq!(tier_of(&player(1, Position::Goalkeeper, 60)), Tier::Premium);
        assert_eq!(tier_of(&player(1, Position::Goalkeeper, 65)), Tier::Mid);
        assert_eq!(tier_of(&player(1, Position::Goalkeeper, 50)), Tier::Mid);
        assert_eq!(tier_of(&player(1, Position::Goalkeeper, 45)), Tier::Budget);
    }

    #[test]
    fn outfield_thresholds() {
        assert_eq!(tier_of(&player(1, Position::Defender, 65)), Tier::Premium);
        assert_eq!(tier_of(&player(1, Position::Defender, 51)), Tier::Mid);
        assert_eq!(tier_of(&player(1, Position::Defender, 50)), Tier::Budget);
        assert_eq!(tier_of(&player(1, Position::Midfielder, 90)), Tier::Premium);
        assert_eq!(tier_of(&player(1, Position::Midfielder, 89)), Tier::Mid);
        assert_eq!(tier_of(&player(1, Position::Forward, 65)), Tier::Budget);
        assert_eq!(tier_of(&player(1, Position::Forward, 120)), Tier::Premium);
    }

    #[test]
    fn classify_counts_whole_squad() {
        let mut prices = [45; 15];
        prices[0] = 60; // premium keeper
        prices[2] = 70; // premium defender
        prices[8] = 80; // mid midfielder
        prices[12] = 100; // premium forward
        let counts = classify(&squad_with_prices(&prices));
        assert_eq!(counts, TierCounts { premium: 3, mid: 1, budget: 11 });
    }

    #[test]
    fn percentiles_need_five_values() {
        let mut empty: Vec<Points> = Vec::new();
        assert_eq!(percentiles(&mut [1, 2, 3, 4]), None);
        assert_eq!(percentiles(&mut empty), None);
    }

    #[test]
    fn percentiles_of_five_are_the_values() {
        let got = percentiles(&mut [50, 10, 40, 20, 30]).unwrap();
        assert_eq!(got.to_array(), [10, 20, 30, 40, 50]);
    }

    #[test]
    fn percentiles_use_floor_index() {
        let mut values: Vec<Points> = (1..=100).rev().collect();
        let got = percentiles(&mut values).unwrap();
        assert_eq!(got.to_array(), [6, 26, 51, 76, 96]);
    }

    #[test]
    fn summarize_buckets_by_premium_count() {
        let mut samples: Vec<SimulationSample> = (0..6).map(|i| sample(2, 100 + i)).collect();
        samples.extend((0..3).map(|i| sample(4, 200 + i)));
        samples.push(sample(12, 300));

        let summary = summarize(&samples);
        assert_eq!(summary.len(), 13);
        assert_eq!(summary[&2].unwrap().to_array(), [100, 101, 103, 104, 105]);
        assert_eq!(summary[&4], None);
        assert_eq!(summary[&0], None);
        assert_eq!(summary[&12], None);
    }

    #[test]
    fn summarize_always_reports_minimum_buckets() {
        let summary = summarize(&[]);
        assert_eq!(summary.keys().copied().collect::<Vec<_>>(), (0..MIN_BUCKETS).collect::<Vec<_>>());
    }

    #[test]
    fn price_curve_averages() {
        let mut curve = PriceCurve::default();
        let mut a = sample(0, 100);
        a.total_price = 900;
        let mut b = sample(0, 200);
        b.total_price = 900;
        let mut c = sample(0, 50);
        c.total_price = 950;
        curve.merge(&[a, b]);
        curve.merge(&[c]);
        assert_eq!(curve.averages(), vec![(900, 150.0), (950, 50.0)]);
        assert_eq!(curve.points_at(900), &[100, 200]);
        assert!(curve.points_at(1000).is_empty());
    }

    proptest! {
        #[test]
        fn classification_is_deterministic_and_exhaustive(prices in prop::array::uniform15(35u32..130)) {
            let first = classify(&squad_with_prices(&prices));
            let second = classify(&squad_with_prices(&prices));
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.total(), 15);
        }
    }
}
