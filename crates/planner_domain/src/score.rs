use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_AUTHENTIC_WEEKLY_CAP;
use crate::cycle::WeekWindow;
use crate::model::{CompletionRecord, WeekStart, WithdrawalRecord};
use crate::progress::round_percent;
use crate::window::{align_to_week_start, DateWindow};

/// Points a single deposit earns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PointWeights {
    pub per_tag: f64,
    pub authentic: f64,
    pub urgent_important: f64,
    pub important: f64,
    pub urgent: f64,
    pub neither: f64,
    pub goal_linked: f64,
}

impl Default for PointWeights {
    fn default() -> Self {
        Self {
            per_tag: 1.0,
            authentic: 2.0,
            urgent_important: 1.5,
            important: 3.0,
            urgent: 1.0,
            neither: 0.5,
            goal_linked: 2.0,
        }
    }
}

/// Relative weights of the composite score. `relationships` only counts when
/// relationship tracking applies; otherwise the rest are scaled up to fill it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositeWeights {
    pub balance: u32,
    pub consistency: u32,
    pub authentic: u32,
    pub priority: u32,
    pub relationships: u32,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            balance: 25,
            consistency: 25,
            authentic: 20,
            priority: 20,
            relationships: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreSettings {
    pub week_start: WeekStart,
    pub authentic_weekly_cap: u32,
    pub points: PointWeights,
    pub composite: CompositeWeights,
    /// Relationships the user tracks; empty disables the distribution metric.
    pub tracked_relationships: Vec<String>,
}

impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Sunday,
            authentic_weekly_cap: DEFAULT_AUTHENTIC_WEEKLY_CAP,
            points: PointWeights::default(),
            composite: CompositeWeights::default(),
            tracked_relationships: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QuadrantCounts {
    pub urgent_important: u32,
    pub important: u32,
    pub urgent: u32,
    pub neither: u32,
}

impl QuadrantCounts {
    fn record(&mut self, deposit: &CompletionRecord) {
        let bucket = match (deposit.is_urgent, deposit.is_important) {
            (true, true) => &mut self.urgent_important,
            (false, true) => &mut self.important,
            (true, false) => &mut self.urgent,
            (false, false) => &mut self.neither,
        };
        *bucket += 1;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AnalyticsMetrics {
    pub deposits: u32,
    pub withdrawals: u32,
    pub total_points: f64,
    pub net_balance: u32,
    pub consistency: u32,
    /// Authentic deposits after the weekly cap.
    pub authentic_counted: u32,
    pub authentic_ratio: u32,
    pub weekly_streak: u32,
    pub quadrants: QuadrantCounts,
    /// Share of deposits that were important but not urgent.
    pub priority_mix: u32,
    pub relationship_distribution: Option<u32>,
    pub composite_score: u32,
}

pub fn deposit_points(deposit: &CompletionRecord, weights: &PointWeights) -> f64 {
    let tags = (deposit.roles.len() + deposit.domains.len()) as f64;
    let mut points = tags * weights.per_tag;
    if deposit.is_authentic {
        points += weights.authentic;
    }
    points += match (deposit.is_urgent, deposit.is_important) {
        (true, true) => weights.urgent_important,
        (false, true) => weights.important,
        (true, false) => weights.urgent,
        (false, false) => weights.neither,
    };
    if deposit.goal_linked {
        points += weights.goal_linked;
    }
    points
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn range_of(weeks: &[WeekWindow]) -> Option<DateWindow> {
    let first = weeks.iter().map(|w| w.start).min()?;
    let last = weeks.iter().map(|w| w.end).max()?;
    Some(DateWindow::new(first, last))
}

/// Unrounded share `numerator / denominator`. Rounded only when exposed.
#[derive(Debug, Clone, Copy)]
struct Ratio {
    numerator: u64,
    denominator: u64,
}

impl Ratio {
    fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    fn percent(self) -> u32 {
        round_percent(self.numerator, self.denominator)
    }

    fn as_percent_f64(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        100.0 * self.numerator as f64 / self.denominator as f64
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Consecutive calendar weeks with at least one deposit, counting back from
/// the week holding `today`. An empty current week ends the streak at zero.
pub fn weekly_streak(
    completions: &[CompletionRecord],
    today: NaiveDate,
    week_start: WeekStart,
) -> u32 {
    let active: HashSet<NaiveDate> = completions
        .iter()
        .map(|deposit| align_to_week_start(deposit.date, week_start))
        .collect();
    let mut streak = 0;
    let mut cursor = align_to_week_start(today, week_start);
    while active.contains(&cursor) {
        streak += 1;
        match cursor.checked_sub_signed(Duration::weeks(1)) {
            Some(previous) => cursor = previous,
            None => break,
        }
    }
    streak
}

/// Recomputes every analytics metric from the raw records.
///
/// Deposits and withdrawals are limited to the span of `weeks` (all records
/// count when `weeks` is empty). The streak looks at every deposit.
pub fn score(
    completions: &[CompletionRecord],
    withdrawals: &[WithdrawalRecord],
    weeks: &[WeekWindow],
    today: NaiveDate,
    settings: &ScoreSettings,
) -> AnalyticsMetrics {
    let range = range_of(weeks);
    let in_range = |date: NaiveDate| range.map_or(true, |r| r.contains(date));
    let deposits: Vec<&CompletionRecord> =
        completions.iter().filter(|d| in_range(d.date)).collect();
    let withdrawal_count = count(withdrawals.iter().filter(|w| in_range(w.date)).count());
    let deposit_count = count(deposits.len());

    let mut metrics = AnalyticsMetrics {
        deposits: deposit_count,
        withdrawals: withdrawal_count,
        ..AnalyticsMetrics::default()
    };

    let points: f64 = deposits
        .iter()
        .map(|deposit| deposit_points(deposit, &settings.points))
        .sum();
    metrics.total_points = round_tenth(points);

    let balance = Ratio::new(
        deposit_count.into(),
        u64::from(deposit_count) + u64::from(withdrawal_count),
    );
    metrics.net_balance = balance.percent();

    let active_weeks = weeks
        .iter()
        .filter(|week| deposits.iter().any(|deposit| week.contains(deposit.date)))
        .count();
    let consistency = Ratio::new(active_weeks as u64, weeks.len() as u64);
    metrics.consistency = consistency.percent();

    let mut authentic_per_week: HashMap<NaiveDate, u32> = HashMap::new();
    for deposit in deposits.iter().filter(|d| d.is_authentic) {
        *authentic_per_week
            .entry(align_to_week_start(deposit.date, settings.week_start))
            .or_default() += 1;
    }
    metrics.authentic_counted = authentic_per_week
        .values()
        .map(|n| (*n).min(settings.authentic_weekly_cap))
        .sum();
    let authentic = Ratio::new(metrics.authentic_counted.into(), deposit_count.into());
    metrics.authentic_ratio = authentic.percent();

    metrics.weekly_streak = weekly_streak(completions, today, settings.week_start);

    for deposit in &deposits {
        metrics.quadrants.record(deposit);
    }
    let priority = Ratio::new(metrics.quadrants.important.into(), deposit_count.into());
    metrics.priority_mix = priority.percent();

    let weights = &settings.composite;
    let mut parts = vec![
        (weights.balance, balance),
        (weights.consistency, consistency),
        (weights.authentic, authentic),
        (weights.priority, priority),
    ];
    if !settings.tracked_relationships.is_empty() {
        let tracked: HashSet<&str> = settings
            .tracked_relationships
            .iter()
            .map(String::as_str)
            .collect();
        let touched: HashSet<&str> = deposits
            .iter()
            .flat_map(|deposit| deposit.relationships.iter().map(String::as_str))
            .filter(|name| tracked.contains(name))
            .collect();
        let distribution = Ratio::new(touched.len() as u64, tracked.len() as u64);
        metrics.relationship_distribution = Some(distribution.percent());
        parts.push((weights.relationships, distribution));
    }

    metrics.composite_score = composite(&parts);
    metrics
}

/// Weighted mean of the unrounded component ratios, rounded half up once.
fn composite(parts: &[(u32, Ratio)]) -> u32 {
    let total_weight: f64 = parts.iter().map(|(w, _)| f64::from(*w)).sum();
    if total_weight == 0.0 {
        return 0;
    }
    let weighted: f64 = parts
        .iter()
        .map(|(w, ratio)| f64::from(*w) * ratio.as_percent_f64())
        .sum();
    (weighted / total_weight).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::{generate, Cycle};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weeks(count: u32) -> Vec<WeekWindow> {
        // 2024-01-07 is a Sunday.
        generate(&Cycle::new(date(2024, 1, 7), WeekStart::Sunday, count))
    }

    fn deposit(d: NaiveDate) -> CompletionRecord {
        CompletionRecord::new("a", d)
    }

    #[test]
    fn deposit_points_add_up() {
        let mut record = deposit(date(2024, 1, 8)).authentic().with_priority(false, true);
        record.roles = vec!["parent".into()];
        record.domains = vec!["health".into(), "mind".into()];
        record.goal_linked = true;
        assert_eq!(deposit_points(&record, &PointWeights::default()), 10.0);

        let plain = deposit(date(2024, 1, 8));
        assert_eq!(deposit_points(&plain, &PointWeights::default()), 0.5);
        let both = deposit(date(2024, 1, 8)).with_priority(true, true);
        assert_eq!(deposit_points(&both, &PointWeights::default()), 1.5);
    }

    #[test]
    fn total_points_round_to_one_decimal() {
        let weights = PointWeights {
            neither: 0.33,
            ..PointWeights::default()
        };
        let settings = ScoreSettings {
            points: weights,
            ..ScoreSettings::default()
        };
        let records = vec![deposit(date(2024, 1, 8)), deposit(date(2024, 1, 9))];
        let metrics = score(&records, &[], &weeks(1), date(2024, 1, 9), &settings);
        assert_eq!(metrics.total_points, 0.7);
    }

    #[test]
    fn authentic_deposits_are_capped_per_week() {
        let records: Vec<CompletionRecord> = (0..15)
            .map(|i| deposit(date(2024, 1, 7 + (i % 7))).authentic())
            .collect();
        let metrics = score(&records, &[], &weeks(1), date(2024, 1, 13), &ScoreSettings::default());
        assert_eq!(metrics.deposits, 15);
        assert_eq!(metrics.authentic_counted, 14);
        assert_eq!(metrics.authentic_ratio, 93);
    }

    #[test]
    fn balance_and_consistency() {
        let records = vec![
            deposit(date(2024, 1, 8)),
            deposit(date(2024, 1, 9)),
            deposit(date(2024, 1, 22)),
        ];
        let withdrawals = vec![WithdrawalRecord::new(date(2024, 1, 10))];
        let settings = ScoreSettings::default();
        let metrics = score(&records, &withdrawals, &weeks(4), date(2024, 1, 30), &settings);
        assert_eq!(metrics.net_balance, 75);
        assert_eq!(metrics.consistency, 50);
    }

    #[test]
    fn empty_inputs_score_zero() {
        let metrics = score(&[], &[], &[], date(2024, 1, 1), &ScoreSettings::default());
        assert_eq!(metrics.net_balance, 0);
        assert_eq!(metrics.consistency, 0);
        assert_eq!(metrics.authentic_ratio, 0);
        assert_eq!(metrics.composite_score, 0);
        assert_eq!(metrics.relationship_distribution, None);
    }

    #[test]
    fn records_outside_the_weeks_are_ignored() {
        let records = vec![deposit(date(2024, 1, 8)), deposit(date(2023, 12, 1))];
        let withdrawals = vec![WithdrawalRecord::new(date(2025, 1, 1))];
        let settings = ScoreSettings::default();
        let metrics = score(&records, &withdrawals, &weeks(1), date(2024, 1, 8), &settings);
        assert_eq!(metrics.deposits, 1);
        assert_eq!(metrics.withdrawals, 0);
        assert_eq!(metrics.net_balance, 100);
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let records = vec![
            deposit(date(2024, 1, 30)),
            deposit(date(2024, 1, 23)),
            deposit(date(2024, 1, 15)),
            deposit(date(2024, 1, 2)),
        ];
        assert_eq!(weekly_streak(&records, date(2024, 2, 1), WeekStart::Sunday), 3);
        assert_eq!(weekly_streak(&records, date(2024, 2, 5), WeekStart::Sunday), 0);
    }

    #[test]
    fn composite_redistributes_missing_relationship_weight() {
        let records = vec![
            deposit(date(2024, 1, 8)).authentic().with_priority(false, true),
            deposit(date(2024, 1, 15)).with_priority(true, false),
        ];
        let metrics = score(&records, &[], &weeks(2), date(2024, 1, 16), &ScoreSettings::default());
        // balance 100, consistency 100, authentic 50, priority 50
        assert_eq!(metrics.priority_mix, 50);
        assert_eq!(metrics.composite_score, 78);

        let mut tagged = records.clone();
        tagged[0].relationships = vec!["Sam".into(), "Unlisted".into()];
        let settings = ScoreSettings {
            tracked_relationships: vec!["Sam".into(), "Alex".into(), "Kim".into(), "Lee".into()],
            ..ScoreSettings::default()
        };
        let metrics = score(&tagged, &[], &weeks(2), date(2024, 1, 16), &settings);
        assert_eq!(metrics.relationship_distribution, Some(25));
        // (25*100 + 25*100 + 20*50 + 20*50 + 10*25) / 100 = 72.5
        assert_eq!(metrics.composite_score, 73);
    }

    #[test]
    fn composite_rounds_the_exact_mean_once() {
        let records = vec![deposit(date(2024, 1, 8))];
        let withdrawals = vec![
            WithdrawalRecord::new(date(2024, 1, 9)),
            WithdrawalRecord::new(date(2024, 1, 10)),
        ];
        let settings = ScoreSettings::default();
        let metrics = score(&records, &withdrawals, &weeks(3), date(2024, 1, 10), &settings);
        assert_eq!(metrics.net_balance, 33);
        assert_eq!(metrics.consistency, 33);
        // (25 * 100/3 + 25 * 100/3) / 90 = 18.52; the rounded parts give 18.
        assert_eq!(metrics.composite_score, 19);
    }

    #[test]
    fn scoring_is_repeatable() {
        let records = vec![deposit(date(2024, 1, 8)).authentic()];
        let settings = ScoreSettings::default();
        let first = score(&records, &[], &weeks(2), date(2024, 1, 9), &settings);
        let second = score(&records, &[], &weeks(2), date(2024, 1, 9), &settings);
        assert_eq!(first, second);
    }
}
