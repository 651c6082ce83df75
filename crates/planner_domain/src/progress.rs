use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cycle::WeekWindow;
use crate::model::{Activity, CompletionRecord};
use crate::recurrence::expand_dates;

/// `round(100 * numerator / denominator)` rounding halves up; `0` when the denominator is zero.
pub fn round_percent(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let scaled = (200 * numerator + denominator) / (2 * denominator);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Progress of one activity in one week. `actual` is already capped at `target`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyProgress {
    pub activity_id: String,
    pub week_index: u32,
    pub actual: u32,
    pub target: u32,
    /// Completions recorded in the week, including any beyond the target.
    pub recorded: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityProgress {
    pub activity_id: String,
    pub actual: u32,
    pub target: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalProgress {
    pub goal_id: String,
    pub actual: u32,
    pub target: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeekProgress {
    pub week_index: u32,
    pub actual: u32,
    pub target: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CycleProgress {
    pub total_actual_capped: u32,
    pub total_target: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProgressReport {
    /// One entry per (activity, week), activities in input order, weeks ascending.
    pub weekly: Vec<WeeklyProgress>,
    pub activities: Vec<ActivityProgress>,
    pub goals: Vec<GoalProgress>,
    pub weeks: Vec<WeekProgress>,
    pub cycle: CycleProgress,
}

impl ProgressReport {
    pub fn weekly_for(&self, activity_id: &str, week_index: u32) -> Option<&WeeklyProgress> {
        self.weekly
            .iter()
            .find(|entry| entry.activity_id == activity_id && entry.week_index == week_index)
    }

    pub fn activity(&self, activity_id: &str) -> Option<&ActivityProgress> {
        self.activities
            .iter()
            .find(|entry| entry.activity_id == activity_id)
    }

    pub fn goal(&self, goal_id: &str) -> Option<&GoalProgress> {
        self.goals.iter().find(|entry| entry.goal_id == goal_id)
    }
}

/// Per-week target of `activity`: the explicit weekly target for weeks the
/// activity exists in, otherwise the number of its occurrences in the week.
pub fn weekly_target(activity: &Activity, week: &WeekWindow) -> u32 {
    match activity.weekly_target {
        Some(target) if week.end >= activity.anchor_date => target,
        Some(_) => 0,
        None => {
            let dates =
                expand_dates(activity.recurrence.as_ref(), activity.anchor_date, week.window());
            u32::try_from(dates.len()).unwrap_or(u32::MAX)
        }
    }
}

#[derive(Default)]
struct Tally {
    actual: u32,
    target: u32,
}

impl Tally {
    fn add(&mut self, actual: u32, target: u32) {
        self.actual = self.actual.saturating_add(actual);
        self.target = self.target.saturating_add(target);
    }

    fn percentage(&self) -> u32 {
        round_percent(self.actual.into(), self.target.into())
    }
}

/// Counts completions per activity and week, caps each count at its target and
/// only then sums into the activity, goal, week and cycle rollups.
pub fn aggregate(
    activities: &[Activity],
    completions: &[CompletionRecord],
    weeks: &[WeekWindow],
) -> ProgressReport {
    let mut dates_by_activity: HashMap<&str, Vec<NaiveDate>> = HashMap::new();
    for record in completions {
        dates_by_activity
            .entry(record.activity_id.as_str())
            .or_default()
            .push(record.date);
    }

    let mut report = ProgressReport::default();
    let mut week_tallies: Vec<Tally> = weeks.iter().map(|_| Tally::default()).collect();
    let mut goal_tallies: Vec<(String, Tally)> = Vec::new();
    let mut cycle = Tally::default();

    for activity in activities {
        let done = dates_by_activity
            .get(activity.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut activity_tally = Tally::default();

        for (slot, week) in weeks.iter().enumerate() {
            let recorded = done.iter().filter(|date| week.contains(**date)).count();
            let recorded = u32::try_from(recorded).unwrap_or(u32::MAX);
            let target = weekly_target(activity, week);
            let actual = recorded.min(target);

            activity_tally.add(actual, target);
            week_tallies[slot].add(actual, target);
            report.weekly.push(WeeklyProgress {
                activity_id: activity.id.clone(),
                week_index: week.index,
                actual,
                target,
                recorded,
            });
        }

        if let Some(goal_id) = &activity.goal_id {
            match goal_tallies.iter_mut().find(|(id, _)| id == goal_id) {
                Some((_, tally)) => tally.add(activity_tally.actual, activity_tally.target),
                None => {
                    let mut tally = Tally::default();
                    tally.add(activity_tally.actual, activity_tally.target);
                    goal_tallies.push((goal_id.clone(), tally));
                }
            }
        }

        cycle.add(activity_tally.actual, activity_tally.target);
        report.activities.push(ActivityProgress {
            activity_id: activity.id.clone(),
            actual: activity_tally.actual,
            target: activity_tally.target,
            percentage: activity_tally.percentage(),
        });
    }

    report.weeks = weeks
        .iter()
        .zip(&week_tallies)
        .map(|(week, tally)| WeekProgress {
            week_index: week.index,
            actual: tally.actual,
            target: tally.target,
            percentage: tally.percentage(),
        })
        .collect();
    report.goals = goal_tallies
        .into_iter()
        .map(|(goal_id, tally)| GoalProgress {
            goal_id,
            actual: tally.actual,
            target: tally.target,
            percentage: tally.percentage(),
        })
        .collect();
    report.cycle = CycleProgress {
        total_actual_capped: cycle.actual,
        total_target: cycle.target,
        percentage: cycle.percentage(),
    };

    debug!(
        activities = activities.len(),
        weeks = weeks.len(),
        percentage = report.cycle.percentage,
        "aggregated cycle progress"
    );
    report
}
