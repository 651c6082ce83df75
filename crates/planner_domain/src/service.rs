use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    config::EngineConfig,
    cycle::{Cycle, WeekWindow},
    error::RecurrenceParseError,
    layout::{self, LayoutSlot},
    merge,
    model::{Activity, CompletionRecord, Occurrence, ScheduleKind, WithdrawalRecord},
    progress::{self, ProgressReport},
    score::{self, AnalyticsMetrics, ScoreSettings},
    window::{self, DateWindow, ViewMode},
};

/// Activity row as exported by the storage layer, with the rule still in compact form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: String,
    pub title: String,
    pub schedule_kind: ScheduleKind,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub rule: Option<String>,
    pub anchor_date: NaiveDate,
    #[serde(default)]
    pub goal_id: Option<String>,
    #[serde(default)]
    pub weekly_target: Option<u32>,
}

impl TryFrom<ActivityRecord> for Activity {
    type Error = RecurrenceParseError;

    fn try_from(record: ActivityRecord) -> Result<Self, Self::Error> {
        let recurrence = match record.rule.as_deref().map(str::trim) {
            Some(rule) if !rule.is_empty() => Some(rule.parse()?),
            _ => None,
        };
        Ok(Activity {
            id: record.id,
            title: record.title,
            schedule_kind: record.schedule_kind,
            start_time: record.start_time,
            end_time: record.end_time,
            recurrence,
            anchor_date: record.anchor_date,
            goal_id: record.goal_id,
            weekly_target: record.weekly_target,
        })
    }
}

/// Serialized hand-over from the storage layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannerState {
    #[serde(default)]
    pub activities: Vec<ActivityRecord>,
    #[serde(default)]
    pub completions: Vec<CompletionRecord>,
    #[serde(default)]
    pub withdrawals: Vec<WithdrawalRecord>,
    #[serde(default)]
    pub tracked_relationships: Vec<String>,
}

impl PlannerState {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read planner state `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse planner state `{}`", path.display()))
    }
}

#[derive(Debug, Default)]
struct Records {
    activities: Vec<Activity>,
    completions: Vec<CompletionRecord>,
    withdrawals: Vec<WithdrawalRecord>,
    tracked_relationships: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayView {
    pub date: NaiveDate,
    pub all_day: Vec<Occurrence>,
    pub slots: Vec<LayoutSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleSnapshot {
    pub cycle: Cycle,
    pub weeks: Vec<WeekWindow>,
    pub current_week: Option<u32>,
    pub progress: ProgressReport,
    pub analytics: AnalyticsMetrics,
}

/// In-memory planner over already-fetched records. Every view is recomputed
/// from the records on request.
pub struct PlannerService {
    config: EngineConfig,
    records: RwLock<Records>,
}

pub struct PlannerServiceBuilder {
    config: EngineConfig,
    states: Vec<PlannerState>,
    state_files: Vec<PathBuf>,
}

impl PlannerServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::from_env(),
            states: Vec::new(),
            state_files: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_state(mut self, state: PlannerState) -> Self {
        self.states.push(state);
        self
    }

    pub fn add_state_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !self.state_files.contains(&path) {
            self.state_files.push(path);
        }
        self
    }

    pub fn build(self) -> Result<PlannerService> {
        let service = PlannerService {
            config: self.config,
            records: RwLock::new(Records::default()),
        };
        for state in self.states {
            service.import(state);
        }
        for path in &self.state_files {
            let state = PlannerState::load(path)?;
            service.import(state);
        }
        Ok(service)
    }
}

impl Default for PlannerServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlannerService {
    pub fn builder() -> PlannerServiceBuilder {
        PlannerServiceBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Adds the records of `state`. Activities whose rule cannot be parsed are
    /// skipped; the rest of the state is still imported.
    pub fn import(&self, state: PlannerState) {
        let mut records = self.records.write();
        let mut skipped = 0usize;
        for record in state.activities {
            let id = record.id.clone();
            match Activity::try_from(record) {
                Ok(activity) => upsert(&mut records.activities, activity),
                Err(err) => {
                    skipped += 1;
                    warn!(activity_id = %id, %err, "skipping activity with malformed recurrence");
                }
            }
        }
        for completion in state.completions {
            let exists = records
                .completions
                .iter()
                .any(|c| c.matches(&completion.activity_id, completion.date));
            if !exists {
                records.completions.push(completion);
            }
        }
        records.withdrawals.extend(state.withdrawals);
        for name in state.tracked_relationships {
            if !records.tracked_relationships.contains(&name) {
                records.tracked_relationships.push(name);
            }
        }
        info!(
            activities = records.activities.len(),
            completions = records.completions.len(),
            withdrawals = records.withdrawals.len(),
            skipped,
            "planner state imported"
        );
    }

    pub fn upsert_activity(&self, activity: Activity) {
        upsert(&mut self.records.write().activities, activity);
    }

    pub fn remove_activity(&self, activity_id: &str) -> Option<Activity> {
        let mut records = self.records.write();
        let idx = records.activities.iter().position(|a| a.id == activity_id)?;
        Some(records.activities.remove(idx))
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.records.read().activities.clone()
    }

    pub fn completions(&self) -> Vec<CompletionRecord> {
        self.records.read().completions.clone()
    }

    #[instrument(
        skip(self, completion),
        fields(activity_id = %completion.activity_id, date = %completion.date)
    )]
    pub fn record_completion(&self, completion: CompletionRecord) -> Result<()> {
        let mut records = self.records.write();
        anyhow::ensure!(
            records.activities.iter().any(|a| a.id == completion.activity_id),
            "unknown activity `{}`",
            completion.activity_id
        );
        anyhow::ensure!(
            !records
                .completions
                .iter()
                .any(|c| c.matches(&completion.activity_id, completion.date)),
            "`{}` is already completed on {}",
            completion.activity_id,
            completion.date
        );
        records.completions.push(completion);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn undo_completion(&self, activity_id: &str, date: NaiveDate) -> Result<CompletionRecord> {
        let mut records = self.records.write();
        let idx = records
            .completions
            .iter()
            .position(|c| c.matches(activity_id, date))
            .ok_or_else(|| anyhow!("no completion of `{}` on {}", activity_id, date))?;
        Ok(records.completions.remove(idx))
    }

    pub fn record_withdrawal(&self, withdrawal: WithdrawalRecord) {
        self.records.write().withdrawals.push(withdrawal);
    }

    pub fn window(&self, mode: ViewMode, anchor: NaiveDate) -> DateWindow {
        window::compute_window(mode, anchor, self.config.week_start)
    }

    pub fn occurrences(&self, window: DateWindow) -> Vec<Occurrence> {
        merge::occurrences_in(&self.records.read().activities, window)
    }

    pub fn month_markers(&self, anchor: NaiveDate) -> BTreeSet<NaiveDate> {
        let window = self.window(ViewMode::Month, anchor);
        merge::marked_dates(&self.records.read().activities, window)
    }

    #[instrument(skip(self))]
    pub fn day_view(&self, date: NaiveDate) -> Result<DayView> {
        let occurrences = merge::occurrences_on(&self.records.read().activities, date);
        let lanes = layout::split_for_layout(occurrences);
        let slots = layout::layout(&lanes.timed, self.config.min_block_minutes)
            .with_context(|| format!("unable to lay out {}", date))?;
        Ok(DayView {
            date,
            all_day: lanes.all_day,
            slots,
        })
    }

    pub fn cycle(&self, anchor: NaiveDate) -> Cycle {
        Cycle::new(anchor, self.config.week_start, self.config.cycle_weeks)
    }

    pub fn progress(&self, cycle: &Cycle) -> ProgressReport {
        let records = self.records.read();
        progress::aggregate(&records.activities, &records.completions, &cycle.weeks())
    }

    pub fn analytics(&self, cycle: &Cycle, today: NaiveDate) -> AnalyticsMetrics {
        let records = self.records.read();
        let settings = self.score_settings(&records);
        score::score(
            &records.completions,
            &records.withdrawals,
            &cycle.weeks(),
            today,
            &settings,
        )
    }

    #[instrument(skip(self))]
    pub fn cycle_snapshot(&self, anchor: NaiveDate, today: NaiveDate) -> CycleSnapshot {
        let cycle = self.cycle(anchor);
        let weeks = cycle.weeks();
        let records = self.records.read();
        let progress = progress::aggregate(&records.activities, &records.completions, &weeks);
        let settings = self.score_settings(&records);
        let analytics = score::score(
            &records.completions,
            &records.withdrawals,
            &weeks,
            today,
            &settings,
        );
        CycleSnapshot {
            current_week: cycle.week_index_of(today),
            cycle,
            weeks,
            progress,
            analytics,
        }
    }

    fn score_settings(&self, records: &Records) -> ScoreSettings {
        ScoreSettings {
            week_start: self.config.week_start,
            authentic_weekly_cap: self.config.authentic_weekly_cap,
            tracked_relationships: records.tracked_relationships.clone(),
            ..ScoreSettings::default()
        }
    }
}

fn upsert(activities: &mut Vec<Activity>, activity: Activity) {
    match activities.iter_mut().find(|a| a.id == activity.id) {
        Some(existing) => *existing = activity,
        None => activities.push(activity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RecurrenceSpec;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(id: &str, rule: Option<&str>) -> ActivityRecord {
        ActivityRecord {
            id: id.into(),
            title: id.into(),
            schedule_kind: ScheduleKind::Untimed,
            start_time: None,
            end_time: None,
            rule: rule.map(str::to_string),
            anchor_date: date(2024, 1, 1),
            goal_id: None,
            weekly_target: None,
        }
    }

    #[test]
    fn malformed_rule_only_skips_its_activity() {
        let service = PlannerService::builder()
            .with_state(PlannerState {
                activities: vec![
                    record("good", Some("FREQ=WEEKLY;BYDAY=MO")),
                    record("bad", Some("FREQ=HOURLY")),
                    record("once", None),
                ],
                ..PlannerState::default()
            })
            .build()
            .unwrap();
        let ids: Vec<String> = service.activities().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["good".to_string(), "once".to_string()]);
        assert_eq!(
            service.activities()[0].recurrence,
            Some(RecurrenceSpec::weekly([Weekday::Mon]))
        );
    }

    #[test]
    fn completions_are_unique_and_undoable() {
        let service = PlannerService::builder()
            .with_state(PlannerState {
                activities: vec![record("a", Some("FREQ=DAILY"))],
                ..PlannerState::default()
            })
            .build()
            .unwrap();
        let day = date(2024, 1, 2);
        service.record_completion(CompletionRecord::new("a", day)).unwrap();
        assert!(service.record_completion(CompletionRecord::new("a", day)).is_err());
        assert!(service
            .record_completion(CompletionRecord::new("missing", day))
            .is_err());

        let removed = service.undo_completion("a", day).unwrap();
        assert_eq!(removed.date, day);
        assert!(service.completions().is_empty());
        assert!(service.undo_completion("a", day).is_err());
    }

    #[test]
    fn day_view_splits_lanes_and_lays_out_blocks() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let half_ten = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        let half_nine = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let day = date(2024, 1, 3);

        let service = PlannerService::builder().build().unwrap();
        service.upsert_activity(Activity::timed("a", "Standup", day, nine, ten));
        service.upsert_activity(Activity::timed("b", "Review", day, half_nine, half_ten));
        service.upsert_activity(
            Activity::untimed("c", "Journal", day).with_recurrence(RecurrenceSpec::daily()),
        );

        let view = service.day_view(day).unwrap();
        assert_eq!(view.all_day.len(), 1);
        let columns: Vec<(usize, usize)> =
            view.slots.iter().map(|s| (s.column, s.column_count)).collect();
        assert_eq!(columns, vec![(0, 2), (1, 2)]);

        service.upsert_activity(Activity::timed("b", "Review", day, half_ten, half_nine));
        assert!(service.day_view(day).is_err());
        assert!(service.remove_activity("b").is_some());
        assert!(service.day_view(day).is_ok());
    }
}
