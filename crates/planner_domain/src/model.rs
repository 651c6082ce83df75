use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::recurrence::RecurrenceSpec;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }

    /// Number of days `day` lies after the start of its week.
    pub fn offset_of(self, day: Weekday) -> u32 {
        (day.num_days_from_monday() + 7 - self.weekday().num_days_from_monday()) % 7
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sun" | "sunday" => Some(WeekStart::Sunday),
            "mon" | "monday" => Some(WeekStart::Monday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Timed,
    Untimed,
}

/// A planned activity as handed over by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub schedule_kind: ScheduleKind,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceSpec>,
    pub anchor_date: NaiveDate,
    #[serde(default)]
    pub goal_id: Option<String>,
    /// Overrides the per-week target otherwise derived from the recurrence.
    #[serde(default)]
    pub weekly_target: Option<u32>,
}

impl Activity {
    pub fn timed(
        id: impl Into<String>,
        title: impl Into<String>,
        anchor_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            schedule_kind: ScheduleKind::Timed,
            start_time: Some(start_time),
            end_time: Some(end_time),
            recurrence: None,
            anchor_date,
            goal_id: None,
            weekly_target: None,
        }
    }

    pub fn untimed(
        id: impl Into<String>,
        title: impl Into<String>,
        anchor_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            schedule_kind: ScheduleKind::Untimed,
            start_time: None,
            end_time: None,
            recurrence: None,
            anchor_date,
            goal_id: None,
            weekly_target: None,
        }
    }

    pub fn with_recurrence(mut self, spec: RecurrenceSpec) -> Self {
        self.recurrence = Some(spec);
        self
    }

    pub fn with_goal(mut self, goal_id: impl Into<String>) -> Self {
        self.goal_id = Some(goal_id.into());
        self
    }

    pub fn with_weekly_target(mut self, target: u32) -> Self {
        self.weekly_target = Some(target);
        self
    }

    pub fn is_untimed(&self) -> bool {
        self.schedule_kind == ScheduleKind::Untimed
    }

    pub fn occurrence_on(&self, date: NaiveDate) -> Occurrence {
        let untimed = self.is_untimed();
        Occurrence {
            activity_id: self.id.clone(),
            date,
            start_time: if untimed { None } else { self.start_time },
            end_time: if untimed { None } else { self.end_time },
            is_untimed: untimed,
        }
    }
}

/// One materialized instance of an activity on a calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub activity_id: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_untimed: bool,
}

impl Occurrence {
    pub fn key(&self) -> (&str, NaiveDate) {
        (self.activity_id.as_str(), self.date)
    }
}

impl PartialEq for Occurrence {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Occurrence {}

/// A completed occurrence. Tags feed the score calculator only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub activity_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_authentic: bool,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub goal_linked: bool,
}

impl CompletionRecord {
    pub fn new(activity_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            activity_id: activity_id.into(),
            date,
            is_authentic: false,
            is_urgent: false,
            is_important: false,
            roles: Vec::new(),
            domains: Vec::new(),
            relationships: Vec::new(),
            goal_linked: false,
        }
    }

    pub fn authentic(mut self) -> Self {
        self.is_authentic = true;
        self
    }

    pub fn with_priority(mut self, urgent: bool, important: bool) -> Self {
        self.is_urgent = urgent;
        self.is_important = important;
        self
    }

    pub fn matches(&self, activity_id: &str, date: NaiveDate) -> bool {
        self.activity_id == activity_id && self.date == date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WithdrawalRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

impl WithdrawalRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, note: None }
    }
}
