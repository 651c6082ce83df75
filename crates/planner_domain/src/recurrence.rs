use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::RecurrenceParseError;
use crate::model::{Activity, Occurrence};
use crate::window::DateWindow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
}

/// Compact recurrence rule attached to an activity. Never mutated; a schedule
/// change produces a new spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RecurrenceSpecRecord")]
pub struct RecurrenceSpec {
    pub frequency: Frequency,
    #[serde(default)]
    by_day: Vec<Weekday>,
    #[serde(default)]
    pub until: Option<NaiveDate>,
}

/// Wire shape of [`RecurrenceSpec`]; weekdays are normalized on the way in.
#[derive(Deserialize)]
struct RecurrenceSpecRecord {
    frequency: Frequency,
    #[serde(default)]
    by_day: Vec<Weekday>,
    #[serde(default)]
    until: Option<NaiveDate>,
}

impl From<RecurrenceSpecRecord> for RecurrenceSpec {
    fn from(record: RecurrenceSpecRecord) -> Self {
        RecurrenceSpec::from_parts(record.frequency, record.by_day, record.until)
    }
}

impl RecurrenceSpec {
    fn from_parts(frequency: Frequency, by_day: Vec<Weekday>, until: Option<NaiveDate>) -> Self {
        let by_day = match frequency {
            Frequency::Daily => Vec::new(),
            Frequency::Weekly => normalize_days(by_day),
        };
        Self {
            frequency,
            by_day,
            until,
        }
    }

    pub fn daily() -> Self {
        Self {
            frequency: Frequency::Daily,
            by_day: Vec::new(),
            until: None,
        }
    }

    pub fn weekly(days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            frequency: Frequency::Weekly,
            by_day: normalize_days(days),
            until: None,
        }
    }

    pub fn until(mut self, last: NaiveDate) -> Self {
        self.until = Some(last);
        self
    }

    /// Weekdays of a weekly rule, Monday first, without duplicates.
    pub fn by_day(&self) -> &[Weekday] {
        &self.by_day
    }

    pub fn occurs_on_weekday(&self, day: Weekday) -> bool {
        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekly => self.by_day.contains(&day),
        }
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn normalize_days(days: impl IntoIterator<Item = Weekday>) -> Vec<Weekday> {
    let mut mask = [false; 7];
    for day in days {
        mask[day.num_days_from_monday() as usize] = true;
    }
    WEEK
        .iter()
        .copied()
        .filter(|day| mask[day.num_days_from_monday() as usize])
        .collect()
}

impl FromStr for RecurrenceSpec {
    type Err = RecurrenceParseError;

    /// Parses `FREQ=WEEKLY;BYDAY=MO,WE,FR;UNTIL=20240131`, optionally prefixed by `RRULE:`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let body = raw.trim();
        let body = body
            .strip_prefix("RRULE:")
            .or_else(|| body.strip_prefix("rrule:"))
            .unwrap_or(body);

        let mut frequency: Option<Frequency> = None;
        let mut by_day: Vec<Weekday> = Vec::new();
        let mut until: Option<NaiveDate> = None;

        for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| RecurrenceParseError::MalformedPart(part.to_string()))?;
            match key.trim().to_ascii_uppercase().as_str() {
                "FREQ" => {
                    frequency = Some(match value.trim().to_ascii_uppercase().as_str() {
                        "DAILY" => Frequency::Daily,
                        "WEEKLY" => Frequency::Weekly,
                        other => {
                            return Err(RecurrenceParseError::UnsupportedFrequency(
                                other.to_string(),
                            ))
                        }
                    });
                }
                "BYDAY" => {
                    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                        by_day.push(parse_weekday(token)?);
                    }
                }
                "UNTIL" => {
                    let token = value.trim();
                    let date_part = token.get(..8).unwrap_or(token);
                    let date = NaiveDate::parse_from_str(date_part, "%Y%m%d")
                        .or_else(|_| NaiveDate::parse_from_str(token, "%Y-%m-%d"))
                        .map_err(|_| RecurrenceParseError::InvalidUntil(token.to_string()))?;
                    until = Some(date);
                }
                other => return Err(RecurrenceParseError::UnknownKey(other.to_string())),
            }
        }

        let frequency = frequency.ok_or(RecurrenceParseError::MissingFrequency)?;
        Ok(Self::from_parts(frequency, by_day, until))
    }
}

fn parse_weekday(token: &str) -> Result<Weekday, RecurrenceParseError> {
    match token.to_ascii_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(RecurrenceParseError::UnknownWeekday(token.to_string())),
    }
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

impl fmt::Display for RecurrenceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Frequency::Daily => write!(f, "FREQ=DAILY")?,
            Frequency::Weekly => {
                let days: Vec<&str> = self.by_day.iter().map(|d| weekday_code(*d)).collect();
                write!(f, "FREQ=WEEKLY;BYDAY={}", days.join(","))?;
            }
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format("%Y%m%d"))?;
        }
        Ok(())
    }
}

/// Occurrence dates of `spec` inside `window`, ascending. Dates before `anchor` never occur.
pub fn expand(spec: &RecurrenceSpec, anchor: NaiveDate, window: DateWindow) -> Vec<NaiveDate> {
    let series = DateWindow::new(anchor, spec.until.unwrap_or(NaiveDate::MAX));
    let bounded = window.intersect(&series);
    if bounded.is_empty() {
        return Vec::new();
    }
    if spec.frequency == Frequency::Weekly && spec.by_day.is_empty() {
        return Vec::new();
    }
    bounded
        .days()
        .filter(|day| spec.occurs_on_weekday(day.weekday()))
        .collect()
}

/// Like [`expand`], but a missing rule means a single occurrence on `anchor`.
pub fn expand_dates(
    spec: Option<&RecurrenceSpec>,
    anchor: NaiveDate,
    window: DateWindow,
) -> Vec<NaiveDate> {
    match spec {
        Some(spec) => expand(spec, anchor, window),
        None if window.contains(anchor) => vec![anchor],
        None => Vec::new(),
    }
}

pub fn expand_activity(activity: &Activity, window: DateWindow) -> Vec<Occurrence> {
    expand_dates(activity.recurrence.as_ref(), activity.anchor_date, window)
        .into_iter()
        .map(|date| activity.occurrence_on(date))
        .collect()
}
