use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::WeekStart;
use crate::window::{align_to_week_start, DateWindow};

/// One seven-day slice of a cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WeekWindow {
    pub index: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start, self.end)
    }
}

/// A fixed-length planning period. Switching plans creates a new cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Cycle {
    pub anchor_date: NaiveDate,
    pub week_start: WeekStart,
    pub week_count: u32,
}

impl Cycle {
    pub fn new(anchor_date: NaiveDate, week_start: WeekStart, week_count: u32) -> Self {
        Self {
            anchor_date,
            week_start,
            week_count,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        align_to_week_start(self.anchor_date, self.week_start)
    }

    /// Last day of the final week; the day before the start when the cycle has no weeks.
    pub fn end_date(&self) -> NaiveDate {
        let days = i64::from(self.week_count) * 7 - 1;
        self.start_date()
            .checked_add_signed(Duration::days(days))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start_date(), self.end_date())
    }

    pub fn week_index_of(&self, date: NaiveDate) -> Option<u32> {
        if !self.window().contains(date) {
            return None;
        }
        let offset = date.signed_duration_since(self.start_date()).num_days();
        u32::try_from(offset / 7).ok()
    }

    pub fn weeks(&self) -> Vec<WeekWindow> {
        generate(self)
    }
}

/// Contiguous week windows of `cycle`, starting from the week that holds its anchor.
pub fn generate(cycle: &Cycle) -> Vec<WeekWindow> {
    let mut weeks = Vec::with_capacity(cycle.week_count as usize);
    let mut start = cycle.start_date();
    for index in 0..cycle.week_count {
        let Some(end) = start.checked_add_signed(Duration::days(6)) else {
            break;
        };
        weeks.push(WeekWindow { index, start, end });
        match end.succ_opt() {
            Some(next) => start = next,
            None => break,
        }
    }
    weeks
}
