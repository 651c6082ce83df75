use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::WeekStart;

/// Inclusive date range. A window whose `end` precedes `start` is empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn len_days(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.end.signed_duration_since(self.start).num_days() + 1
        }
    }

    /// Every date of the window in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn intersect(&self, other: &DateWindow) -> DateWindow {
        DateWindow {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Day,
    Week,
    Month,
}

/// Visible range for a calendar view anchored on `anchor`.
pub fn compute_window(mode: ViewMode, anchor: NaiveDate, week_start: WeekStart) -> DateWindow {
    match mode {
        ViewMode::Day => DateWindow::single(anchor),
        ViewMode::Week => week_containing(anchor, week_start),
        ViewMode::Month => month_containing(anchor),
    }
}

pub fn week_containing(anchor: NaiveDate, week_start: WeekStart) -> DateWindow {
    let start = align_to_week_start(anchor, week_start);
    let end = start
        .checked_add_signed(Duration::days(6))
        .unwrap_or(NaiveDate::MAX);
    DateWindow { start, end }
}

pub fn align_to_week_start(anchor: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let offset = week_start.offset_of(anchor.weekday());
    anchor
        .checked_sub_signed(Duration::days(offset.into()))
        .unwrap_or(NaiveDate::MIN)
}

pub fn month_containing(anchor: NaiveDate) -> DateWindow {
    let start = anchor.with_day(1).unwrap_or(anchor);
    let last_day = days_in_month(anchor.year(), anchor.month());
    let end = anchor.with_day(last_day).unwrap_or(anchor);
    DateWindow { start, end }
}

/// Moves `anchor` by `steps` whole views. Returns `None` past the supported date range.
pub fn navigate(mode: ViewMode, anchor: NaiveDate, steps: i32) -> Option<NaiveDate> {
    match mode {
        ViewMode::Day => anchor.checked_add_signed(Duration::days(steps.into())),
        ViewMode::Week => anchor.checked_add_signed(Duration::weeks(steps.into())),
        ViewMode::Month => add_months(anchor, steps),
    }
}

fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    let total_months = date
        .year()
        .checked_mul(12)?
        .checked_add(date.month0() as i32)?
        .checked_add(months)?;
    let target_year = total_months.div_euclid(12);
    let target_month = (total_months.rem_euclid(12) + 1) as u32;
    let day = date.day().min(days_in_month(target_year, target_month));
    NaiveDate::from_ymd_opt(target_year, target_month, day)
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_window_is_the_anchor() {
        let anchor = date(2024, 3, 13);
        let window = compute_window(ViewMode::Day, anchor, WeekStart::Sunday);
        assert_eq!(window, DateWindow::single(anchor));
        assert_eq!(window.len_days(), 1);
    }

    #[test]
    fn week_window_respects_week_start() {
        // 2024-03-13 is a Wednesday.
        let anchor = date(2024, 3, 13);
        let sunday = compute_window(ViewMode::Week, anchor, WeekStart::Sunday);
        assert_eq!(sunday, DateWindow::new(date(2024, 3, 10), date(2024, 3, 16)));

        let monday = compute_window(ViewMode::Week, anchor, WeekStart::Monday);
        assert_eq!(monday, DateWindow::new(date(2024, 3, 11), date(2024, 3, 17)));

        // Sunday anchor with Monday weeks belongs to the preceding week.
        let sunday_anchor = compute_window(ViewMode::Week, date(2024, 3, 17), WeekStart::Monday);
        assert_eq!(sunday_anchor.start, date(2024, 3, 11));
        assert_eq!(sunday_anchor.len_days(), 7);
    }

    #[test]
    fn month_window_handles_leap_february() {
        let window = compute_window(ViewMode::Month, date(2024, 2, 10), WeekStart::Monday);
        assert_eq!(window, DateWindow::new(date(2024, 2, 1), date(2024, 2, 29)));

        let window = compute_window(ViewMode::Month, date(2023, 2, 10), WeekStart::Monday);
        assert_eq!(window.end, date(2023, 2, 28));

        let window = compute_window(ViewMode::Month, date(2023, 12, 31), WeekStart::Monday);
        assert_eq!(window, DateWindow::new(date(2023, 12, 1), date(2023, 12, 31)));
    }

    #[test]
    fn navigation_clamps_month_days() {
        assert_eq!(
            navigate(ViewMode::Month, date(2024, 1, 31), 1),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            navigate(ViewMode::Month, date(2024, 1, 15), -1),
            Some(date(2023, 12, 15))
        );
        assert_eq!(
            navigate(ViewMode::Week, date(2024, 1, 15), 2),
            Some(date(2024, 1, 29))
        );
        assert_eq!(
            navigate(ViewMode::Day, date(2024, 1, 1), -1),
            Some(date(2023, 12, 31))
        );
    }

    #[test]
    fn navigation_past_the_calendar_is_none() {
        let anchor = date(2024, 1, 1);
        assert_eq!(navigate(ViewMode::Month, anchor, i32::MAX), None);
        assert_eq!(navigate(ViewMode::Month, anchor, i32::MIN), None);
        assert_eq!(navigate(ViewMode::Week, anchor, i32::MAX), None);
        assert_eq!(navigate(ViewMode::Day, anchor, i32::MIN), None);
    }

    #[test]
    fn intersection_keeps_the_shared_days() {
        let january = DateWindow::new(date(2024, 1, 1), date(2024, 1, 31));
        let straddle = DateWindow::new(date(2024, 1, 25), date(2024, 2, 5));
        assert_eq!(
            january.intersect(&straddle),
            DateWindow::new(date(2024, 1, 25), date(2024, 1, 31))
        );
        let february = DateWindow::new(date(2024, 2, 1), date(2024, 2, 29));
        assert!(january.intersect(&february).is_empty());
    }

    #[test]
    fn degenerate_window_is_empty() {
        let window = DateWindow::new(date(2024, 1, 5), date(2024, 1, 4));
        assert!(window.is_empty());
        assert_eq!(window.len_days(), 0);
        assert_eq!(window.days().count(), 0);
    }

    #[test]
    fn days_iterates_inclusive_bounds() {
        let window = DateWindow::new(date(2024, 1, 30), date(2024, 2, 2));
        let days: Vec<NaiveDate> = window.days().collect();
        assert_eq!(
            days,
            vec![
                date(2024, 1, 30),
                date(2024, 1, 31),
                date(2024, 2, 1),
                date(2024, 2, 2)
            ]
        );
    }
}
