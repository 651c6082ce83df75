use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::model::{Activity, Occurrence};
use crate::recurrence::expand_activity;
use crate::window::DateWindow;

/// Concatenates both lists, keeping the first occurrence seen for each
/// `(activity_id, date)` key.
pub fn merge(recurring: Vec<Occurrence>, untimed: Vec<Occurrence>) -> Vec<Occurrence> {
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut merged = Vec::with_capacity(recurring.len() + untimed.len());
    for occurrence in recurring.into_iter().chain(untimed) {
        if seen.insert((occurrence.activity_id.clone(), occurrence.date)) {
            merged.push(occurrence);
        } else {
            debug!(
                activity_id = %occurrence.activity_id,
                date = %occurrence.date,
                "dropping duplicate occurrence"
            );
        }
    }
    merged
}

/// Expands every activity over `window` and merges the timed and untimed streams.
pub fn occurrences_in(activities: &[Activity], window: DateWindow) -> Vec<Occurrence> {
    let mut timed = Vec::new();
    let mut untimed = Vec::new();
    for activity in activities {
        let expanded = expand_activity(activity, window);
        if activity.is_untimed() {
            untimed.extend(expanded);
        } else {
            timed.extend(expanded);
        }
    }
    merge(timed, untimed)
}

pub fn occurrences_on(activities: &[Activity], date: NaiveDate) -> Vec<Occurrence> {
    occurrences_in(activities, DateWindow::single(date))
}

/// Dates within `window` that carry at least one occurrence.
pub fn marked_dates(activities: &[Activity], window: DateWindow) -> BTreeSet<NaiveDate> {
    occurrences_in(activities, window)
        .into_iter()
        .map(|occurrence| occurrence.date)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RecurrenceSpec;
    use chrono::{NaiveTime, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn untimed(id: &str, day: NaiveDate) -> Occurrence {
        Activity::untimed(id, id, day).occurrence_on(day)
    }

    #[test]
    fn duplicate_keys_keep_first_seen() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let day = date(2024, 1, 2);
        let timed = Activity::timed("a", "Run", day, nine, ten).occurrence_on(day);

        let merged = merge(
            vec![timed.clone(), untimed("b", day)],
            vec![untimed("a", day), untimed("c", day), untimed("b", day)],
        );
        let ids: Vec<&str> = merged.iter().map(|o| o.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].start_time, Some(nine));
        assert!(!merged[0].is_untimed);
    }

    #[test]
    fn merge_is_idempotent() {
        let day = date(2024, 1, 2);
        let list = vec![untimed("a", day), untimed("a", day), untimed("b", day)];
        let once = merge(list.clone(), list.clone());
        assert_eq!(once.len(), 2);
        assert_eq!(merge(once.clone(), Vec::new()), once);
    }

    #[test]
    fn same_activity_on_different_dates_is_kept() {
        let merged = merge(
            vec![untimed("a", date(2024, 1, 1))],
            vec![untimed("a", date(2024, 1, 2))],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn month_markers_cover_recurring_and_one_off_dates() {
        let activities = vec![
            Activity::untimed("w", "Weekly review", date(2024, 2, 1))
                .with_recurrence(RecurrenceSpec::weekly([Weekday::Fri])),
            Activity::untimed("x", "Dentist", date(2024, 2, 14)),
            Activity::untimed("y", "Out of range", date(2024, 3, 1)),
        ];
        let window = DateWindow::new(date(2024, 2, 1), date(2024, 2, 29));
        let marked = marked_dates(&activities, window);
        let expected: BTreeSet<NaiveDate> = [2, 9, 14, 16, 23]
            .into_iter()
            .map(|d| date(2024, 2, d))
            .collect();
        assert_eq!(marked, expected);
    }

    #[test]
    fn occurrences_on_returns_only_that_day() {
        let activities = vec![
            Activity::untimed("daily", "Stretch", date(2024, 1, 1))
                .with_recurrence(RecurrenceSpec::daily()),
            Activity::untimed("once", "Call bank", date(2024, 1, 3)),
        ];
        let on_second = occurrences_on(&activities, date(2024, 1, 2));
        assert_eq!(on_second.len(), 1);
        assert_eq!(on_second[0].activity_id, "daily");
        assert_eq!(occurrences_on(&activities, date(2024, 1, 3)).len(), 2);
    }
}
