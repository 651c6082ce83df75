use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::LayoutError;
use crate::model::Occurrence;

const MINUTES_PER_DAY: u32 = 24 * 60;
const SECONDS_PER_MINUTE: u32 = 60;

/// Placement of one timed occurrence on the day grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutSlot {
    pub occurrence: Occurrence,
    pub column: usize,
    pub column_count: usize,
    pub top_minutes: u32,
    /// Display height, never shorter than the configured minimum block.
    pub height_minutes: u32,
}

impl LayoutSlot {
    pub fn left_fraction(&self) -> f64 {
        self.column as f64 / self.column_count.max(1) as f64
    }

    pub fn width_fraction(&self) -> f64 {
        1.0 / self.column_count.max(1) as f64
    }
}

/// Occurrences of one day split into the timed grid and the all-day lane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayLanes {
    pub timed: Vec<Occurrence>,
    pub all_day: Vec<Occurrence>,
}

/// Sends untimed entries, and timed entries missing a bound, to the all-day lane.
pub fn split_for_layout(occurrences: Vec<Occurrence>) -> DayLanes {
    let mut lanes = DayLanes::default();
    for occurrence in occurrences {
        if occurrence.is_untimed {
            lanes.all_day.push(occurrence);
        } else if occurrence.start_time.is_none() || occurrence.end_time.is_none() {
            warn!(
                activity_id = %occurrence.activity_id,
                date = %occurrence.date,
                "timed occurrence without start or end moved to all-day lane"
            );
            lanes.all_day.push(occurrence);
        } else {
            lanes.timed.push(occurrence);
        }
    }
    lanes
}

/// Seconds since midnight.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: u32,
    end: u32,
}

impl Span {
    fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    fn top_minutes(&self) -> u32 {
        self.start / SECONDS_PER_MINUTE
    }

    fn duration_minutes(&self) -> u32 {
        (self.end - self.start) / SECONDS_PER_MINUTE
    }
}

fn span_of(occurrence: &Occurrence) -> Result<Span, LayoutError> {
    let invalid = |reason| LayoutError::InvalidInput {
        activity_id: occurrence.activity_id.clone(),
        date: occurrence.date,
        reason,
    };
    let start = occurrence.start_time.ok_or_else(|| invalid("missing start time"))?;
    let end = occurrence.end_time.ok_or_else(|| invalid("missing end time"))?;
    if end < start {
        return Err(invalid("end time precedes start time"));
    }
    Ok(Span {
        start: start.num_seconds_from_midnight(),
        end: end.num_seconds_from_midnight(),
    })
}

/// Greedy interval partitioning of one day's timed occurrences.
///
/// Slots come back ordered by start time (input order breaks ties). Each
/// occurrence takes the lowest column that is free at its start; its column
/// count is one past the highest column among the occurrences it overlaps,
/// itself included.
pub fn layout(
    occurrences: &[Occurrence],
    min_block_minutes: u32,
) -> Result<Vec<LayoutSlot>, LayoutError> {
    let spans = occurrences
        .iter()
        .map(span_of)
        .collect::<Result<Vec<_>, _>>()?;

    let mut order: Vec<usize> = (0..occurrences.len()).collect();
    order.sort_by_key(|idx| spans[*idx].start);

    let mut column_ends: Vec<u32> = Vec::new();
    let mut columns = vec![0usize; occurrences.len()];
    for &idx in &order {
        let span = spans[idx];
        let column = match column_ends.iter().position(|end| *end <= span.start) {
            Some(free) => free,
            None => {
                column_ends.push(span.end);
                column_ends.len() - 1
            }
        };
        column_ends[column] = span.end;
        columns[idx] = column;
    }

    let slots = order
        .iter()
        .map(|&idx| {
            let span = spans[idx];
            let widest = order
                .iter()
                .filter(|&&other| other != idx && span.overlaps(&spans[other]))
                .map(|&other| columns[other])
                .fold(columns[idx], usize::max);
            let top = span.top_minutes();
            let height = span
                .duration_minutes()
                .max(min_block_minutes)
                .min(MINUTES_PER_DAY - top);
            LayoutSlot {
                occurrence: occurrences[idx].clone(),
                column: columns[idx],
                column_count: widest + 1,
                top_minutes: top,
                height_minutes: height,
            }
        })
        .collect();
    Ok(slots)
}
