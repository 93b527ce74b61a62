//! Conflict detection between wall-clock intervals sharing one calendar date
//! (or one weekday, for template blocks).

use crate::domain::interval::TimeInterval;

/// Half-open overlap test for intervals that may wrap past midnight.
///
/// Two wrapping intervals always conflict: both occupy the minutes up to
/// midnight starting from the later of their two starts.
pub fn intervals_overlap(left: &TimeInterval, right: &TimeInterval) -> bool {
    match (left.crosses_midnight(), right.crosses_midnight()) {
        (true, true) => true,
        (true, false) => wrapping_overlaps(left, right),
        (false, true) => wrapping_overlaps(right, left),
        (false, false) => {
            left.start_minute() < right.end_minute() && left.end_minute() > right.start_minute()
        }
    }
}

/// Returns the id of the first existing interval the candidate conflicts with.
pub fn find_overlap<'a, I>(candidate: &TimeInterval, existing: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, TimeInterval)>,
{
    existing
        .into_iter()
        .find(|(_, interval)| intervals_overlap(candidate, interval))
        .map(|(id, _)| id)
}

pub fn has_overlap<'a, I>(candidate: &TimeInterval, existing: I) -> bool
where
    I: IntoIterator<Item = &'a TimeInterval>,
{
    existing
        .into_iter()
        .any(|interval| intervals_overlap(candidate, interval))
}

// The wrapping interval is `[start, 1440) ∪ [0, end)`; a same-day interval
// conflicts when it reaches into either half.
fn wrapping_overlaps(wrapping: &TimeInterval, same_day: &TimeInterval) -> bool {
    same_day.end_minute() > wrapping.start_minute() || same_day.start_minute() < wrapping.end_minute()
}
