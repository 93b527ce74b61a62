//! Minute-of-day arithmetic for wall-clock `HH:MM` intervals that may wrap
//! past midnight.

use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parses `HH:MM` (a trailing `:SS` component is accepted and ignored) into
/// minutes since midnight.
pub fn to_minutes(value: &str) -> Result<u32, String> {
    let invalid = || format!("invalid time '{value}': expected HH:MM");
    let mut split = value.trim().split(':');
    let hour = split
        .next()
        .and_then(|raw| raw.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    let minute = split
        .next()
        .and_then(|raw| raw.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    if let Some(seconds) = split.next() {
        if !matches!(seconds.parse::<u32>(), Ok(value) if value < 60) {
            return Err(invalid());
        }
    }
    if split.next().is_some() || hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(hour * 60 + minute)
}

pub fn format_minutes(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn crosses_midnight(start: &str, end: &str) -> Result<bool, String> {
    Ok(TimeInterval::parse(start, end)?.crosses_midnight())
}

pub fn duration(start: &str, end: &str) -> Result<u32, String> {
    Ok(TimeInterval::parse(start, end)?.duration_minutes())
}

/// A wall-clock interval. `end < start` means the interval wraps past
/// midnight; `start == end` is degenerate and left to callers to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    start_minute: u32,
    end_minute: u32,
}

impl TimeInterval {
    pub fn new(start_minute: u32, end_minute: u32) -> Result<Self, String> {
        if start_minute >= MINUTES_PER_DAY || end_minute >= MINUTES_PER_DAY {
            return Err(format!(
                "interval endpoints must be within [0, {MINUTES_PER_DAY}): {start_minute}..{end_minute}"
            ));
        }
        Ok(Self {
            start_minute,
            end_minute,
        })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, String> {
        Self::new(to_minutes(start)?, to_minutes(end)?)
    }

    pub fn start_minute(&self) -> u32 {
        self.start_minute
    }

    pub fn end_minute(&self) -> u32 {
        self.end_minute
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end_minute < self.start_minute
    }

    pub fn is_degenerate(&self) -> bool {
        self.start_minute == self.end_minute
    }

    pub fn duration_minutes(&self) -> u32 {
        if self.crosses_midnight() {
            (MINUTES_PER_DAY - self.start_minute) + self.end_minute
        } else {
            self.end_minute - self.start_minute
        }
    }

    pub fn duration_hours(&self) -> f64 {
        f64::from(self.duration_minutes()) / 60.0
    }

    /// Half-open same-day pieces: one for a regular interval, two for a
    /// wrapping one (`[start, 1440)` and `[0, end)`).
    pub fn segments(&self) -> Vec<(u32, u32)> {
        if self.crosses_midnight() {
            let mut segments = vec![(self.start_minute, MINUTES_PER_DAY)];
            if self.end_minute > 0 {
                segments.push((0, self.end_minute));
            }
            segments
        } else {
            vec![(self.start_minute, self.end_minute)]
        }
    }
}
