//! Wall-clock times at minute resolution.
//!
//! Schedules and the turn loop exchange times as `"HH:MM"` strings. A
//! [`ClockTime`] stores minutes since midnight and knows how to snap itself
//! to the 5-minute buckets the simulation runs on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minutes in a day. Also the value of `24:00`.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Default bucket width for schedule times and tick steps.
pub const DEFAULT_STEP_MINUTES: u16 = 5;

/// Errors from parsing a clock literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockParseError {
    #[error("expected HH:MM, got {0:?}")]
    Format(String),

    #[error("time out of range: {0:?}")]
    OutOfRange(String),
}

/// A time of day, stored as minutes since midnight (`0..=1440`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    /// Midnight at the start of the day.
    pub const MIDNIGHT: ClockTime = ClockTime(0);

    /// Build a time from hours and minutes. Returns `None` past `24:00`.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        let total = hour as u16 * 60 + minute as u16;
        (total <= MINUTES_PER_DAY).then_some(Self(total))
    }

    /// Build a time from minutes since midnight, clamped to `24:00`.
    pub fn from_minutes(minutes: u16) -> Self {
        Self(minutes.min(MINUTES_PER_DAY))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u8 {
        (self.0 / 60) as u8
    }

    pub fn minute(self) -> u8 {
        (self.0 % 60) as u8
    }

    /// Minutes used when ordering schedule entries.
    ///
    /// `00:00` is the end of the scheduled day and compares as `24:00`, so a
    /// midnight entry sorts after every other entry of the same day.
    pub fn as_schedule_minutes(self) -> u16 {
        if self.0 == 0 {
            MINUTES_PER_DAY
        } else {
            self.0
        }
    }

    /// Snap to the nearest multiple of `bucket` minutes.
    ///
    /// Remainders below half a bucket round down, the rest round up, so a
    /// 5-minute bucket moves a time by at most 2.5 minutes either way.
    pub fn rounded_to_bucket(self, bucket: u16) -> Self {
        if bucket == 0 {
            return self;
        }
        let remainder = self.0 % bucket;
        let down = self.0 - remainder;
        let rounded = if remainder * 2 < bucket {
            down
        } else {
            down + bucket
        };
        Self::from_minutes(rounded)
    }

    /// Move forward by `minutes`, wrapping past midnight.
    pub fn advanced_by(self, minutes: u16) -> Self {
        let total = (self.0 as u32 + minutes as u32) % MINUTES_PER_DAY as u32;
        Self(total as u16)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ClockParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (hours, minutes) = trimmed
            .split_once(':')
            .ok_or_else(|| ClockParseError::Format(s.to_string()))?;

        let hour: u8 = hours
            .parse()
            .map_err(|_| ClockParseError::Format(s.to_string()))?;
        let minute: u8 = minutes
            .parse()
            .map_err(|_| ClockParseError::Format(s.to_string()))?;

        ClockTime::new(hour, minute).ok_or_else(|| ClockParseError::OutOfRange(s.to_string()))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}
