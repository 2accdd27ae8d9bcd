//! The heartbeat record and the fixed-point timestamp it carries.
//!
//! wakatime-cli parses `--time` and the JSON `timestamp` field as plain
//! decimal text, so timestamps are kept as an integer count of
//! ten-thousandths of a second and never pass through a float.

use chrono::Utc;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::TrackerError;

const SCALE: i64 = 10_000;
const FRACTION_DIGITS: usize = 4;

/// Seconds since the Unix epoch with exactly four fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Current wall-clock time, rounded to the millisecond.
    pub fn now() -> Self {
        Timestamp(Utc::now().timestamp_millis() * 10)
    }

    pub fn from_secs(secs: i64) -> Self {
        Timestamp(secs.saturating_mul(SCALE))
    }

    pub fn from_ticks(ticks: i64) -> Self {
        Timestamp(ticks)
    }

    /// Raw value in ten-thousandths of a second.
    pub fn ticks(self) -> i64 {
        self.0
    }

    pub fn checked_add_secs(self, secs: i64) -> Option<Self> {
        secs.checked_mul(SCALE)
            .and_then(|delta| self.0.checked_add(delta))
            .map(Timestamp)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / scale,
            abs % scale,
            width = FRACTION_DIGITS
        )
    }
}

impl FromStr for Timestamp {
    type Err = TrackerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackerError::InvalidTimestamp(raw.to_string());
        let trimmed = raw.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = match unsigned.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (unsigned, ""),
        };

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
            return Err(invalid());
        }
        if fraction.len() > FRACTION_DIGITS {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let mut padded = fraction.to_string();
        while padded.len() < FRACTION_DIGITS {
            padded.push('0');
        }
        let fraction: i64 = padded.parse().map_err(|_| invalid())?;

        let ticks = whole
            .checked_mul(SCALE)
            .and_then(|value| value.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Timestamp(if negative { -ticks } else { ticks }))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("seconds since epoch as a number or decimal string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Timestamp, E> {
                value.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Timestamp, E> {
                i64::try_from(value)
                    .map(Timestamp::from_secs)
                    .map_err(|_| E::custom("timestamp out of range"))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Timestamp, E> {
                Ok(Timestamp::from_secs(value))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Timestamp, E> {
                if !value.is_finite() {
                    return Err(E::custom("timestamp must be finite"));
                }
                format!("{:.4}", value).parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Line count, zero-based line number and cursor column, all known.
///
/// Editors report these piecemeal; a heartbeat only carries them when all
/// three are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    pub line_count: u32,
    pub line_number: u32,
    pub cursor_position: u32,
}

impl LineStats {
    pub fn from_parts(
        line_count: Option<u32>,
        line_number: Option<u32>,
        cursor_position: Option<u32>,
    ) -> Option<Self> {
        Some(Self {
            line_count: line_count?,
            line_number: line_number?,
            cursor_position: cursor_position?,
        })
    }
}

/// One observed unit of coding activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub entity: String,
    pub timestamp: Timestamp,
    pub is_write: bool,
    /// `None` until checked against the filesystem on the flush thread.
    pub is_unsaved_entity: Option<bool>,
    pub project: Option<String>,
    pub language: Option<String>,
    pub is_building: bool,
    pub line_stats: Option<LineStats>,
}

impl Heartbeat {
    /// A plain non-write heartbeat with no optional telemetry.
    pub fn new(entity: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            entity: entity.into(),
            timestamp,
            is_write: false,
            is_unsaved_entity: None,
            project: None,
            language: None,
            is_building: false,
            line_stats: None,
        }
    }

    /// Fills in `is_unsaved_entity` from the filesystem when the editor did
    /// not report it. Stats the file, so keep it off editor threads.
    pub fn resolve_unsaved_entity(&mut self) {
        if self.is_unsaved_entity.is_none() {
            self.is_unsaved_entity = Some(!Path::new(&self.entity).exists());
        }
    }

    pub fn is_unsaved(&self) -> bool {
        self.is_unsaved_entity.unwrap_or(false)
    }
}

/// Returns false for paths that must never become heartbeats.
pub fn should_log(entity: &str) -> bool {
    if entity.trim().is_empty() || entity.starts_with("mock://") {
        return false;
    }
    if entity == "atlassian-ide-plugin.xml" || entity.contains("/.idea/workspace.xml") {
        return false;
    }
    true
}
