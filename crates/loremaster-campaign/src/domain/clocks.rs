//! Progress clocks: segmented countdowns advanced by scene resolutions.

use serde::{Deserialize, Serialize};

/// Segment count used when a delta creates a clock without one.
pub const DEFAULT_SEGMENTS: u8 = 6;

/// A named, segmented clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressClock {
    /// The clock's name, unique per campaign.
    pub name: String,
    /// 4, 6 or 8.
    pub segments: u8,
    /// Filled segments, `0..=segments`.
    pub filled: u8,
}

impl ProgressClock {
    /// Whether every segment is filled.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.filled >= self.segments
    }

    /// The fill after advancing by `by` (may be negative), clamped.
    #[must_use]
    pub fn advanced_fill(&self, by: i32) -> u8 {
        let filled = (i32::from(self.filled) + by).clamp(0, i32::from(self.segments));
        u8::try_from(filled).unwrap_or(self.segments)
    }
}

/// Snaps a requested segment count to 4, 6 or 8.
#[must_use]
pub fn normalize_segments(requested: i32) -> u8 {
    match requested {
        i32::MIN..=4 => 4,
        5 | 6 => 6,
        _ => 8,
    }
}

/// A clock change requested by a scene resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockDelta {
    /// Clock name; an unknown name starts a new clock.
    pub name: String,
    /// Segment count for a new clock. Ignored for existing clocks.
    #[serde(default)]
    pub segments: Option<i32>,
    /// Segments to fill (negative to unwind).
    #[serde(default)]
    pub advance: i32,
}
