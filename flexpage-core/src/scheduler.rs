//! Frame scheduling.
//!
//! FLEX divides each hour into 15 cycles of 128 frames. A pager wakes only for
//! the frame (and phase) its capcode selects, so a page must be placed there.

use crate::address::Capcode;
use crate::speed::{FlexSpeed, Phase};
use crate::Result;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// Frames per cycle.
pub const FRAMES_PER_CYCLE: u32 = 128;

/// Cycles per hour.
pub const CYCLES_PER_HOUR: u32 = 15;

/// Duration of one frame in milliseconds.
pub const FRAME_DURATION_MS: i64 = 1875;

/// Duration of one cycle in seconds.
pub const CYCLE_DURATION_SECS: i64 = 240;

/// Slot a page is transmitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameAddress {
    /// Cycle within the hour (0..15).
    pub cycle: u8,
    /// Frame within the cycle (0..128).
    pub frame: u8,
    pub phase: Phase,
    pub speed: FlexSpeed,
}

impl FrameAddress {
    /// Validating wrapper around [`schedule`] for raw inputs.
    pub fn resolve(capcode: u32, cycle_count: u64, baud_rate: u32) -> Result<Self> {
        let capcode = Capcode::new(capcode)?;
        let speed = FlexSpeed::from_bps(baud_rate)?;
        Ok(schedule(capcode, cycle_count, speed))
    }

    /// Offset of this frame's start from the top of the hour.
    pub fn offset_in_hour(&self) -> Duration {
        Duration::seconds(i64::from(self.cycle) * CYCLE_DURATION_SECS)
            + Duration::milliseconds(i64::from(self.frame) * FRAME_DURATION_MS)
    }

    /// First start of this frame at or after `now`.
    pub fn next_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = Duration::hours(1);
        let top = now.duration_trunc(hour).unwrap_or(now);
        let candidate = top + self.offset_in_hour();
        if candidate < now {
            candidate + hour
        } else {
            candidate
        }
    }
}

/// Maps a capcode onto its frame and phase.
///
/// Pure: the same inputs always give the same address.
pub fn schedule(capcode: Capcode, cycle_count: u64, speed: FlexSpeed) -> FrameAddress {
    let value = capcode.value();
    let phases = speed.phases();
    let phase = phases[((value / FRAMES_PER_CYCLE) as usize) % phases.len()];

    FrameAddress {
        cycle: (cycle_count % u64::from(CYCLES_PER_HOUR)) as u8,
        frame: (value % FRAMES_PER_CYCLE) as u8,
        phase,
        speed,
    }
}

/// Number of whole cycles since the Unix epoch at `time`.
///
/// The epoch falls on an hour boundary, so `cycle_count_at(t) % 15` is the
/// cycle number within the hour.
pub fn cycle_count_at(time: DateTime<Utc>) -> u64 {
    time.timestamp().max(0) as u64 / CYCLE_DURATION_SECS as u64
}

/// Cycle count of the next occurrence of `frame` that still starts at least
/// `lead` after `now`.
///
/// This is the current cycle while the frame lies ahead in it, otherwise the
/// following one.
pub fn upcoming_cycle_count(frame: u8, now: DateTime<Utc>, lead: Duration) -> u64 {
    let current = cycle_count_at(now);
    let cycle_ms = CYCLE_DURATION_SECS * 1000;
    let elapsed_ms = now.timestamp_millis().max(0) - current as i64 * cycle_ms;
    let frame_ms = i64::from(frame) * FRAME_DURATION_MS;
    if frame_ms - lead.num_milliseconds() >= elapsed_ms {
        current
    } else {
        current + 1
    }
}
