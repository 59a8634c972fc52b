//! Pulse width unit conversions
//!
//! Microsecond values are converted with the fixed ratio of 24 ticks per
//! microsecond. Conversions toward ticks saturate at the maximum target, so a
//! caller can never hand the scheduler an out-of-range width.

use crate::{MAX_TARGET_MICROSECONDS, MAX_TARGET_TICKS, TICKS_PER_MICROSECOND};

/// Clamp a tick count to the allowed target range
pub const fn clamp_ticks(ticks: u16) -> u16 {
    if ticks > MAX_TARGET_TICKS {
        MAX_TARGET_TICKS
    } else {
        ticks
    }
}

/// Convert microseconds to ticks, clamping to the maximum target
pub const fn us_to_ticks(us: u16) -> u16 {
    let us = if us > MAX_TARGET_MICROSECONDS {
        MAX_TARGET_MICROSECONDS
    } else {
        us
    };
    us * TICKS_PER_MICROSECOND
}

/// Convert ticks to whole microseconds (truncating)
pub const fn ticks_to_us(ticks: u16) -> u16 {
    ticks / TICKS_PER_MICROSECOND
}

/// Number of periods needed to move `distance` ticks at `speed` ticks/period
///
/// A speed of 0 is unlimited: any distance is covered in at most one period.
pub const fn ramp_periods(distance: u16, speed: u16) -> u32 {
    if distance == 0 {
        0
    } else if speed == 0 {
        1
    } else {
        (distance as u32).div_ceil(speed as u32)
    }
}
