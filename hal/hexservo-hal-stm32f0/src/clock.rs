//! Timer clock configuration
//!
//! TIM3 must count at exactly 24 MHz. The prescaler divides the timer
//! kernel clock by `PSC + 1`, so only kernel clocks that are whole multiples
//! of 24 MHz can be used.

use hexservo_hal::COUNTER_CLOCK_HZ;

/// Timer clock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// Kernel clock below 24 MHz
    TooSlow,
    /// Kernel clock not a whole multiple of 24 MHz
    NotMultiple,
}

/// Prescaler value giving a 24 MHz count from `timer_clock_hz`
pub const fn prescaler_for(timer_clock_hz: u32) -> Result<u16, ClockError> {
    if timer_clock_hz < COUNTER_CLOCK_HZ {
        return Err(ClockError::TooSlow);
    }
    if timer_clock_hz % COUNTER_CLOCK_HZ != 0 {
        return Err(ClockError::NotMultiple);
    }
    // At most u32::MAX / 24 MHz, well inside the 16-bit prescaler
    Ok((timer_clock_hz / COUNTER_CLOCK_HZ - 1) as u16)
}
