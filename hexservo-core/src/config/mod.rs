//! Engine configuration
//!
//! Timing parameters of the pulse engine. The defaults reproduce the classic
//! 0x70000-tick servo period (about 19.11 ms at 24 MHz) and a shutdown bound
//! just above the longest possible pulse.

use core::fmt;

use hexservo_hal::TICKS_PER_WRAP;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::units::ramp_periods;
use crate::{MAX_TARGET_MICROSECONDS, TICKS_PER_MICROSECOND};

/// Counter overflows per logical servo period
pub const DEFAULT_WRAPS_PER_PERIOD: u8 = 7;

/// Upper bound on how long `stop` waits for an in-flight pulse (µs)
pub const DEFAULT_STOP_TIMEOUT_US: u32 = 2800;

/// Polling interval used by `stop` while waiting (µs)
pub const DEFAULT_STOP_POLL_US: u32 = 10;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A period must span at least one counter wrap
    ZeroWrapsPerPeriod,
    /// The stop bound is shorter than the longest pulse, so `stop` could cut
    /// a pulse short
    StopTimeoutTooShort,
    /// The stop polling interval must be non-zero
    ZeroPollInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroWrapsPerPeriod => write!(f, "wraps per period must be at least 1"),
            ConfigError::StopTimeoutTooShort => write!(
                f,
                "stop timeout must be at least {} us",
                MAX_TARGET_MICROSECONDS
            ),
            ConfigError::ZeroPollInterval => write!(f, "stop poll interval must be non-zero"),
        }
    }
}

/// Pulse engine timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Counter overflows making up one logical period
    pub wraps_per_period: u8,
    /// Maximum time `stop` waits for an in-flight pulse (µs)
    pub stop_timeout_us: u32,
    /// Interval between checks while `stop` waits (µs)
    pub stop_poll_us: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub const fn new() -> Self {
        Self {
            wraps_per_period: DEFAULT_WRAPS_PER_PERIOD,
            stop_timeout_us: DEFAULT_STOP_TIMEOUT_US,
            stop_poll_us: DEFAULT_STOP_POLL_US,
        }
    }

    /// Set the number of counter wraps per period
    pub const fn with_wraps_per_period(self, wraps_per_period: u8) -> Self {
        Self {
            wraps_per_period,
            ..self
        }
    }

    /// Set the stop wait bound
    pub const fn with_stop_timeout_us(self, stop_timeout_us: u32) -> Self {
        Self {
            stop_timeout_us,
            ..self
        }
    }

    /// Set the stop polling interval
    pub const fn with_stop_poll_us(self, stop_poll_us: u32) -> Self {
        Self {
            stop_poll_us,
            ..self
        }
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wraps_per_period == 0 {
            return Err(ConfigError::ZeroWrapsPerPeriod);
        }
        if self.stop_timeout_us < u32::from(MAX_TARGET_MICROSECONDS) {
            return Err(ConfigError::StopTimeoutTooShort);
        }
        if self.stop_poll_us == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// Period length in ticks
    pub const fn period_ticks(&self) -> u32 {
        self.wraps_per_period as u32 * TICKS_PER_WRAP
    }

    /// Period length in whole microseconds
    pub const fn period_us(&self) -> u32 {
        self.period_ticks() / TICKS_PER_MICROSECOND as u32
    }

    /// Time to ramp across `distance` ticks at `speed` ticks per period (µs)
    ///
    /// With the default period, moving from 1 ms to 2 ms at speed `S` takes
    /// `458752 / (1000 * S)` seconds.
    pub const fn ramp_duration_us(&self, distance: u16, speed: u16) -> u64 {
        let ticks = ramp_periods(distance, speed) as u64 * self.period_ticks() as u64;
        ticks / TICKS_PER_MICROSECOND as u64
    }
}
