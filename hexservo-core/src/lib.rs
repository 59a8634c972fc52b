//! Board-agnostic core of the six-channel servo pulse engine
//!
//! One 16-bit hardware timer and its interrupt generate up to six RC-servo
//! pulse trains. Each channel's pulse width ramps toward a commanded target
//! at a configurable maximum rate.
//!
//! - Channel table shared between foreground calls and the interrupt
//! - Pulse scheduler run from the timer interrupt
//! - Control API (start/stop, targets, speeds, positions)
//! - Engine configuration and unit conversions
//!
//! # Units
//!
//! Pulse widths are kept in ticks of 1/24 µs. The maximum target is
//! 2500 µs (60000 ticks). A target of 0 means "no pulses".
//!
//! # Wiring it to a board
//!
//! ```ignore
//! static ENGINE: ServoEngine<Tim3ServoTimer, GpioServoPins> = ServoEngine::new(
//!     Tim3ServoTimer::new(1), // 48 MHz kernel clock
//!     GpioServoPins::new(),
//!     EngineConfig::new(),
//! );
//!
//! #[interrupt]
//! fn TIM3() {
//!     ENGINE.on_timer_interrupt();
//! }
//!
//! ENGINE.start(Some(&SERVO_PINS[..2]))?;
//! ENGINE.set_target(0, 1500);
//! ```

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod channel;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod units;

#[cfg(test)]
mod testing;

pub use channel::{ChannelTable, ServoChannel};
pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, ServoEngine};
pub use hexservo_hal::PinId;
pub use scheduler::{PulseScheduler, SchedulerPhase};

/// Maximum number of servo channels
pub const MAX_SERVOS: usize = 6;

/// Pulse width ticks per microsecond
pub const TICKS_PER_MICROSECOND: u16 = 24;

/// Maximum target pulse width in microseconds
pub const MAX_TARGET_MICROSECONDS: u16 = 2500;

/// Maximum target pulse width in ticks
pub const MAX_TARGET_TICKS: u16 = MAX_TARGET_MICROSECONDS * TICKS_PER_MICROSECOND;
