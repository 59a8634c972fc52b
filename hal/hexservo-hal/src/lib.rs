//! Hexservo Hardware Abstraction Layer
//!
//! This crate defines the two hardware collaborators the servo pulse engine
//! depends on. Chip-specific crates (STM32F0, ...) implement them so the same
//! engine runs unchanged on different boards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  hexservo-core (engine, scheduler)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hexservo-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ hexservo-hal- │       │  mock (host   │
//! │    stm32f0    │       │    tests)     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`timer::ServoTimer`] - 16-bit free-running counter with overflow and
//!   compare-match interrupts
//! - [`gpio::ServoPins`] - the fixed bank of pins able to carry servo pulses

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use gpio::{OutputPinBank, PinId, ServoPins, SERVO_PIN_COUNT};
pub use timer::{ServoTimer, COUNTER_CLOCK_HZ, TICKS_PER_WRAP};
