//! STM32F0 drivers for the hexservo pulse engine
//!
//! Implements the `hexservo-hal` traits directly on the peripheral
//! registers so both drivers can be built in a `const` context and the engine
//! can live in a `static`:
//!
//! - [`Tim3ServoTimer`]: TIM3 as free-running 16-bit counter at 24 MHz,
//!   overflow and CC1 interrupts
//! - [`GpioServoPins`]: six push-pull outputs driven through BSRR
//!
//! Supported chips:
//!
//! - STM32F042F6
//! - STM32F042K6
//!
//! # Features
//!
//! - `stm32f042f6` / `stm32f042k6` - chip selection
//! - `defmt` - Enable debug formatting support
//!
//! # Usage
//!
//! ```ignore
//! const PRESCALER: u16 = match prescaler_for(48_000_000) {
//!     Ok(psc) => psc,
//!     Err(_) => panic!("timer clock"),
//! };
//!
//! static ENGINE: ServoEngine<Tim3ServoTimer, GpioServoPins> = ServoEngine::new(
//!     Tim3ServoTimer::new(PRESCALER),
//!     GpioServoPins::new(),
//!     EngineConfig::new(),
//! );
//!
//! #[interrupt]
//! fn TIM3() {
//!     ENGINE.on_timer_interrupt();
//! }
//!
//! let _p = embassy_stm32::init(Default::default());
//! // SAFETY: the TIM3 vector above services the engine
//! unsafe { Tim3ServoTimer::unmask_interrupt() };
//! ENGINE.start(Some(&SERVO_PINS[..2]))?;
//! ```
//!
//! `embassy_stm32::init` must run first: it enables the GPIO port clocks.

#![no_std]

pub mod clock;
pub mod gpio;
pub mod timer;

pub use clock::{prescaler_for, ClockError};
pub use gpio::{parse_pin_string, pin_id, GpioServoPins, SERVO_PINS};
pub use timer::Tim3ServoTimer;

// Re-export shared types from hexservo-hal
pub use hexservo_hal::{PinId, ServoPins, ServoTimer};
