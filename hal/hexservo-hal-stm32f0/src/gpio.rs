//! GPIO servo outputs for STM32F0
//!
//! Pins are numbered `port * 16 + pin` (PA0 = 0, PB0 = 16, ...). Outputs are
//! driven through the BSRR register, so setting or clearing one pin never
//! disturbs the rest of its port.

use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals::Moder;

use hexservo_hal::{PinId, ServoPins, SERVO_PIN_COUNT};

/// Pins wired to the servo headers: PA6, PA7, PB0, PB1, PA9, PA10
pub const SERVO_PINS: [PinId; SERVO_PIN_COUNT] = [
    pin_id(0, 6),
    pin_id(0, 7),
    pin_id(1, 0),
    pin_id(1, 1),
    pin_id(0, 9),
    pin_id(0, 10),
];

/// Pin number for a port index (A = 0) and pin
pub const fn pin_id(port: u8, pin: u8) -> PinId {
    port * 16 + pin
}

/// Parse a pin string from config
///
/// Supports "PA0" through "PF15".
pub fn parse_pin_string(s: &str) -> Option<PinId> {
    let s = s.trim();
    let rest = s.strip_prefix('P')?;

    let mut chars = rest.chars();
    let port = chars.next()?;
    if !('A'..='F').contains(&port) {
        return None;
    }

    let pin: u8 = chars.as_str().parse().ok()?;
    if pin > 15 {
        return None;
    }

    Some(pin_id(port as u8 - b'A', pin))
}

fn port_block(pin: PinId) -> Option<pac::gpio::Gpio> {
    match pin / 16 {
        0 => Some(pac::GPIOA),
        1 => Some(pac::GPIOB),
        5 => Some(pac::GPIOF),
        _ => None,
    }
}

/// [`ServoPins`] on the STM32F0 GPIO ports
pub struct GpioServoPins {
    eligible: [PinId; SERVO_PIN_COUNT],
    /// Bitmask of slots in `eligible` currently driven high
    high: u8,
}

impl Default for GpioServoPins {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioServoPins {
    /// Driver for the default [`SERVO_PINS`]
    pub const fn new() -> Self {
        Self::with_pins(SERVO_PINS)
    }

    /// Driver for a board-specific pin set
    pub const fn with_pins(eligible: [PinId; SERVO_PIN_COUNT]) -> Self {
        Self { eligible, high: 0 }
    }

    fn slot(&self, pin: PinId) -> Option<usize> {
        self.eligible.iter().position(|&id| id == pin)
    }

    fn drive(&mut self, pin: PinId, high: bool) {
        let (Some(slot), Some(block)) = (self.slot(pin), port_block(pin)) else {
            return;
        };
        let n = usize::from(pin % 16);
        if high {
            block.bsrr().write(|w| w.set_bs(n, true));
            self.high |= 1 << slot;
        } else {
            block.bsrr().write(|w| w.set_br(n, true));
            self.high &= !(1 << slot);
        }
    }
}

impl ServoPins for GpioServoPins {
    fn eligible_pins(&self) -> &[PinId] {
        &self.eligible
    }

    fn configure_output(&mut self, pin: PinId) {
        let (Some(_), Some(block)) = (self.slot(pin), port_block(pin)) else {
            return;
        };
        let n = usize::from(pin % 16);
        block.bsrr().write(|w| w.set_br(n, true));
        block.moder().modify(|w| w.set_moder(n, Moder::OUTPUT));
    }

    fn set_high(&mut self, pin: PinId) {
        self.drive(pin, true);
    }

    fn set_low(&mut self, pin: PinId) {
        self.drive(pin, false);
    }

    fn is_set_high(&self, pin: PinId) -> bool {
        self.slot(pin)
            .is_some_and(|slot| self.high & (1 << slot) != 0)
    }
}
