//! Servo pin abstractions
//!
//! Provides the pin driver trait used by the pulse scheduler, plus an adapter
//! that builds one from ordinary `embedded-hal` output pins.

use embedded_hal::digital::OutputPin;

/// Identifier of a physical output pin
///
/// The numbering is board-specific; the engine only compares pins for
/// equality and hands them back to the driver.
pub type PinId = u8;

/// Number of pins in the eligible set
pub const SERVO_PIN_COUNT: usize = 6;

/// Bank of digital outputs able to carry servo pulses
///
/// Implementations should do nothing but touch the output registers: the
/// setters are called from interrupt context and must be short and
/// infallible. Requests for pins outside [`Self::eligible_pins`] must be
/// ignored.
pub trait ServoPins {
    /// The fixed set of pins that may be assigned to servo channels
    fn eligible_pins(&self) -> &[PinId];

    /// Configure a pin as a push-pull digital output, driving low
    fn configure_output(&mut self, pin: PinId);

    /// Drive the pin high (logic 1)
    fn set_high(&mut self, pin: PinId);

    /// Drive the pin low (logic 0)
    fn set_low(&mut self, pin: PinId);

    /// Check if the pin is currently driven high
    fn is_set_high(&self, pin: PinId) -> bool;

    /// Check if the pin belongs to the eligible set
    fn is_eligible(&self, pin: PinId) -> bool {
        self.eligible_pins().contains(&pin)
    }
}

/// [`ServoPins`] built from `embedded-hal` output pins
///
/// Each entry pairs a board pin number with an already-constructed output
/// driver. `configure_output` simply drives the pin low because
/// `embedded-hal` outputs are outputs from the moment they exist.
pub struct OutputPinBank<O: OutputPin, const N: usize> {
    ids: [PinId; N],
    pins: [O; N],
    /// Bitmask of slots currently driven high
    high: u32,
}

impl<O: OutputPin, const N: usize> OutputPinBank<O, N> {
    /// Create a bank from pin numbers and their output drivers
    ///
    /// Slot `i` of `ids` names the pin driven by slot `i` of `pins`.
    pub fn new(ids: [PinId; N], pins: [O; N]) -> Self {
        debug_assert!(N <= 32, "pin bank is limited to 32 outputs");
        Self { ids, pins, high: 0 }
    }

    fn slot(&self, pin: PinId) -> Option<usize> {
        self.ids.iter().position(|&id| id == pin)
    }

    fn drive(&mut self, pin: PinId, high: bool) {
        let Some(slot) = self.slot(pin) else {
            return;
        };
        let Some(output) = self.pins.get_mut(slot) else {
            return;
        };
        // Errors cannot be reported from interrupt context; the mask follows
        // the request so the bank state stays consistent with the scheduler.
        let _ = if high {
            output.set_high()
        } else {
            output.set_low()
        };
        if high {
            self.high |= 1 << slot;
        } else {
            self.high &= !(1 << slot);
        }
    }
}

impl<O: OutputPin, const N: usize> ServoPins for OutputPinBank<O, N> {
    fn eligible_pins(&self) -> &[PinId] {
        &self.ids
    }

    fn configure_output(&mut self, pin: PinId) {
        self.drive(pin, false);
    }

    fn set_high(&mut self, pin: PinId) {
        self.drive(pin, true);
    }

    fn set_low(&mut self, pin: PinId) {
        self.drive(pin, false);
    }

    fn is_set_high(&self, pin: PinId) -> bool {
        self.slot(pin)
            .map(|slot| self.high & (1 << slot) != 0)
            .unwrap_or(false)
    }
}
