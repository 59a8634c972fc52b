//! Servo timer abstraction
//!
//! The pulse engine needs one hardware timer with a free-running 16-bit
//! counter, an interrupt on counter overflow and one compare channel with a
//! compare-match interrupt. Both interrupts must be routed to the same
//! handler, which calls the engine's interrupt entry point.

/// Counter ticks between two overflows of a 16-bit counter
pub const TICKS_PER_WRAP: u32 = 0x1_0000;

/// Rate the counter must run at: one count per 1/24 µs
pub const COUNTER_CLOCK_HZ: u32 = 24_000_000;

/// Hardware timer driving the servo pulse train
///
/// The counter is expected to tick at [`COUNTER_CLOCK_HZ`] so one count
/// equals one pulse width tick. All methods may be called from interrupt context.
pub trait ServoTimer {
    /// Reset the counter to zero, start counting and enable the overflow
    /// interrupt
    fn start(&mut self);

    /// Stop counting, disable every timer interrupt and clear pending flags
    fn stop(&mut self);

    /// Current counter value
    fn counter(&self) -> u16;

    /// Arm the compare-match interrupt for the given counter value
    ///
    /// Replaces any previously armed value.
    fn set_compare(&mut self, value: u16);

    /// Disarm the compare-match interrupt
    fn disable_compare(&mut self);

    /// Report and clear a pending overflow
    fn take_overflow(&mut self) -> bool;

    /// Report and clear a pending compare match
    fn take_compare(&mut self) -> bool;
}
