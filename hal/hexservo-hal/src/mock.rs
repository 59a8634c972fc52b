//! Simulated timer and pins for host-side testing
//!
//! [`SimClock`] models a 16-bit counter ticking once per simulated tick, with
//! an overflow flag and one compare channel. [`MockTimer`] and [`MockPins`]
//! borrow the clock (and a [`PinLog`]) so a test can keep inspecting them
//! while the engine owns the drivers.
//!
//! A test drives time forward with [`SimClock::advance_until`], calling the
//! engine's interrupt entry point whenever it reports a latched event.

use core::cell::{Cell, RefCell};

use heapless::{Deque, Vec};

use crate::gpio::{PinId, ServoPins, SERVO_PIN_COUNT};
use crate::timer::{ServoTimer, TICKS_PER_WRAP};

/// Pins the mock bank accepts
pub const MOCK_ELIGIBLE_PINS: [PinId; SERVO_PIN_COUNT] = [2, 3, 4, 10, 11, 12];

/// Number of completed pulses kept by a [`PinLog`]
pub const PULSE_LOG_LEN: usize = 64;

/// Simulated time base
#[derive(Debug, Default)]
pub struct SimClock {
    /// Absolute simulated time in ticks
    now: Cell<u64>,
    /// Time at which the counter last started from zero
    origin: Cell<u64>,
    running: Cell<bool>,
    compare: Cell<Option<u16>>,
    overflow_pending: Cell<bool>,
    compare_pending: Cell<bool>,
    starts: Cell<u32>,
}

impl SimClock {
    /// Create a stopped clock at time zero
    pub const fn new() -> Self {
        Self {
            now: Cell::new(0),
            origin: Cell::new(0),
            running: Cell::new(false),
            compare: Cell::new(None),
            overflow_pending: Cell::new(false),
            compare_pending: Cell::new(false),
            starts: Cell::new(0),
        }
    }

    /// Absolute simulated time in ticks
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Whether the counter is running
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of times the timer was started
    pub fn start_count(&self) -> u32 {
        self.starts.get()
    }

    /// Currently armed compare value
    pub fn compare(&self) -> Option<u16> {
        self.compare.get()
    }

    /// Counter value; reads zero while stopped
    pub fn counter(&self) -> u16 {
        if !self.running.get() {
            return 0;
        }
        let elapsed = self.now.get() - self.origin.get();
        (elapsed % u64::from(TICKS_PER_WRAP)) as u16
    }

    /// Whether an overflow or compare flag is latched
    pub fn has_pending(&self) -> bool {
        self.overflow_pending.get() || self.compare_pending.get()
    }

    fn next_overflow(&self) -> Option<u64> {
        if !self.running.get() {
            return None;
        }
        let delta = u64::from(TICKS_PER_WRAP) - u64::from(self.counter());
        Some(self.now.get() + delta)
    }

    fn next_compare(&self) -> Option<u64> {
        if !self.running.get() {
            return None;
        }
        let value = u64::from(self.compare.get()?);
        let counter = u64::from(self.counter());
        let delta = if value > counter {
            value - counter
        } else {
            value + u64::from(TICKS_PER_WRAP) - counter
        };
        Some(self.now.get() + delta)
    }

    /// Time of the next overflow or compare match
    pub fn next_event(&self) -> Option<u64> {
        match (self.next_overflow(), self.next_compare()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Move time forward to the next event, but never past `limit`
    ///
    /// Returns `true` if an event was reached and its flag latched; the
    /// caller should then run the interrupt handler. Returns `false` once
    /// time has reached `limit` with nothing left to fire.
    pub fn advance_until(&self, limit: u64) -> bool {
        let overflow_at = self.next_overflow();
        let compare_at = self.next_compare();
        match self.next_event() {
            Some(at) if at <= limit => {
                self.now.set(at);
                if overflow_at == Some(at) {
                    self.overflow_pending.set(true);
                }
                if compare_at == Some(at) {
                    self.compare_pending.set(true);
                }
                true
            }
            _ => {
                if limit > self.now.get() {
                    self.now.set(limit);
                }
                false
            }
        }
    }
}

/// [`ServoTimer`] backed by a [`SimClock`]
pub struct MockTimer<'a> {
    clock: &'a SimClock,
}

impl<'a> MockTimer<'a> {
    /// Create a timer driving the given clock
    pub fn new(clock: &'a SimClock) -> Self {
        Self { clock }
    }
}

impl ServoTimer for MockTimer<'_> {
    fn start(&mut self) {
        let clock = self.clock;
        clock.origin.set(clock.now.get());
        clock.running.set(true);
        clock.compare.set(None);
        clock.overflow_pending.set(false);
        clock.compare_pending.set(false);
        clock.starts.set(clock.starts.get() + 1);
    }

    fn stop(&mut self) {
        let clock = self.clock;
        clock.running.set(false);
        clock.compare.set(None);
        clock.overflow_pending.set(false);
        clock.compare_pending.set(false);
    }

    fn counter(&self) -> u16 {
        self.clock.counter()
    }

    fn set_compare(&mut self, value: u16) {
        self.clock.compare.set(Some(value));
    }

    fn disable_compare(&mut self) {
        self.clock.compare.set(None);
        self.clock.compare_pending.set(false);
    }

    fn take_overflow(&mut self) -> bool {
        self.clock.overflow_pending.replace(false)
    }

    fn take_compare(&mut self) -> bool {
        self.clock.compare_pending.replace(false)
    }
}

/// One completed high pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    /// Pin that pulsed
    pub pin: PinId,
    /// Time of the rising edge
    pub rose_at: u64,
    /// High time in ticks
    pub width: u64,
}

#[derive(Debug)]
struct LogState {
    /// Bitmask of pins configured as outputs
    outputs: u32,
    /// Bitmask of pins driven high
    high: u32,
    rose_at: [u64; 32],
    pulses: Deque<Pulse, PULSE_LOG_LEN>,
    /// Writes to unconfigured pins or rises on an already-high pin
    violations: u32,
}

/// Record of everything a [`MockPins`] bank did
#[derive(Debug)]
pub struct PinLog {
    state: RefCell<LogState>,
}

impl Default for PinLog {
    fn default() -> Self {
        Self::new()
    }
}

impl PinLog {
    /// Create an empty log
    pub const fn new() -> Self {
        Self {
            state: RefCell::new(LogState {
                outputs: 0,
                high: 0,
                rose_at: [0; 32],
                pulses: Deque::new(),
                violations: 0,
            }),
        }
    }

    /// Whether the pin is driven high
    pub fn is_high(&self, pin: PinId) -> bool {
        pin < 32 && self.state.borrow().high & (1 << pin) != 0
    }

    /// Whether the pin was configured as an output
    pub fn is_output(&self, pin: PinId) -> bool {
        pin < 32 && self.state.borrow().outputs & (1 << pin) != 0
    }

    /// Number of protocol violations seen
    pub fn violations(&self) -> u32 {
        self.state.borrow().violations
    }

    /// Completed pulses on one pin, oldest first
    pub fn pulses_for(&self, pin: PinId) -> Vec<Pulse, PULSE_LOG_LEN> {
        self.state
            .borrow()
            .pulses
            .iter()
            .filter(|p| p.pin == pin)
            .copied()
            .collect()
    }

    /// Most recent completed pulse on one pin
    pub fn last_pulse(&self, pin: PinId) -> Option<Pulse> {
        self.state
            .borrow()
            .pulses
            .iter()
            .rev()
            .find(|p| p.pin == pin)
            .copied()
    }

    /// Forget recorded pulses, keeping pin levels
    pub fn clear_pulses(&self) {
        self.state.borrow_mut().pulses.clear();
    }

    fn configure(&self, pin: PinId) {
        let mut state = self.state.borrow_mut();
        state.outputs |= 1 << pin;
        state.high &= !(1 << pin);
    }

    fn rise(&self, pin: PinId, now: u64) {
        let mut state = self.state.borrow_mut();
        let mask = 1 << pin;
        if state.outputs & mask == 0 || state.high & mask != 0 {
            state.violations += 1;
            return;
        }
        state.high |= mask;
        state.rose_at[usize::from(pin)] = now;
    }

    fn fall(&self, pin: PinId, now: u64) {
        let mut state = self.state.borrow_mut();
        let mask = 1 << pin;
        if state.outputs & mask == 0 {
            state.violations += 1;
            return;
        }
        if state.high & mask == 0 {
            return;
        }
        state.high &= !mask;
        let rose_at = state.rose_at[usize::from(pin)];
        if state.pulses.is_full() {
            state.pulses.pop_front();
        }
        let _ = state.pulses.push_back(Pulse {
            pin,
            rose_at,
            width: now - rose_at,
        });
    }
}

/// [`ServoPins`] that records edges into a [`PinLog`]
pub struct MockPins<'a> {
    clock: &'a SimClock,
    log: &'a PinLog,
}

impl<'a> MockPins<'a> {
    /// Create a pin bank timestamping edges with `clock`
    pub fn new(clock: &'a SimClock, log: &'a PinLog) -> Self {
        Self { clock, log }
    }
}

impl ServoPins for MockPins<'_> {
    fn eligible_pins(&self) -> &[PinId] {
        &MOCK_ELIGIBLE_PINS
    }

    fn configure_output(&mut self, pin: PinId) {
        if self.is_eligible(pin) {
            self.log.configure(pin);
        }
    }

    fn set_high(&mut self, pin: PinId) {
        if self.is_eligible(pin) {
            self.log.rise(pin, self.clock.now());
        }
    }

    fn set_low(&mut self, pin: PinId) {
        if self.is_eligible(pin) {
            self.log.fall(pin, self.clock.now());
        }
    }

    fn is_set_high(&self, pin: PinId) -> bool {
        self.log.is_high(pin)
    }
}
