//! Interrupt-side pulse generation

use portable_atomic::{AtomicBool, Ordering};

use hexservo_hal::{ServoPins, ServoTimer, TICKS_PER_WRAP};

use super::edges::{EdgeQueue, FallEvent};
use crate::channel::ChannelTable;

/// Where the scheduler is within the current period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerPhase {
    /// Timer stopped, all pins low
    Halted,
    /// Pins raised this period are still waiting for their fall
    Emitting,
    /// Every pulse of the period has ended
    Idle,
}

/// Pulse train generator owning the timer and the pin driver
///
/// Lives inside the engine's critical-section mutex; every method is meant to
/// be called with interrupts excluded.
pub struct PulseScheduler<T, P> {
    timer: T,
    pins: P,
    wraps_per_period: u8,
    /// Counter wraps since the period started
    wrap: u8,
    phase: SchedulerPhase,
    queue: EdgeQueue,
    periods: u32,
}

impl<T: ServoTimer, P: ServoPins> PulseScheduler<T, P> {
    /// Create a halted scheduler
    pub const fn new(timer: T, pins: P, wraps_per_period: u8) -> Self {
        Self {
            timer,
            pins,
            wraps_per_period,
            wrap: 0,
            phase: SchedulerPhase::Halted,
            queue: EdgeQueue::new(),
            periods: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Periods started since construction (wrapping)
    pub fn periods(&self) -> u32 {
        self.periods
    }

    /// The pin driver
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Whether some pin raised this period has not fallen yet
    pub fn pulse_in_flight(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Configure every channel's pin as an output, driven low
    ///
    /// A pin still high from a pulse in flight is already an output and is
    /// left to fall on schedule.
    pub fn configure_outputs(&mut self, table: &ChannelTable) {
        for slot in table.active() {
            let pin = slot.pin();
            if !self.pins.is_set_high(pin) {
                self.pins.configure_output(pin);
            }
        }
    }

    /// Start the timer; the next overflow begins the first period
    pub fn start(&mut self) {
        self.queue.clear();
        self.wrap = self.wraps_per_period.saturating_sub(1);
        self.phase = SchedulerPhase::Idle;
        self.timer.start();
    }

    /// Stop the timer and drive every channel's pin low
    pub fn halt(&mut self, table: &ChannelTable) {
        self.timer.stop();
        self.queue.clear();
        for slot in table.active() {
            self.pins.set_low(slot.pin());
        }
        self.phase = SchedulerPhase::Halted;
    }

    /// Timer interrupt body
    ///
    /// `moving` receives the "any channel off target" aggregate at each
    /// period start, sampled before the channels are stepped.
    pub fn service(&mut self, table: &ChannelTable, moving: &AtomicBool) {
        let overflow = self.timer.take_overflow();
        let compare = self.timer.take_compare();
        if self.phase == SchedulerPhase::Halted {
            return;
        }

        if overflow {
            self.wrap = self.wrap.saturating_add(1);
            if self.wrap >= self.wraps_per_period {
                self.wrap = 0;
                self.begin_period(table, moving);
            }
        }

        if overflow || compare {
            self.fall_due_edges();
        }
    }

    /// Ticks since the current period started
    fn elapsed(&self) -> u32 {
        u32::from(self.wrap) * TICKS_PER_WRAP + u32::from(self.timer.counter())
    }

    fn begin_period(&mut self, table: &ChannelTable, moving: &AtomicBool) {
        // Only reachable with events queued past the period end; widths
        // from the table always fit in the first wrap
        while let Some(event) = self.queue.pop() {
            self.pins.set_low(event.pin);
        }

        moving.store(table.any_moving(), Ordering::Relaxed);

        for slot in table.active() {
            slot.step_toward_target();
        }

        for (servo, slot) in table.active().enumerate() {
            let width = slot.position();
            if width == 0 {
                continue;
            }
            let event = FallEvent {
                at: u32::from(width),
                servo: servo as u8,
                pin: slot.pin(),
            };
            if self.queue.push(event).is_ok() {
                self.pins.set_high(event.pin);
            }
        }

        self.periods = self.periods.wrapping_add(1);
        self.phase = if self.queue.is_empty() {
            SchedulerPhase::Idle
        } else {
            SchedulerPhase::Emitting
        };
    }

    /// Lower every due pin and arm the compare for the next fall
    fn fall_due_edges(&mut self) {
        loop {
            let now = self.elapsed();
            while let Some(event) = self.queue.pop_due(now) {
                self.pins.set_low(event.pin);
            }

            let Some(next) = self.queue.peek().copied() else {
                self.timer.disable_compare();
                self.phase = SchedulerPhase::Idle;
                return;
            };

            if next.wrap() != u32::from(self.wrap) {
                // Armed by the overflow that starts its wrap; table widths
                // always fit in wrap 0
                self.timer.disable_compare();
                return;
            }

            self.timer.set_compare(next.compare_value());

            // The counter may have passed the deadline while arming
            if next.at > self.elapsed() {
                return;
            }
        }
    }
}
