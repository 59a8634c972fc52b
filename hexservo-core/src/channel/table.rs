//! Fixed-size servo channel table
//!
//! Every field is a single atomic scalar, so a foreground store of `target`
//! or `speed` is never torn; the interrupt sees either the old or the new
//! value. Multi-field updates (table reset, the `set_target` fast path) are
//! done by the engine inside a critical section.

use portable_atomic::{AtomicU16, AtomicU8, Ordering};

use hexservo_hal::PinId;

use crate::MAX_SERVOS;

/// Snapshot of one servo channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoChannel {
    /// Output pin
    pub pin: PinId,
    /// Commanded pulse width (ticks)
    pub target: u16,
    /// Pulse width currently emitted (ticks)
    pub position: u16,
    /// Maximum change of `position` per period (ticks, 0 = unlimited)
    pub speed: u16,
}

/// Storage for one servo channel
#[derive(Debug)]
pub struct ChannelSlot {
    pin: AtomicU8,
    target: AtomicU16,
    position: AtomicU16,
    speed: AtomicU16,
}

impl ChannelSlot {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: Self = Self::new();

    /// Create a zeroed slot
    pub const fn new() -> Self {
        Self {
            pin: AtomicU8::new(0),
            target: AtomicU16::new(0),
            position: AtomicU16::new(0),
            speed: AtomicU16::new(0),
        }
    }

    /// Output pin
    pub fn pin(&self) -> PinId {
        self.pin.load(Ordering::Relaxed)
    }

    /// Commanded pulse width (ticks)
    pub fn target(&self) -> u16 {
        self.target.load(Ordering::Relaxed)
    }

    /// Pulse width currently emitted (ticks)
    pub fn position(&self) -> u16 {
        self.position.load(Ordering::Relaxed)
    }

    /// Speed limit (ticks per period)
    pub fn speed(&self) -> u16 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Whether the emitted width differs from the commanded one
    pub fn is_moving(&self) -> bool {
        self.position() != self.target()
    }

    /// Copy all fields out
    pub fn snapshot(&self) -> ServoChannel {
        ServoChannel {
            pin: self.pin(),
            target: self.target(),
            position: self.position(),
            speed: self.speed(),
        }
    }

    pub(crate) fn set_target(&self, ticks: u16) {
        self.target.store(ticks, Ordering::Relaxed);
    }

    pub(crate) fn set_position(&self, ticks: u16) {
        self.position.store(ticks, Ordering::Relaxed);
    }

    pub(crate) fn set_speed(&self, speed: u16) {
        self.speed.store(speed, Ordering::Relaxed);
    }

    /// Assign a pin and zero every other field
    pub(crate) fn reset(&self, pin: PinId) {
        self.pin.store(pin, Ordering::Relaxed);
        self.target.store(0, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
        self.speed.store(0, Ordering::Relaxed);
    }

    /// Move `position` one period's worth toward `target`
    ///
    /// Moves by at most `speed` ticks and never past the target. A speed of
    /// 0 is unlimited and lands on the target at once.
    pub(crate) fn step_toward_target(&self) {
        let target = self.target();
        let position = self.position();
        if position == target {
            return;
        }

        let speed = self.speed();
        let next = if speed == 0 {
            target
        } else if position < target {
            position.saturating_add(speed).min(target)
        } else {
            position.saturating_sub(speed).max(target)
        };
        self.set_position(next);
    }
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Table of up to [`MAX_SERVOS`] channels, indexed by servo number
#[derive(Debug)]
pub struct ChannelTable {
    slots: [ChannelSlot; MAX_SERVOS],
    count: AtomicU8,
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: [ChannelSlot::EMPTY; MAX_SERVOS],
            count: AtomicU8::new(0),
        }
    }

    /// Number of configured channels
    pub fn count(&self) -> usize {
        usize::from(self.count.load(Ordering::Acquire)).min(MAX_SERVOS)
    }

    /// Channel by servo number, if configured
    pub fn get(&self, num: usize) -> Option<&ChannelSlot> {
        if num < self.count() {
            self.slots.get(num)
        } else {
            None
        }
    }

    /// Configured channels in servo-number order
    pub fn active(&self) -> impl Iterator<Item = &ChannelSlot> {
        self.slots.iter().take(self.count())
    }

    /// Whether any configured channel has `position != target`
    pub fn any_moving(&self) -> bool {
        self.active().any(ChannelSlot::is_moving)
    }

    /// Replace the configured channels with zeroed ones on `pins`
    ///
    /// Callers must hold a critical section and have validated `pins`.
    pub(crate) fn assign(&self, pins: &[PinId]) {
        let count = pins.len().min(MAX_SERVOS);
        // Shrink first so the interrupt never sees a half-initialised slot
        self.count.store(0, Ordering::Release);
        for (slot, &pin) in self.slots.iter().zip(pins) {
            slot.reset(pin);
        }
        for slot in self.slots.iter().skip(count) {
            slot.reset(0);
        }
        self.count.store(count as u8, Ordering::Release);
    }
}
