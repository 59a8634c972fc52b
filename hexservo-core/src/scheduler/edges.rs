//! Pending falling edges
//!
//! A period raises up to [`MAX_SERVOS`] pins at once; their falls are kept in
//! a bounded min-heap so the earliest deadline is always the next one armed.

use heapless::binary_heap::{BinaryHeap, Min};

use hexservo_hal::{PinId, TICKS_PER_WRAP};

use crate::MAX_SERVOS;

/// A falling edge due at a fixed offset from the period start
///
/// Field order gives the heap order: time first, ties broken by servo number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FallEvent {
    /// Ticks after the period start
    pub at: u32,
    /// Servo number that owns the pin
    pub servo: u8,
    /// Pin to drive low
    pub pin: PinId,
}

impl FallEvent {
    /// Counter wrap (within the period) in which the edge is due
    pub const fn wrap(&self) -> u32 {
        self.at / TICKS_PER_WRAP
    }

    /// Counter value at which the edge is due
    pub const fn compare_value(&self) -> u16 {
        (self.at % TICKS_PER_WRAP) as u16
    }
}

/// Min-heap of pending falls
#[derive(Debug)]
pub struct EdgeQueue {
    heap: BinaryHeap<FallEvent, Min, MAX_SERVOS>,
}

impl Default for EdgeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Queue an edge, handing it back if the queue is full
    pub fn push(&mut self, event: FallEvent) -> Result<(), FallEvent> {
        self.heap.push(event)
    }

    /// Earliest pending edge
    pub fn peek(&self) -> Option<&FallEvent> {
        self.heap.peek()
    }

    /// Remove and return the earliest pending edge
    pub fn pop(&mut self) -> Option<FallEvent> {
        self.heap.pop()
    }

    /// Remove and return the earliest edge if it is due at or before `now`
    pub fn pop_due(&mut self, now: u32) -> Option<FallEvent> {
        match self.heap.peek() {
            Some(event) if event.at <= now => self.heap.pop(),
            _ => None,
        }
    }

    /// Number of pending edges
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no edge is pending
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every pending edge
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
