//! Channel table
//!
//! Per-servo state shared between foreground calls and the timer interrupt.

pub mod table;

pub use table::{ChannelSlot, ChannelTable, ServoChannel};
