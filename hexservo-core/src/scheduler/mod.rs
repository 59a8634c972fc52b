//! Pulse scheduler
//!
//! Runs from the timer interrupt. Once per logical period it steps every
//! channel toward its target, raises each pulsing pin and then lowers them one
//! by one as their fall times come due on the compare channel.
//!
//! ```text
//!  overflow (period start)            compare matches          overflow
//!  |                                  |     |     |            |
//!  v                                  v     v     v            v
//!  +-- refresh moving --+-- step --+-- all high --+-- fall ... --+-- idle --+
//! ```

mod edges;
mod pulse;

pub use edges::{EdgeQueue, FallEvent};
pub use pulse::{PulseScheduler, SchedulerPhase};
