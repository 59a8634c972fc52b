//! Engine errors

use core::fmt;

use hexservo_hal::PinId;

use crate::config::ConfigError;
use crate::MAX_SERVOS;

/// Errors reported by [`ServoEngine::start`](super::ServoEngine::start)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// More pins than channels
    TooManyServos,
    /// Pin is not in the driver's eligible set
    IneligiblePin(PinId),
    /// Pin listed twice
    DuplicatePin(PinId),
    /// The engine configuration cannot be run
    InvalidConfig(ConfigError),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::InvalidConfig(err)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::TooManyServos => write!(f, "at most {} servos supported", MAX_SERVOS),
            EngineError::IneligiblePin(pin) => write!(f, "pin {} cannot drive a servo", pin),
            EngineError::DuplicatePin(pin) => write!(f, "pin {} listed more than once", pin),
            EngineError::InvalidConfig(err) => write!(f, "invalid configuration: {}", err),
        }
    }
}
