use core::fmt;

use crate::{ChannelId, TimerId};

/// Configuration errors reported synchronously by the lifecycle API.
///
/// None of the operations returning one of these has changed any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// The converter has no such channel.
    InvalidChannel(ChannelId),
    /// Smoothing window larger than [`crate::channel::MAX_SMOOTHING_LOG2`].
    InvalidSmoothing(u8),
    /// The trigger timer can not produce the requested frequency (in Hz).
    FrequencyOutOfRange(u32),
    /// The timer can not trigger the converter.
    InvalidTimer(TimerId),
    /// Operation is only allowed while acquisition is stopped.
    Busy,
    /// The acquisition profile could not be parsed.
    Profile,
}

impl fmt::Display for AdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcError::InvalidChannel(id) => write!(f, "invalid analog channel {}", id.0),
            AdcError::InvalidSmoothing(log2) => {
                write!(f, "smoothing window 2^{log2} exceeds the maximum")
            }
            AdcError::FrequencyOutOfRange(hz) => {
                write!(f, "trigger frequency {hz} Hz is out of range")
            }
            AdcError::InvalidTimer(id) => write!(f, "timer {} can not trigger the converter", id.0),
            AdcError::Busy => f.write_str("acquisition is running"),
            AdcError::Profile => f.write_str("malformed acquisition profile"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AdcError {}
