#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Analog acquisition engine.
//!
//! One converter unit samples a set of analog channels. A DMA engine writes
//! every sweep into a small buffer and fires a transfer-complete interrupt,
//! which runs [`AdcDevice::on_transfer_complete`]. Application code drives
//! the same [`AdcDevice`] through its lifecycle methods; every multi-step
//! update runs with the completion interrupt masked.

mod fmt;

pub mod channel;
pub mod completion;
pub mod config;
pub mod device;
pub mod error;
pub mod hal;
pub mod sample_buffer;
pub mod scheduler;
pub mod sequence;
pub mod shared;
pub mod sink;
pub mod trigger;

#[cfg(test)]
mod mock;

pub use channel::{ChannelId, ChannelMask, ChannelRegistry, ChannelState, SampleLimit, Smoothing};
pub use config::{AcquisitionProfile, ChannelProfile};
pub use device::{AcquisitionStats, AdcDevice};
pub use error::AdcError;
pub use hal::{AdcHardware, DmaTarget, TimerId};
pub use sample_buffer::SampleBuffer;
pub use scheduler::AcquisitionState;
pub use sequence::Quiesced;
pub use shared::SharedAdc;
pub use sink::{SampleQueues, SampleSink};
pub use trigger::{ClockedTrigger, TimerTiming, Trigger};

/// Number of regular channels of the converter.
pub const NUM_CHANNELS: usize = 16;
