use fugit::HertzU32;

use crate::{ChannelId, TimerTiming};

/// Hardware timer that can be routed to the converter's trigger input.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct TimerId(pub u8);

/// Destination of the converter's DMA stream.
///
/// Points into the [`crate::SampleBuffer`] owned by the device. It is only
/// handed out while the stream is disabled, and stays valid until the next
/// rebuild.
#[derive(Debug, PartialEq, Eq)]
pub struct DmaTarget {
    ptr: *mut u16,
    len: usize,
}

impl DmaTarget {
    pub(crate) unsafe fn from_raw_parts(ptr: *mut u16, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_mut_ptr(&self) -> *mut u16 {
        self.ptr
    }

    /// Transfer length in conversions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

unsafe impl Send for DmaTarget {}

/// Converter, DMA stream, trigger timer and completion interrupt of one
/// converter unit.
///
/// Implementations are thin register wrappers. All sequencing (what gets
/// disabled before what is reprogrammed) is done by [`crate::AdcDevice`].
pub trait AdcHardware {
    /// Width of the trigger timer's counter.
    const TIMER_COUNTER_BITS: u32;
    /// Width of the trigger timer's prescaler.
    const TIMER_PRESCALER_BITS: u32 = 16;
    /// Timer used until another one is selected.
    const DEFAULT_TIMER: TimerId;

    fn supports_timer(&self, timer: TimerId) -> bool;

    /// Input clock of the timer, before its prescaler.
    fn timer_clock(&self, timer: TimerId) -> HertzU32;

    /// Loads period and prescaler. Must not start the timer or connect it to
    /// the converter.
    fn configure_timer(&mut self, timer: TimerId, timing: TimerTiming);

    /// Starts the timer and lets its update event start conversions.
    fn enable_trigger(&mut self, timer: TimerId);

    /// Stops external triggering of the converter.
    fn disable_trigger(&mut self);

    /// Maps `sequence[i]` to rank `i + 1`.
    fn set_channel_rank_table(&mut self, sequence: &[ChannelId]);

    fn enable_converter(&mut self);

    fn disable_converter(&mut self);

    /// Starts one sweep over the rank table.
    fn start_conversion(&mut self);

    /// Points the DMA stream at the target and sets the transfer length.
    fn set_transfer(&mut self, target: DmaTarget);

    fn enable_dma(&mut self);

    fn disable_dma(&mut self);

    /// Acknowledges a pending transfer-complete interrupt.
    fn clear_transfer_complete(&mut self);

    fn mask_completion(&mut self);

    fn unmask_completion(&mut self);
}
