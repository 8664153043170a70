//! In-memory converter that records every register-level operation and
//! panics when the device reprograms something that is still running.

use fugit::HertzU32;

use crate::{AdcDevice, AdcHardware, ChannelId, DmaTarget, SampleQueues, TimerId, TimerTiming};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    MaskCompletion,
    UnmaskCompletion,
    DisableTrigger,
    EnableTrigger,
    DisableConverter,
    EnableConverter,
    DisableDma,
    EnableDma,
    SetRankTable,
    SetTransfer(usize),
    ClearTransferComplete,
    StartConversion,
    ConfigureTimer,
}

#[derive(Debug, Default)]
pub struct MockAdc {
    pub calls: Vec<Call>,
    pub completion_masked: bool,
    pub converter_enabled: bool,
    pub dma_enabled: bool,
    pub trigger_enabled: bool,
    /// Transfer-complete flag of the stream.
    pub completion_pending: bool,
    pub conversions_started: u32,
    pub timer_timing: Option<TimerTiming>,
    pub enabled_timer: Option<TimerId>,
    pub transfer_len: usize,
    pub rank_table: Vec<ChannelId>,
    target: Option<DmaTarget>,
}

impl MockAdc {
    pub const CHANNELS: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the "DMA engine" complete a transfer into the current target.
    pub fn dma_write(&mut self, values: &[u16]) {
        assert!(self.dma_enabled, "DMA written while disabled");
        assert!(!self.completion_pending, "Previous completion not acknowledged");
        assert_eq!(values.len(), self.transfer_len, "Transfer length mismatch");

        let target = self.target.as_ref().expect("No transfer target");
        for (i, &value) in values.iter().enumerate() {
            // SAFETY: the device handed out a target of `transfer_len` slots
            unsafe { target.as_mut_ptr().add(i).write_volatile(value) };
        }
        self.completion_pending = true;
    }

    fn assert_quiesced(&self, what: &str) {
        assert!(self.completion_masked, "{what} with completion unmasked");
        assert!(!self.trigger_enabled, "{what} with trigger enabled");
        assert!(!self.converter_enabled, "{what} with converter enabled");
        assert!(!self.dma_enabled, "{what} with DMA enabled");
    }
}

impl AdcHardware for MockAdc {
    const TIMER_COUNTER_BITS: u32 = 16;
    const DEFAULT_TIMER: TimerId = TimerId(2);

    fn supports_timer(&self, timer: TimerId) -> bool {
        matches!(timer, TimerId(2) | TimerId(3))
    }

    fn timer_clock(&self, timer: TimerId) -> HertzU32 {
        match timer {
            TimerId(3) => HertzU32::MHz(25),
            _ => HertzU32::MHz(50),
        }
    }

    fn configure_timer(&mut self, _timer: TimerId, timing: TimerTiming) {
        assert!(!self.trigger_enabled, "Timer reconfigured while triggering");
        self.calls.push(Call::ConfigureTimer);
        self.timer_timing = Some(timing);
    }

    fn enable_trigger(&mut self, timer: TimerId) {
        assert!(self.timer_timing.is_some(), "Trigger enabled before timer setup");
        self.calls.push(Call::EnableTrigger);
        self.trigger_enabled = true;
        self.enabled_timer = Some(timer);
    }

    fn disable_trigger(&mut self) {
        self.calls.push(Call::DisableTrigger);
        self.trigger_enabled = false;
    }

    fn set_channel_rank_table(&mut self, sequence: &[ChannelId]) {
        self.assert_quiesced("Rank table written");
        self.calls.push(Call::SetRankTable);
        self.rank_table = sequence.to_vec();
    }

    fn enable_converter(&mut self) {
        self.calls.push(Call::EnableConverter);
        self.converter_enabled = true;
    }

    fn disable_converter(&mut self) {
        self.calls.push(Call::DisableConverter);
        self.converter_enabled = false;
    }

    fn start_conversion(&mut self) {
        assert!(
            self.converter_enabled && self.dma_enabled,
            "Conversion started on a disabled converter"
        );
        self.calls.push(Call::StartConversion);
        self.conversions_started += 1;
    }

    fn set_transfer(&mut self, target: DmaTarget) {
        self.assert_quiesced("Transfer set up");
        self.calls.push(Call::SetTransfer(target.len()));
        self.transfer_len = target.len();
        self.target = Some(target);
    }

    fn enable_dma(&mut self) {
        self.calls.push(Call::EnableDma);
        self.dma_enabled = true;
    }

    fn disable_dma(&mut self) {
        self.calls.push(Call::DisableDma);
        // Like the real stream, stopping it early flags a completed transfer
        if self.dma_enabled {
            self.completion_pending = true;
        }
        self.dma_enabled = false;
    }

    fn clear_transfer_complete(&mut self) {
        self.calls.push(Call::ClearTransferComplete);
        self.completion_pending = false;
    }

    fn mask_completion(&mut self) {
        self.calls.push(Call::MaskCompletion);
        self.completion_masked = true;
    }

    fn unmask_completion(&mut self) {
        self.calls.push(Call::UnmaskCompletion);
        self.completion_masked = false;
    }
}

pub type MockSink = SampleQueues<{ MockAdc::CHANNELS }, 16>;

pub type MockDevice = AdcDevice<MockAdc, MockSink, { MockAdc::CHANNELS }>;

pub fn device() -> MockDevice {
    let buffer = Box::leak(Box::new([0; MockAdc::CHANNELS]));
    AdcDevice::new(MockAdc::new(), MockSink::new(), buffer)
}

/// Completes one transfer with `values` in rank order and runs the handler.
pub fn transfer(adc: &mut MockDevice, values: &[u16]) {
    adc.hardware_mut().dma_write(values);
    adc.on_transfer_complete();
}
