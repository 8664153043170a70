use fugit::HertzU32;
use heapless::Vec;

use crate::{
    AcquisitionProfile, AdcError, AdcHardware, ChannelId, ChannelMask, ChannelRegistry,
    ChannelState, SampleBuffer, SampleLimit, SampleSink, Smoothing, TimerId, Trigger, NUM_CHANNELS,
};

/// Counters kept by the completion handler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionStats {
    /// Completed DMA transfers while running.
    pub transfers: u32,
    /// Values the consumer had no room for.
    pub dropped: u32,
    /// Times the rank table was reprogrammed.
    pub rebuilds: u32,
}

/// State of one converter unit, shared between the lifecycle API and the
/// transfer-complete interrupt.
pub struct AdcDevice<H: AdcHardware, S: SampleSink, const N: usize = NUM_CHANNELS> {
    pub(crate) hw: H,
    pub(crate) sink: S,
    pub(crate) registry: ChannelRegistry<N>,
    /// Rank order of the last rebuild; slot `i` of the buffer is `sequence[i]`.
    pub(crate) sequence: Vec<ChannelId, N>,
    /// Active set the sequence was built from.
    pub(crate) sequence_mask: ChannelMask,
    pub(crate) buffer: SampleBuffer,
    pub(crate) trigger: Trigger,
    pub(crate) timer: TimerId,
    pub(crate) running: bool,
    pub(crate) awaiting_first: bool,
    pub(crate) completion_armed: bool,
    pub(crate) mask_depth: u8,
    pub(crate) stats: AcquisitionStats,
}

impl<H: AdcHardware, S: SampleSink, const N: usize> AdcDevice<H, S, N> {
    /// Takes over the hardware and brings it into a known idle state:
    /// everything disabled, completion interrupt masked, software stepped.
    pub fn new(hw: H, sink: S, buffer: &'static mut [u16; N]) -> Self {
        let mut this = Self {
            hw,
            sink,
            registry: ChannelRegistry::new(),
            sequence: Vec::new(),
            sequence_mask: ChannelMask::EMPTY,
            buffer: SampleBuffer::new(buffer),
            trigger: Trigger::SoftwareStepped,
            timer: H::DEFAULT_TIMER,
            running: false,
            awaiting_first: false,
            completion_armed: false,
            mask_depth: 0,
            stats: AcquisitionStats::default(),
        };

        this.hw.mask_completion();
        this.rebuild();

        info!("ADC ready with {} channels", N);
        this
    }

    /// Runs `f` with the completion interrupt masked.
    ///
    /// Nested calls keep it masked until the outermost returns. It is only
    /// unmasked again if acquisition is still running.
    pub(crate) fn masked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.mask_depth == 0 {
            self.hw.mask_completion();
        }
        self.mask_depth += 1;

        let result = f(self);

        self.mask_depth -= 1;
        if self.mask_depth == 0 && self.completion_armed {
            self.hw.unmask_completion();
        }
        result
    }

    /// Registers or re-arms a channel and makes sure acquisition runs.
    ///
    /// A `count` of zero or `free_running` samples until [`Self::deactivate`].
    /// With `smoothing_log2 > 0` the first `2^smoothing_log2` samples only
    /// warm up the moving average and are not forwarded.
    pub fn activate(
        &mut self,
        id: ChannelId,
        count: u32,
        free_running: bool,
        smoothing_log2: u8,
    ) -> Result<(), AdcError> {
        self.masked(|adc| {
            let limit = SampleLimit::new(count, free_running);
            adc.registry.activate(id, limit, smoothing_log2)?;
            adc.sink.clear(id);
            debug!("Channel {} activated", id.0);

            adc.start();
            Ok(())
        })
    }

    /// Stops sampling a channel. Deactivating an inactive channel does
    /// nothing.
    pub fn deactivate(&mut self, id: ChannelId) -> Result<(), AdcError> {
        self.registry.check(id)?;
        self.stop(id);
        Ok(())
    }

    pub fn is_active(&self, id: ChannelId) -> bool {
        self.registry.is_active(id)
    }

    /// Configures the trigger for `frequency` Hz, or software stepping for
    /// `0`, and returns the achieved frequency.
    ///
    /// While running, the new trigger takes over immediately.
    pub fn set_clock(&mut self, frequency: u32) -> Result<HertzU32, AdcError> {
        self.masked(|adc| {
            let was_clocked = adc.trigger.is_clocked();
            let achieved = adc.set_trigger(frequency)?;

            if adc.running {
                match adc.trigger {
                    Trigger::Clocked(_) => adc.enable_trigger(),
                    // Stepping continues from the completion of the running sweep
                    Trigger::SoftwareStepped if !was_clocked => {}
                    Trigger::SoftwareStepped => adc.hw.start_conversion(),
                }
            }
            Ok(achieved)
        })
    }

    /// Selects the timer that triggers conversions in clocked mode.
    pub fn set_timer(&mut self, timer: TimerId) -> Result<(), AdcError> {
        if !self.hw.supports_timer(timer) {
            return Err(AdcError::InvalidTimer(timer));
        }
        if self.running {
            return Err(AdcError::Busy);
        }

        let previous = self.timer;
        self.timer = timer;
        if let Trigger::Clocked(clocked) = self.trigger {
            if let Err(e) = self.set_trigger(clocked.requested().to_Hz()) {
                self.timer = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn timer(&self) -> TimerId {
        self.timer
    }

    /// Consumes the last value of a channel if it was not read yet.
    pub fn take_value(&mut self, id: ChannelId) -> Option<u16> {
        self.masked(|adc| adc.registry.take_value(id))
    }

    pub fn channel(&self, id: ChannelId) -> Option<&ChannelState> {
        self.registry.get(id)
    }

    pub fn samples_delivered(&self, id: ChannelId) -> Option<u32> {
        self.channel(id).map(ChannelState::samples_delivered)
    }

    pub fn active_mask(&self) -> ChannelMask {
        self.registry.active_mask()
    }

    /// Channels in converter rank order as last programmed.
    pub fn sequence(&self) -> &[ChannelId] {
        &self.sequence
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Direct access to the sink, for callers that already keep the
    /// completion handler out (an RTIC lock). Otherwise use [`Self::with_sink`].
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Gives the consumer side access to the sink without racing the
    /// completion handler.
    pub fn with_sink<R>(&mut self, f: impl FnOnce(&mut S) -> R) -> R {
        self.masked(|adc| f(&mut adc.sink))
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Applies a boot profile: timer, clock, then every listed channel.
    ///
    /// Returns the achieved trigger frequency.
    pub fn apply_profile(&mut self, profile: &AcquisitionProfile) -> Result<HertzU32, AdcError> {
        for channel in &profile.channels {
            self.registry.check(channel.id)?;
            Smoothing::new(channel.smoothing)?;
        }

        if let Some(timer) = profile.timer {
            self.set_timer(timer)?;
        }
        let achieved = self.set_clock(profile.clock_hz)?;

        for channel in &profile.channels {
            self.activate(
                channel.id,
                channel.count,
                channel.free_running,
                channel.smoothing,
            )?;
        }

        Ok(achieved)
    }
}
