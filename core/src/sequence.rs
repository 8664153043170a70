use crate::{AdcDevice, AdcHardware, SampleSink};

/// Proof that trigger, converter and DMA stream are all disabled.
///
/// Only [`AdcDevice`] creates one, and the sample buffer can only be resized
/// or handed to the DMA engine while holding it.
#[derive(Debug)]
pub struct Quiesced {
    _private: (),
}

impl Quiesced {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl<H: AdcHardware, S: SampleSink, const N: usize> AdcDevice<H, S, N> {
    /// Disables trigger, converter and DMA stream, in that order.
    pub(crate) fn quiesce(&mut self) -> Quiesced {
        self.disable_trigger();
        self.hw.disable_converter();
        self.hw.disable_dma();
        Quiesced::new()
    }

    /// Re-enables converter, DMA stream and, when clocked, the trigger.
    pub(crate) fn resume(&mut self) {
        self.hw.enable_converter();
        self.hw.enable_dma();
        self.enable_trigger();
    }

    /// Maps the active channels onto converter ranks and resizes the
    /// transfer to match.
    ///
    /// Ranks follow ascending channel id. The hardware is reprogrammed
    /// quiesced with the completion interrupt masked, and only brought back
    /// up if acquisition is running.
    pub(crate) fn rebuild(&mut self) {
        self.masked(|adc| {
            let quiesced = adc.quiesce();

            let active = adc.registry.active_mask();
            adc.sequence = active.iter().collect();
            adc.sequence_mask = active;

            adc.buffer.resize(adc.sequence.len(), &quiesced);
            adc.hw.set_channel_rank_table(&adc.sequence);
            adc.hw.set_transfer(adc.buffer.dma_target(&quiesced));
            // Disabling the stream flags a transfer complete; that sweep is void
            adc.hw.clear_transfer_complete();
            adc.stats.rebuilds = adc.stats.rebuilds.wrapping_add(1);

            trace!("Sequence rebuilt with {} ranks", adc.sequence.len());

            if adc.running {
                adc.resume();
            }
        })
    }
}
