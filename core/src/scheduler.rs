use crate::{AdcDevice, AdcHardware, ChannelId, SampleSink};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    /// No channel active, hardware quiesced.
    Idle,
    /// Started, first transfer not completed yet.
    Armed,
    /// Transfers are completing.
    Running,
}

impl<H: AdcHardware, S: SampleSink, const N: usize> AdcDevice<H, S, N> {
    pub fn state(&self) -> AcquisitionState {
        match (self.running, self.awaiting_first) {
            (false, _) => AcquisitionState::Idle,
            (true, true) => AcquisitionState::Armed,
            (true, false) => AcquisitionState::Running,
        }
    }

    /// Starts acquisition of the active channels.
    ///
    /// Does nothing while running (changes to the channel set are picked up
    /// by the completion handler) or when no channel is active.
    pub fn start(&mut self) {
        self.masked(|adc| {
            if adc.running || adc.registry.active_mask().is_empty() {
                return;
            }

            adc.rebuild();

            adc.running = true;
            adc.awaiting_first = true;
            adc.completion_armed = true;

            adc.resume();
            if !adc.trigger.is_clocked() {
                adc.hw.start_conversion();
            }

            info!("Acquisition started with {} channels", adc.sequence.len());
        })
    }

    /// Marks a channel inactive. Stopping the last active channel quiesces
    /// the hardware and disarms the completion interrupt; otherwise the
    /// remaining channels keep sampling and the next completion rebuilds the
    /// sequence.
    pub(crate) fn stop(&mut self, id: ChannelId) {
        self.masked(|adc| {
            if !adc.registry.deactivate(id) {
                return;
            }
            debug!("Channel {} deactivated", id.0);

            if adc.running && adc.registry.active_mask().is_empty() {
                adc.quiesce();
                adc.completion_armed = false;
                adc.running = false;
                adc.awaiting_first = false;

                info!("Acquisition stopped");
            }
        })
    }
}
