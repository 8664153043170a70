use crate::{AdcDevice, AdcHardware, SampleSink};

impl<H: AdcHardware, S: SampleSink, const N: usize> AdcDevice<H, S, N> {
    /// Transfer-complete interrupt handler.
    ///
    /// Walks the sequence in rank order, feeding every still active channel
    /// its slot of the sample buffer. Values go to the sink without
    /// blocking; a full sink drops them. Channels that reached their sample
    /// count are stopped. Afterwards the sequence is rebuilt if the active
    /// set changed, and the next sweep is started when software stepped.
    pub fn on_transfer_complete(&mut self) {
        self.hw.clear_transfer_complete();

        if !self.running {
            trace!("Transfer complete while stopped");
            return;
        }
        self.awaiting_first = false;
        self.stats.transfers = self.stats.transfers.wrapping_add(1);

        for rank in 0..self.sequence.len() {
            let id = self.sequence[rank];
            if !self.registry.is_active(id) {
                continue;
            }
            let sample = self.buffer.slot(rank);
            let Some(channel) = self.registry.get_mut(id) else {
                continue;
            };

            let delivery = channel.record(sample);
            if let Some(value) = delivery.forward {
                if self.sink.push(id, value).is_err() {
                    self.stats.dropped = self.stats.dropped.wrapping_add(1);
                }
            }
            if delivery.limit_reached {
                self.stop(id);
            }
        }

        if !self.running {
            return;
        }
        if self.registry.active_mask() != self.sequence_mask {
            self.rebuild();
        }
        if !self.trigger.is_clocked() {
            self.hw.start_conversion();
        }
    }
}
