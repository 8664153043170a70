use heapless::Deque;

use crate::ChannelId;

/// Consumer of converted values, fed from interrupt context.
pub trait SampleSink {
    /// Hands over one value. Must not block; a consumer without room gives
    /// the value back and it is dropped.
    fn push(&mut self, channel: ChannelId, value: u16) -> Result<(), u16>;

    /// Forgets values of a previous activation of the channel.
    fn clear(&mut self, _channel: ChannelId) {}
}

impl<F> SampleSink for F
where
    F: FnMut(ChannelId, u16) -> Result<(), u16>,
{
    fn push(&mut self, channel: ChannelId, value: u16) -> Result<(), u16> {
        self(channel, value)
    }
}

/// One fixed-capacity queue per channel.
pub struct SampleQueues<const N: usize, const CAP: usize> {
    queues: [Deque<u16, CAP>; N],
    dropped: u32,
}

impl<const N: usize, const CAP: usize> SampleQueues<N, CAP> {
    pub fn new() -> Self {
        Self {
            queues: core::array::from_fn(|_| Deque::new()),
            dropped: 0,
        }
    }

    /// Oldest value of the channel.
    pub fn pop(&mut self, channel: ChannelId) -> Option<u16> {
        self.queues.get_mut(usize::from(channel.0))?.pop_front()
    }

    /// Number of values waiting for the channel.
    pub fn available(&self, channel: ChannelId) -> usize {
        self.queues
            .get(usize::from(channel.0))
            .map_or(0, Deque::len)
    }

    /// Takes every waiting value of the channel, oldest first.
    pub fn drain(&mut self, channel: ChannelId) -> impl Iterator<Item = u16> + '_ {
        let mut queue = self.queues.get_mut(usize::from(channel.0));
        core::iter::from_fn(move || queue.as_mut()?.pop_front())
    }

    /// Values that did not fit, over all channels.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize, const CAP: usize> Default for SampleQueues<N, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const CAP: usize> SampleSink for SampleQueues<N, CAP> {
    fn push(&mut self, channel: ChannelId, value: u16) -> Result<(), u16> {
        let pushed = match self.queues.get_mut(usize::from(channel.0)) {
            Some(queue) => queue.push_back(value),
            None => Err(value),
        };
        if pushed.is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
        pushed
    }

    fn clear(&mut self, channel: ChannelId) {
        if let Some(queue) = self.queues.get_mut(usize::from(channel.0)) {
            queue.clear();
        }
    }
}
