use core::num::NonZeroU32;

use crate::AdcError;

/// Largest supported smoothing window, as log2 (a 128 sample window).
pub const MAX_SMOOTHING_LOG2: u8 = 7;

/// Hardware channel number of the converter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct ChannelId(pub u8);

/// Set of channels, one bit per channel id.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const EMPTY: Self = Self(0);
    pub const CAPACITY: usize = u32::BITS as usize;

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, id: ChannelId) -> bool {
        (id.0 as usize) < Self::CAPACITY && self.0 & (1 << id.0) != 0
    }

    /// Returns `true` if the channel was not in the set yet.
    pub fn insert(&mut self, id: ChannelId) -> bool {
        let newly = !self.contains(id);
        self.0 |= 1 << id.0;
        newly
    }

    /// Returns `true` if the channel was in the set.
    pub fn remove(&mut self, id: ChannelId) -> bool {
        let present = self.contains(id);
        self.0 &= !(1 << id.0);
        present
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Channels in ascending id order.
    pub fn iter(self) -> impl Iterator<Item = ChannelId> {
        let mut bits = self.0;
        core::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let id = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(ChannelId(id))
        })
    }
}

impl FromIterator<ChannelId> for ChannelMask {
    fn from_iter<I: IntoIterator<Item = ChannelId>>(iter: I) -> Self {
        let mut mask = Self::EMPTY;
        for id in iter {
            mask.insert(id);
        }
        mask
    }
}

/// When a channel stops by itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleLimit {
    /// Deactivate after this many delivered samples.
    Count(NonZeroU32),
    /// Sample until explicitly deactivated.
    FreeRunning,
}

impl SampleLimit {
    /// A count of zero is the unbounded marker.
    pub fn new(count: u32, free_running: bool) -> Self {
        match NonZeroU32::new(count) {
            Some(count) if !free_running => SampleLimit::Count(count),
            _ => SampleLimit::FreeRunning,
        }
    }

    pub fn requested(self) -> u32 {
        match self {
            SampleLimit::Count(count) => count.get(),
            SampleLimit::FreeRunning => 0,
        }
    }

    fn is_reached(self, delivered: u32) -> bool {
        match self {
            SampleLimit::Count(count) => delivered >= count.get(),
            SampleLimit::FreeRunning => false,
        }
    }
}

/// Exponential moving average over a window of `2^log2` samples.
///
/// The first `2^log2` samples only fill the accumulator (warm-up). After
/// that the accumulator holds `2^log2` times the average and each new sample
/// replaces one average-sized share of it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Smoothing {
    log2: u8,
    acc: u32,
    absorbed: u32,
    ready: bool,
}

impl Smoothing {
    pub const OFF: Self = Self {
        log2: 0,
        acc: 0,
        absorbed: 0,
        ready: false,
    };

    pub fn new(log2: u8) -> Result<Self, AdcError> {
        if log2 > MAX_SMOOTHING_LOG2 {
            return Err(AdcError::InvalidSmoothing(log2));
        }
        Ok(Self { log2, ..Self::OFF })
    }

    pub const fn window_log2(&self) -> u8 {
        self.log2
    }

    pub const fn window(&self) -> u32 {
        1 << self.log2
    }

    pub const fn is_enabled(&self) -> bool {
        self.log2 > 0
    }

    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    const fn is_warming_up(&self) -> bool {
        self.is_enabled() && !self.ready
    }

    fn warm_up(&mut self, sample: u16) {
        self.acc += u32::from(sample);
        self.absorbed += 1;
        if self.absorbed >= self.window() {
            self.ready = true;
        }
    }

    /// Mean of the samples absorbed so far.
    fn warm_up_mean(&self) -> u16 {
        match self.absorbed {
            0 => 0,
            n => (self.acc / n) as u16,
        }
    }

    fn filter(&mut self, sample: u16) -> u16 {
        if !self.is_enabled() {
            return sample;
        }
        self.acc = self.acc - (self.acc >> self.log2) + u32::from(sample);
        (self.acc >> self.log2) as u16
    }
}

/// Outcome of feeding one converted sample to a channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Value for the consumer, `None` while smoothing warms up.
    pub forward: Option<u16>,
    /// The channel has delivered everything it was asked for.
    pub limit_reached: bool,
}

/// Sampling policy and live value of one analog input.
#[derive(Clone, Debug)]
pub struct ChannelState {
    id: ChannelId,
    limit: SampleLimit,
    delivered: u32,
    smoothing: Smoothing,
    value: u16,
    raw: u16,
    fresh: bool,
}

impl ChannelState {
    pub const fn new(id: ChannelId) -> Self {
        Self {
            id,
            limit: SampleLimit::FreeRunning,
            delivered: 0,
            smoothing: Smoothing::OFF,
            value: 0,
            raw: 0,
            fresh: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn limit(&self) -> SampleLimit {
        self.limit
    }

    pub fn requested_sample_count(&self) -> u32 {
        self.limit.requested()
    }

    pub fn is_free_running(&self) -> bool {
        self.limit == SampleLimit::FreeRunning
    }

    pub fn samples_delivered(&self) -> u32 {
        self.delivered
    }

    pub fn smoothing(&self) -> &Smoothing {
        &self.smoothing
    }

    pub fn smoothing_ready(&self) -> bool {
        self.smoothing.is_ready()
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Last converted (and possibly smoothed) value, fresh or not.
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Last converted value before smoothing.
    pub fn raw_value(&self) -> u16 {
        self.raw
    }

    fn rearm(&mut self, limit: SampleLimit, smoothing: Smoothing) {
        self.limit = limit;
        self.smoothing = smoothing;
        self.delivered = 0;
        self.fresh = false;
    }

    /// Feeds one converted sample through warm-up, smoothing and the stop
    /// condition.
    pub(crate) fn record(&mut self, sample: u16) -> Delivery {
        self.fresh = true;
        self.raw = sample;

        let forward = if self.smoothing.is_warming_up() {
            self.smoothing.warm_up(sample);
            self.value = self.smoothing.warm_up_mean();
            None
        } else {
            let value = self.smoothing.filter(sample);
            self.value = value;
            Some(value)
        };

        self.delivered = match self.limit {
            SampleLimit::Count(_) => self.delivered.saturating_add(1),
            SampleLimit::FreeRunning => self.delivered.wrapping_add(1),
        };

        Delivery {
            forward,
            limit_reached: self.limit.is_reached(self.delivered),
        }
    }

    fn take(&mut self) -> Option<u16> {
        core::mem::replace(&mut self.fresh, false).then_some(self.value)
    }
}

/// Per-channel state of all `N` converter inputs plus the active set.
pub struct ChannelRegistry<const N: usize> {
    channels: [ChannelState; N],
    active: ChannelMask,
}

impl<const N: usize> ChannelRegistry<N> {
    pub fn new() -> Self {
        assert!(N <= ChannelMask::CAPACITY);
        Self {
            channels: core::array::from_fn(|i| ChannelState::new(ChannelId(i as u8))),
            active: ChannelMask::EMPTY,
        }
    }

    pub fn check(&self, id: ChannelId) -> Result<(), AdcError> {
        if usize::from(id.0) < N {
            Ok(())
        } else {
            Err(AdcError::InvalidChannel(id))
        }
    }

    /// Registers or re-arms a channel and marks it active.
    ///
    /// Resets the delivered count, freshness and smoothing warm-up.
    pub fn activate(
        &mut self,
        id: ChannelId,
        limit: SampleLimit,
        smoothing_log2: u8,
    ) -> Result<(), AdcError> {
        self.check(id)?;
        let smoothing = Smoothing::new(smoothing_log2)?;

        self.channels[usize::from(id.0)].rearm(limit, smoothing);
        self.active.insert(id);
        Ok(())
    }

    /// Returns whether the channel was active. Unknown channels are never
    /// active.
    pub fn deactivate(&mut self, id: ChannelId) -> bool {
        self.active.remove(id)
    }

    pub fn is_active(&self, id: ChannelId) -> bool {
        self.active.contains(id)
    }

    pub fn active_mask(&self) -> ChannelMask {
        self.active
    }

    pub fn get(&self, id: ChannelId) -> Option<&ChannelState> {
        self.channels.get(usize::from(id.0))
    }

    pub(crate) fn get_mut(&mut self, id: ChannelId) -> Option<&mut ChannelState> {
        self.channels.get_mut(usize::from(id.0))
    }

    /// Consumes the cached value if it has not been read since the last
    /// conversion.
    pub fn take_value(&mut self, id: ChannelId) -> Option<u16> {
        self.get_mut(id)?.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.iter()
    }
}

impl<const N: usize> Default for ChannelRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_iterates_ascending() {
        let mask: ChannelMask = [ChannelId(9), ChannelId(0), ChannelId(3), ChannelId(31)]
            .into_iter()
            .collect();

        assert_eq!(mask.len(), 4);
        assert!(mask.iter().eq([0, 3, 9, 31].map(ChannelId)));
    }

    #[test]
    fn mask_insert_remove() {
        let mut mask = ChannelMask::EMPTY;
        assert!(mask.insert(ChannelId(4)));
        assert!(!mask.insert(ChannelId(4)));
        assert!(mask.contains(ChannelId(4)));
        assert!(mask.remove(ChannelId(4)));
        assert!(!mask.remove(ChannelId(4)));
        assert!(mask.is_empty());
        assert!(!mask.contains(ChannelId(200)));
    }

    #[test]
    fn zero_count_is_free_running() {
        assert_eq!(SampleLimit::new(0, false), SampleLimit::FreeRunning);
        assert_eq!(SampleLimit::new(10, true), SampleLimit::FreeRunning);
        assert_eq!(SampleLimit::new(10, false).requested(), 10);
    }

    #[test]
    fn fixed_count_reaches_limit_exactly() {
        let mut channel = ChannelState::new(ChannelId(1));
        channel.rearm(SampleLimit::new(3, false), Smoothing::OFF);

        assert!(!channel.record(10).limit_reached);
        assert!(!channel.record(11).limit_reached);
        let last = channel.record(12);
        assert!(last.limit_reached);
        assert_eq!(last.forward, Some(12));
        assert_eq!(channel.samples_delivered(), 3);
    }

    #[test]
    fn smoothing_warms_up_for_whole_window() {
        let mut channel = ChannelState::new(ChannelId(0));
        channel.rearm(SampleLimit::FreeRunning, Smoothing::new(2).unwrap());

        for (sample, mean) in [(100, 100), (200, 150), (300, 200)] {
            assert_eq!(channel.record(sample).forward, None);
            assert!(!channel.smoothing_ready());
            assert_eq!(channel.value(), mean);
        }
        assert_eq!(channel.record(400).forward, None);
        assert!(channel.smoothing_ready());
        assert_eq!(channel.value(), 250);

        // Accumulator now holds 4 * 250; a steady input converges towards it
        assert_eq!(channel.record(250).forward, Some(250));
        assert_eq!(channel.record(650).forward, Some(350));
        assert_eq!(channel.raw_value(), 650);
        assert_eq!(channel.value(), 350);
    }

    #[test]
    fn smoothing_window_is_bounded() {
        assert!(Smoothing::new(MAX_SMOOTHING_LOG2).is_ok());
        assert_eq!(
            Smoothing::new(MAX_SMOOTHING_LOG2 + 1),
            Err(AdcError::InvalidSmoothing(MAX_SMOOTHING_LOG2 + 1))
        );
    }

    #[test]
    fn take_value_consumes_freshness() {
        let mut registry = ChannelRegistry::<4>::new();
        registry
            .activate(ChannelId(2), SampleLimit::FreeRunning, 0)
            .unwrap();
        assert_eq!(registry.take_value(ChannelId(2)), None);

        registry.get_mut(ChannelId(2)).unwrap().record(1234);
        assert_eq!(registry.take_value(ChannelId(2)), Some(1234));
        assert_eq!(registry.take_value(ChannelId(2)), None);
        assert_eq!(registry.get(ChannelId(2)).unwrap().value(), 1234);
    }

    #[test]
    fn activate_validates_before_mutating() {
        let mut registry = ChannelRegistry::<4>::new();

        assert_eq!(
            registry.activate(ChannelId(4), SampleLimit::FreeRunning, 0),
            Err(AdcError::InvalidChannel(ChannelId(4)))
        );
        assert_eq!(
            registry.activate(ChannelId(1), SampleLimit::FreeRunning, 9),
            Err(AdcError::InvalidSmoothing(9))
        );
        assert!(registry.active_mask().is_empty());
    }

    #[test]
    fn deactivate_is_idempotent() {
        let mut registry = ChannelRegistry::<4>::new();
        registry
            .activate(ChannelId(3), SampleLimit::new(5, false), 0)
            .unwrap();

        assert!(registry.deactivate(ChannelId(3)));
        assert!(!registry.deactivate(ChannelId(3)));
        assert!(!registry.is_active(ChannelId(3)));
    }

    #[test]
    fn rearm_resets_progress() {
        let mut registry = ChannelRegistry::<4>::new();
        registry
            .activate(ChannelId(0), SampleLimit::new(2, false), 1)
            .unwrap();
        let channel = registry.get_mut(ChannelId(0)).unwrap();
        channel.record(1);
        channel.record(1);
        assert!(channel.smoothing_ready());

        registry
            .activate(ChannelId(0), SampleLimit::new(2, false), 1)
            .unwrap();
        let channel = registry.get(ChannelId(0)).unwrap();
        assert_eq!(channel.samples_delivered(), 0);
        assert!(!channel.smoothing_ready());
        assert!(!channel.is_fresh());
    }
}
