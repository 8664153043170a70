use fugit::HertzU32;

use crate::{AdcDevice, AdcError, AdcHardware, SampleSink, TimerId};

/// Period and prescaler of the trigger timer.
///
/// The timer fires every `prescaler * period` input clock cycles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerTiming {
    pub period: u32,
    pub prescaler: u32,
}

impl TimerTiming {
    /// Picks the smallest prescaler that keeps the period within the
    /// counter.
    pub fn for_frequency(
        base_clock: HertzU32,
        frequency: HertzU32,
        counter_bits: u32,
        prescaler_bits: u32,
    ) -> Result<Self, AdcError> {
        let out_of_range = AdcError::FrequencyOutOfRange(frequency.to_Hz());
        if frequency.to_Hz() == 0 {
            return Err(out_of_range);
        }

        let cycles = u64::from(base_clock.to_Hz() / frequency.to_Hz());
        let prescaler = cycles / (1u64 << counter_bits) + 1;
        if prescaler > 1u64 << prescaler_bits {
            return Err(out_of_range);
        }
        let period = cycles / prescaler;
        // A period of one cycle reloads the counter with zero and never fires
        if period < 2 {
            return Err(out_of_range);
        }

        Ok(Self {
            period: period as u32,
            prescaler: prescaler as u32,
        })
    }

    pub fn achieved(&self, base_clock: HertzU32) -> HertzU32 {
        HertzU32::Hz(base_clock.to_Hz() / self.prescaler / self.period)
    }
}

/// Timer-driven triggering. Only this mode has a hardware trigger that can
/// be live.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockedTrigger {
    timer: TimerId,
    timing: TimerTiming,
    requested: HertzU32,
    achieved: HertzU32,
    live: bool,
}

impl ClockedTrigger {
    pub fn timer(&self) -> TimerId {
        self.timer
    }

    pub fn timing(&self) -> TimerTiming {
        self.timing
    }

    pub fn requested(&self) -> HertzU32 {
        self.requested
    }

    pub fn frequency(&self) -> HertzU32 {
        self.achieved
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

/// What starts a sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Every sweep is started explicitly, the next one from the completion
    /// of the previous.
    SoftwareStepped,
    Clocked(ClockedTrigger),
}

impl Trigger {
    pub fn is_clocked(&self) -> bool {
        matches!(self, Trigger::Clocked(_))
    }

    /// Achieved trigger rate, 0 Hz when software stepped.
    pub fn frequency(&self) -> HertzU32 {
        match self {
            Trigger::SoftwareStepped => HertzU32::Hz(0),
            Trigger::Clocked(clocked) => clocked.achieved,
        }
    }

    pub fn is_live(&self) -> bool {
        match self {
            Trigger::SoftwareStepped => false,
            Trigger::Clocked(clocked) => clocked.live,
        }
    }
}

impl<H: AdcHardware, S: SampleSink, const N: usize> AdcDevice<H, S, N> {
    /// Selects software stepping (`0`) or a timer trigger close to
    /// `frequency` Hz and returns the frequency the timer actually achieves.
    ///
    /// The trigger is left disabled; the scheduler enables it.
    pub(crate) fn set_trigger(&mut self, frequency: u32) -> Result<HertzU32, AdcError> {
        let trigger = if frequency == 0 {
            Trigger::SoftwareStepped
        } else {
            let base_clock = self.hw.timer_clock(self.timer);
            let requested = HertzU32::Hz(frequency);
            let timing = TimerTiming::for_frequency(
                base_clock,
                requested,
                H::TIMER_COUNTER_BITS,
                H::TIMER_PRESCALER_BITS,
            )?;
            Trigger::Clocked(ClockedTrigger {
                timer: self.timer,
                timing,
                requested,
                achieved: timing.achieved(base_clock),
                live: false,
            })
        };

        self.disable_trigger();
        if let Trigger::Clocked(clocked) = &trigger {
            self.hw.configure_timer(clocked.timer, clocked.timing);
            debug!(
                "Trigger timer {} at {} Hz (period {}, prescaler {})",
                clocked.timer.0,
                clocked.achieved.to_Hz(),
                clocked.timing.period,
                clocked.timing.prescaler
            );
        } else {
            debug!("Software stepped trigger");
        }
        self.trigger = trigger;

        Ok(self.trigger.frequency())
    }

    pub(crate) fn disable_trigger(&mut self) {
        self.hw.disable_trigger();
        if let Trigger::Clocked(clocked) = &mut self.trigger {
            clocked.live = false;
        }
    }

    pub(crate) fn enable_trigger(&mut self) {
        if let Trigger::Clocked(clocked) = &mut self.trigger {
            self.hw.enable_trigger(clocked.timer);
            clocked.live = true;
        }
    }
}
