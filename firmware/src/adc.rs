use cortex_m::peripheral::NVIC;
use fugit::HertzU32;
use hal::{
    pac::{self, Interrupt},
    rcc::{self, Clocks, Enable, Reset},
};
use stm32f7xx_hal as hal;

use tracker_core::{AdcHardware, ChannelId, DmaTarget, TimerId, TimerTiming};

/// ADC1 EXTSEL code for TIM2 TRGO.
const EXTSEL_TIM2_TRGO: u8 = 0b1011;

/// 84 ADC clock cycles per conversion, for every channel.
const SAMPLE_TIME: u32 = 0b100;

/// ADC1 on the STM32F767, read out by DMA2 stream 0 and triggered by TIM2.
///
/// The DMA stream runs in circular mode over one sweep, so every completed
/// sweep raises the stream's transfer-complete interrupt.
pub struct Stm32Adc {
    adc1: pac::ADC1,
    tim2: pac::TIM2,
    dma2: pac::DMA2,
    tim2_clock: HertzU32,
}

impl Stm32Adc {
    pub fn init(
        adc1: pac::ADC1,
        tim2: pac::TIM2,
        dma2: pac::DMA2,
        clocks: &Clocks,
        apb1: &mut rcc::APB1,
        apb2: &mut rcc::APB2,
        ahb1: &mut rcc::AHB1,
    ) -> Self {
        let mut this = Self {
            adc1,
            tim2,
            dma2,
            tim2_clock: clocks.timclk1(),
        };

        this.init_dma2(ahb1);
        this.init_adc1(apb2);
        this.init_tim2(apb1);

        this
    }

    /// Configure DMA2 Stream 0 to move 16-bit conversions from ADC1 into
    /// memory in circular mode
    fn init_dma2(&mut self, ahb1: &mut rcc::AHB1) {
        let stream = &self.dma2.st[0];
        <pac::DMA2 as Enable>::enable(ahb1);
        stream.cr.modify(|_, w| w.en().disabled());

        stream.cr.modify(|_, w| {
            // Select channel 0 (ADC1)
            w.chsel()
                .bits(0)
                .dbm()
                .disabled()
                // Restart at the first slot after every sweep
                .circ()
                .enabled()
                .msize()
                .bits16()
                .psize()
                .bits16()
                .minc()
                .incremented()
                .pinc()
                .fixed()
                .dir()
                .peripheral_to_memory()
                .pfctrl()
                .dma()
                .tcie()
                .enabled()
        });

        // Peripheral side is always the ADC1 data register
        stream
            .par
            .write(|w| unsafe { w.pa().bits(self.adc1.dr.as_ptr() as u32) });
    }

    /// Configure ADC1 for 12-bit scans over the rank table, one scan per
    /// trigger, read out by DMA
    fn init_adc1(&mut self, apb2: &mut rcc::APB2) {
        let adc1 = &self.adc1;
        <pac::ADC1 as Enable>::enable(apb2);
        adc1.cr2.modify(|_, w| w.adon().clear_bit());
        <pac::ADC1 as Reset>::reset(apb2);

        // Convert every rank once per trigger
        adc1.cr1
            .modify(|_, w| w.scan().set_bit().discen().clear_bit().res().bits(0b00));
        adc1.cr2
            .modify(|_, w| w.cont().single().exten().disabled());
        adc1.cr2
            .modify(|_, w| unsafe { w.extsel().bits(EXTSEL_TIM2_TRGO) });

        let smpr2 = (0..10).fold(0, |bits, ch| bits | SAMPLE_TIME << (3 * ch));
        let smpr1 = (0..9).fold(0, |bits, ch| bits | SAMPLE_TIME << (3 * ch));
        adc1.smpr2.write(|w| unsafe { w.bits(smpr2) });
        adc1.smpr1.write(|w| unsafe { w.bits(smpr1) });
    }

    /// Setup TIM2 to emit TRGO on every update event
    fn init_tim2(&mut self, apb1: &mut rcc::APB1) {
        let tim2 = &self.tim2;
        <pac::TIM2 as Enable>::enable(apb1);
        tim2.cr1.modify(|_, w| w.cen().disabled());
        tim2.cr2.modify(|_, w| w.mms().update());
    }
}

impl AdcHardware for Stm32Adc {
    const TIMER_COUNTER_BITS: u32 = 32;
    const DEFAULT_TIMER: TimerId = TimerId(2);

    fn supports_timer(&self, timer: TimerId) -> bool {
        timer == TimerId(2)
    }

    fn timer_clock(&self, _timer: TimerId) -> HertzU32 {
        self.tim2_clock
    }

    fn configure_timer(&mut self, _timer: TimerId, timing: TimerTiming) {
        let tim2 = &self.tim2;
        tim2.psc
            .write(|w| w.psc().bits((timing.prescaler - 1) as u16));
        tim2.arr.write(|w| w.arr().bits(timing.period - 1));
        // Load the prescaler now. UG still emits TRGO, which the converter
        // ignores because EXTEN is disabled until the trigger is enabled
        tim2.cr1.modify(|_, w| w.urs().counter_only());
        tim2.egr.write(|w| w.ug().update());
    }

    fn enable_trigger(&mut self, _timer: TimerId) {
        self.adc1.cr2.modify(|_, w| w.exten().rising_edge());
        self.tim2.cnt.reset();
        self.tim2.cr1.modify(|_, w| w.cen().enabled());
    }

    fn disable_trigger(&mut self) {
        self.tim2.cr1.modify(|_, w| w.cen().disabled());
        self.adc1.cr2.modify(|_, w| w.exten().disabled());
    }

    fn set_channel_rank_table(&mut self, sequence: &[ChannelId]) {
        let mut sqr = [0u32; 3];
        for (rank, id) in sequence.iter().enumerate() {
            // Ranks 1 to 6 live in SQR3, 7 to 12 in SQR2 and 13 to 16 in SQR1
            sqr[2 - rank / 6] |= u32::from(id.0 & 0x1f) << (5 * (rank % 6));
        }
        let len = sequence.len().saturating_sub(1) as u32;

        let adc1 = &self.adc1;
        adc1.sqr1.write(|w| unsafe { w.bits(sqr[0] | len << 20) });
        adc1.sqr2.write(|w| unsafe { w.bits(sqr[1]) });
        adc1.sqr3.write(|w| unsafe { w.bits(sqr[2]) });
    }

    fn enable_converter(&mut self) {
        self.adc1.cr2.modify(|_, w| w.adon().enabled());
    }

    fn disable_converter(&mut self) {
        self.adc1.cr2.modify(|_, w| w.adon().disabled());
    }

    fn start_conversion(&mut self) {
        self.adc1.cr2.modify(|_, w| w.swstart().start());
    }

    fn set_transfer(&mut self, target: DmaTarget) {
        let stream = &self.dma2.st[0];
        stream
            .ndtr
            .write(|w| w.ndt().bits(target.len() as u16));
        stream
            .m0ar
            .write(|w| unsafe { w.m0a().bits(target.as_mut_ptr() as u32) });
    }

    fn enable_dma(&mut self) {
        // An overrun stops DMA requests until it is cleared
        self.adc1.sr.modify(|_, w| w.ovr().clear_bit());
        self.adc1
            .cr2
            .modify(|_, w| w.dma().enabled().dds().continuous());
        self.dma2.st[0].cr.modify(|_, w| w.en().enabled());
    }

    fn disable_dma(&mut self) {
        let stream = &self.dma2.st[0];
        stream.cr.modify(|_, w| w.en().disabled());
        // Sets TCIF0 when a transfer was in flight, acknowledged by the rebuild
        while stream.cr.read().en().is_enabled() {}
        self.adc1.cr2.modify(|_, w| w.dma().disabled());
    }

    fn clear_transfer_complete(&mut self) {
        self.dma2.lifcr.write(|w| {
            w.ctcif0()
                .set_bit()
                .chtif0()
                .set_bit()
                .cteif0()
                .set_bit()
                .cdmeif0()
                .set_bit()
                .cfeif0()
                .set_bit()
        });
        NVIC::unpend(Interrupt::DMA2_STREAM0);
    }

    fn mask_completion(&mut self) {
        NVIC::mask(Interrupt::DMA2_STREAM0);
    }

    fn unmask_completion(&mut self) {
        // SAFETY: the handler only touches the device through its RTIC lock
        unsafe { NVIC::unmask(Interrupt::DMA2_STREAM0) };
    }
}
