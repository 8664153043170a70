#![no_main]
#![no_std]

use defmt::unwrap;
use defmt_rtt as _;
use panic_probe as _;
use rtic::app;
use rtic_monotonics::{
    systick::{ExtU64, Systick},
    Monotonic,
};
use static_cell::StaticCell;
use stm32f7xx_hal::{
    gpio::{Output, Pin},
    prelude::*,
};

use tracker_core::{AcquisitionProfile, AdcDevice, ChannelId, SampleQueues, NUM_CHANNELS};
use tracker_firmware::Stm32Adc;

defmt::timestamp!("{=u64:ms}", Systick::now().duration_since_epoch().to_millis());

/// Values kept per channel between two consumer passes.
const QUEUE_DEPTH: usize = 64;

type Adc = AdcDevice<Stm32Adc, SampleQueues<NUM_CHANNELS, QUEUE_DEPTH>>;

#[app(device = stm32f7xx_hal::pac, dispatchers = [CAN1_RX0])]
mod app {
    use super::*;

    static SAMPLE_BUFFER: StaticCell<[u16; NUM_CHANNELS]> = StaticCell::new();

    #[shared]
    struct Shared {
        adc: Adc,
    }

    #[local]
    struct Local {}

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        defmt::println!("Analog acquisition starting");

        let mut rcc = p.RCC.constrain();
        let clocks = rcc.cfgr.sysclk(216.MHz()).hclk(216.MHz()).freeze();

        let systick_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.sysclk().to_Hz(), systick_token);

        // Analog inputs of the channels in the profile, Nucleo A0 to A2
        let led_pin = {
            let gpioa = p.GPIOA.split();
            let gpiob = p.GPIOB.split();
            let gpioc = p.GPIOC.split();

            let _in3 = gpioa.pa3.into_analog();
            let _in10 = gpioc.pc0.into_analog();
            let _in13 = gpioc.pc3.into_analog();

            gpiob.pb7.into_push_pull_output()
        };

        let hw = Stm32Adc::init(
            p.ADC1,
            p.TIM2,
            p.DMA2,
            &clocks,
            &mut rcc.apb1,
            &mut rcc.apb2,
            &mut rcc.ahb1,
        );
        let buffer = SAMPLE_BUFFER.init([0; NUM_CHANNELS]);
        let mut adc = AdcDevice::new(hw, SampleQueues::new(), buffer);

        let profile = unwrap!(AcquisitionProfile::from_json(include_bytes!(
            "../acquisition.json"
        )));
        match adc.apply_profile(&profile) {
            Ok(achieved) => defmt::info!("Sampling at {} Hz", achieved.to_Hz()),
            Err(e) => defmt::error!("Acquisition profile rejected: {}", e),
        }

        blinky::spawn(led_pin).unwrap_or_else(|_| defmt::panic!("Failed to start blinky"));
        consume::spawn().unwrap_or_else(|_| defmt::panic!("Failed to start consume"));

        (Shared { adc }, Local {})
    }

    /// Hello world blinky
    ///
    /// Blinks the blue LED on the Nucleo board to indicate that the program is
    /// running
    #[task(priority = 0)]
    async fn blinky(_cx: blinky::Context, mut led: Pin<'B', 7, Output>) {
        loop {
            Systick::delay(500u64.millis()).await;
            led.set_high();
            Systick::delay(500u64.millis()).await;
            led.set_low();
        }
    }

    /// Drains the per-channel queues and reports the latest value of every
    /// channel that produced something
    #[task(shared = [adc], priority = 1)]
    async fn consume(mut cx: consume::Context) {
        loop {
            Systick::delay(100u64.millis()).await;

            cx.shared.adc.lock(|adc| {
                for id in (0..NUM_CHANNELS as u8).map(ChannelId) {
                    let mut count = 0u32;
                    let last = adc.with_sink(|sink| {
                        sink.drain(id).inspect(|_| count += 1).last()
                    });
                    if let Some(value) = last {
                        defmt::info!("Channel {}: {} values, last {}", id.0, count, value);
                    }
                }

                let stats = adc.stats();
                if stats.dropped > 0 {
                    defmt::warn!("{} values dropped so far", stats.dropped);
                }
            });
        }
    }

    #[task(binds = DMA2_STREAM0, shared = [adc], priority = 2)]
    fn on_dma2_stream0(mut cx: on_dma2_stream0::Context) {
        cx.shared.adc.lock(|adc| adc.on_transfer_complete());
    }
}
