use core::cell::RefCell;

use critical_section::Mutex;

use crate::{AdcDevice, AdcHardware, SampleSink, NUM_CHANNELS};

/// An [`AdcDevice`] that can live in a `static` and be reached from both the
/// interrupt handler and application code.
///
/// Every access runs inside a critical section, on top of the completion
/// masking the device does itself.
pub struct SharedAdc<H: AdcHardware, S: SampleSink, const N: usize = NUM_CHANNELS> {
    inner: Mutex<RefCell<Option<AdcDevice<H, S, N>>>>,
}

impl<H: AdcHardware, S: SampleSink, const N: usize> SharedAdc<H, S, N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Installs the device. Any previous device is handed back.
    pub fn init(&self, device: AdcDevice<H, S, N>) -> Option<AdcDevice<H, S, N>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(device))
    }

    /// Runs `f` on the device, `None` before [`Self::init`].
    pub fn access<R>(&self, f: impl FnOnce(&mut AdcDevice<H, S, N>) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Body of the transfer-complete interrupt.
    pub fn on_interrupt(&self) {
        self.access(AdcDevice::on_transfer_complete);
    }
}

impl<H: AdcHardware, S: SampleSink, const N: usize> Default for SharedAdc<H, S, N> {
    fn default() -> Self {
        Self::new()
    }
}
