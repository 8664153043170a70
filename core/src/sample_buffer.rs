use core::ptr;

use crate::{DmaTarget, Quiesced};

/// DMA destination for one sweep, one slot per rank.
///
/// The DMA engine writes the slots behind our back, so they are only ever
/// read with volatile reads and never borrowed as a slice.
pub struct SampleBuffer {
    ptr: *mut u16,
    capacity: usize,
    len: usize,
}

unsafe impl Send for SampleBuffer {}

impl SampleBuffer {
    pub fn new<const N: usize>(storage: &'static mut [u16; N]) -> Self {
        Self {
            ptr: storage.as_mut_ptr(),
            capacity: N,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes how many slots the DMA engine fills per sweep.
    pub fn resize(&mut self, len: usize, _quiesced: &Quiesced) {
        assert!(len <= self.capacity, "Sequence does not fit the sample buffer");
        self.len = len;
    }

    pub fn dma_target(&mut self, _quiesced: &Quiesced) -> DmaTarget {
        unsafe { DmaTarget::from_raw_parts(self.ptr, self.len) }
    }

    /// Value the DMA engine last wrote for the given rank index.
    pub fn slot(&self, index: usize) -> u16 {
        assert!(index < self.len);
        unsafe { ptr::read_volatile(self.ptr.add(index)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_cell::StaticCell;

    #[test]
    fn target_follows_resize() {
        static STORAGE: StaticCell<[u16; 8]> = StaticCell::new();
        let storage = STORAGE.init([0; 8]);
        let base = storage.as_mut_ptr();

        let mut buffer = SampleBuffer::new(storage);
        let quiesced = Quiesced::new();
        assert_eq!(buffer.dma_target(&quiesced).len(), 0);

        buffer.resize(3, &quiesced);
        let target = buffer.dma_target(&quiesced);
        assert_eq!(target.len(), 3);
        assert_eq!(target.as_mut_ptr(), base);

        unsafe { target.as_mut_ptr().add(2).write(77) };
        assert_eq!(buffer.slot(2), 77);
    }

    #[test]
    #[should_panic]
    fn resize_beyond_capacity() {
        static STORAGE: StaticCell<[u16; 2]> = StaticCell::new();
        let mut buffer = SampleBuffer::new(STORAGE.init([0; 2]));
        buffer.resize(3, &Quiesced::new());
    }
}
