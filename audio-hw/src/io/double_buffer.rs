//! Circular DMA buffers split into two halves.
//!
//! Both streams run over their whole buffer in circular mode. At any moment
//! the DMA engine owns one half (the *active* half) and software owns the
//! other (the *ready* half). The half-transfer interrupt hands the first
//! half to software, transfer-complete hands over the second:
//!
//! ```text
//!            ┌──────── first half ────────┬──────── second half ───────┐
//! rx / tx    │ L R L R ... (BLOCK_SAMPLES) │ L R L R ... (BLOCK_SAMPLES)│
//!            └────────────────────────────┴────────────────────────────┘
//!   HT ─► software owns first, DMA moves on to second
//!   TC ─► software owns second, DMA wraps to first
//! ```

use core::ops::Range;

use crate::constants::{BLOCK_SAMPLES, DMA_BUFFER_SAMPLES};

/// Backing storage for both streams.
///
/// Place this in DMA-reachable RAM (a `static` in `.bss` on the target);
/// the driver borrows it for its whole lifetime.
#[repr(C, align(4))]
pub struct DmaBuffers {
    tx: [i16; DMA_BUFFER_SAMPLES],
    rx: [i16; DMA_BUFFER_SAMPLES],
}

impl DmaBuffers {
    /// Zeroed buffers.
    pub const fn new() -> Self {
        Self {
            tx: [0; DMA_BUFFER_SAMPLES],
            rx: [0; DMA_BUFFER_SAMPLES],
        }
    }
}

impl Default for DmaBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// One half of a circular buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    /// Samples `0..BLOCK_SAMPLES`.
    First,
    /// Samples `BLOCK_SAMPLES..DMA_BUFFER_SAMPLES`.
    Second,
}

impl Half {
    /// The opposite half.
    pub const fn other(self) -> Half {
        match self {
            Half::First => Half::Second,
            Half::Second => Half::First,
        }
    }

    /// Sample range of this half within a buffer.
    pub const fn range(self) -> Range<usize> {
        match self {
            Half::First => 0..BLOCK_SAMPLES,
            Half::Second => BLOCK_SAMPLES..DMA_BUFFER_SAMPLES,
        }
    }
}

/// Ownership tracker over [`DmaBuffers`].
pub struct DoubleBuffer<'b> {
    buffers: &'b mut DmaBuffers,
    ready: Half,
}

impl<'b> DoubleBuffer<'b> {
    /// Streams start on the first half, so software initially owns the
    /// second.
    pub fn new(buffers: &'b mut DmaBuffers) -> Self {
        Self {
            buffers,
            ready: Half::Second,
        }
    }

    /// Half the DMA engine is currently working through.
    pub fn active_half(&self) -> Half {
        self.ready.other()
    }

    /// Half software may read (receive) and fill (transmit).
    pub fn ready_half(&self) -> Half {
        self.ready
    }

    /// Address of the transmit buffer, for stream configuration.
    pub fn tx_address(&self) -> u32 {
        self.buffers.tx.as_ptr() as usize as u32
    }

    /// Address of the receive buffer, for stream configuration.
    pub fn rx_address(&self) -> u32 {
        self.buffers.rx.as_ptr() as usize as u32
    }

    /// Received samples in `half`.
    pub fn input(&self, half: Half) -> &[i16] {
        &self.buffers.rx[half.range()]
    }

    /// Samples queued for transmission in `half`.
    pub fn output(&self, half: Half) -> &[i16] {
        &self.buffers.tx[half.range()]
    }

    pub(crate) fn mark_ready(&mut self, half: Half) {
        self.ready = half;
    }

    /// Zero both buffers and hand the second half back to software.
    pub(crate) fn reset(&mut self) {
        self.buffers.tx.fill(0);
        self.buffers.rx.fill(0);
        self.ready = Half::Second;
    }

    /// Realign ownership with freshly re-armed streams without touching the
    /// sample data.
    pub(crate) fn rewind(&mut self) {
        self.ready = Half::Second;
    }

    /// Receive and transmit slices of the ready half.
    pub(crate) fn ready_slices(&mut self) -> (&[i16], &mut [i16]) {
        let range = self.ready.range();
        (&self.buffers.rx[range.clone()], &mut self.buffers.tx[range])
    }

    #[cfg(test)]
    pub(crate) fn rx_mut(&mut self) -> &mut [i16] {
        &mut self.buffers.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_partition_the_buffer() {
        assert_eq!(Half::First.range().len(), BLOCK_SAMPLES);
        assert_eq!(Half::Second.range().len(), BLOCK_SAMPLES);
        assert_eq!(Half::First.range().end, Half::Second.range().start);
        assert_eq!(Half::Second.range().end, DMA_BUFFER_SAMPLES);
        assert_eq!(Half::First.other(), Half::Second);
    }

    #[test]
    fn active_is_always_the_other_half() {
        let mut storage = DmaBuffers::new();
        let mut db = DoubleBuffer::new(&mut storage);
        assert_eq!(db.ready_half(), Half::Second);
        assert_eq!(db.active_half(), Half::First);

        db.mark_ready(Half::First);
        assert_eq!(db.active_half(), Half::Second);
    }

    #[test]
    fn ready_slices_cover_the_ready_half() {
        let mut storage = DmaBuffers::new();
        let mut db = DoubleBuffer::new(&mut storage);
        db.rx_mut()[BLOCK_SAMPLES] = 7;

        db.mark_ready(Half::Second);
        let (input, output) = db.ready_slices();
        assert_eq!(input[0], 7);
        output[0] = -3;

        assert_eq!(db.output(Half::Second)[0], -3);
        assert!(db.output(Half::First).iter().all(|&s| s == 0));
    }

    #[test]
    fn reset_zeroes_and_rewinds() {
        let mut storage = DmaBuffers::new();
        let mut db = DoubleBuffer::new(&mut storage);
        db.rx_mut().fill(1);
        db.mark_ready(Half::First);
        db.ready_slices().1.fill(2);

        db.reset();
        assert_eq!(db.ready_half(), Half::Second);
        assert!(db.input(Half::First).iter().all(|&s| s == 0));
        assert!(db.output(Half::First).iter().all(|&s| s == 0));
    }
}
