use crate::io::Half;

/// One block of audio handed to the callback.
///
/// `input` holds the samples just received, `output` the slots to fill for
/// transmission. Both are interleaved `L R L R ...` with `frames` frames.
/// The slices borrow the ready half of the DMA buffers for this call only.
pub struct AudioIo<'a> {
    /// Received samples.
    pub input: &'a [i16],
    /// Samples to transmit. Holds whatever was written two blocks ago until
    /// overwritten.
    pub output: &'a mut [i16],
    /// Frames per channel.
    pub frames: usize,
    /// Interleaved channels in `input`.
    pub channels_in: usize,
    /// Interleaved channels in `output`.
    pub channels_out: usize,
    /// Buffer half being served.
    pub half: Half,
}

impl AudioIo<'_> {
    /// Copy input to output.
    pub fn pass_through(&mut self) {
        let n = self.input.len().min(self.output.len());
        self.output[..n].copy_from_slice(&self.input[..n]);
    }
}

/// Block-rate audio processing, called from the receive interrupt.
///
/// Runs in interrupt context and must finish well inside one block period.
pub trait AudioCallback {
    /// Process one block.
    fn process(&mut self, io: &mut AudioIo<'_>);
}

impl<F> AudioCallback for F
where
    F: FnMut(&mut AudioIo<'_>),
{
    fn process(&mut self, io: &mut AudioIo<'_>) {
        self(io)
    }
}
