/// Number of frames per channel handed to the audio callback per block.
pub const AUDIO_BLOCK_FRAMES: usize = 128;

/// Channels carried on the audio bus in each direction (stereo framing).
pub const CODEC_CHANNELS: usize = 2;

/// Interleaved 16-bit samples in one block (one half of a DMA buffer).
pub const BLOCK_SAMPLES: usize = AUDIO_BLOCK_FRAMES * CODEC_CHANNELS;

/// Samples in each circular DMA buffer: two blocks, one per half.
pub const DMA_BUFFER_SAMPLES: usize = BLOCK_SAMPLES * 2;

/// Mask applied to transfer-count deltas. Valid because the buffer length
/// is a power of two.
pub const DMA_COUNT_MASK: u16 = (DMA_BUFFER_SAMPLES - 1) as u16;

/// PLLI2S input frequency after the shared `PLLM` prescaler.
pub const PLL_INPUT_HZ: u32 = 1_000_000;

const _: () = assert!(DMA_BUFFER_SAMPLES.is_power_of_two());
const _: () = assert!(DMA_BUFFER_SAMPLES <= u16::MAX as usize);
