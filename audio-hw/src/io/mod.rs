//! Audio sample transport.
//!
//! ## Components
//!
//! | Item | Role |
//! |------|------|
//! | [`DmaBuffers`] | Static backing storage for both directions |
//! | [`DoubleBuffer`] | Tracks which half software owns |
//! | [`StreamConfig`] | Programming for the transmit and receive streams |
//!
//! ## DMA Buffer Layout
//!
//! Each direction uses a circular `[i16; DMA_BUFFER_SAMPLES]`:
//! - Samples are interleaved `L R L R ...`, one `i16` per channel slot
//! - Buffer is split into two halves of `BLOCK_SAMPLES` each
//! - The receive stream fires half-transfer and transfer-complete
//! - The interrupt handler reads and fills the ready half while DMA works
//!   through the active half

pub mod double_buffer;
pub mod stream;

pub use double_buffer::{DmaBuffers, DoubleBuffer, Half};
pub use stream::{Direction, FifoMode, Priority, StreamConfig};
