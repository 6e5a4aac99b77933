//! DMA stream configuration for the two audio transfers.

use crate::constants::DMA_BUFFER_SAMPLES;
use crate::hal::{DmaStream, StreamEvents};
use crate::poll::spin_until;
use crate::Error;

/// Request channel of the transmit stream (stream 7).
pub const TX_CHANNEL: u8 = 0;
/// Request channel of the receive stream (stream 0).
pub const RX_CHANNEL: u8 = 3;

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Buffer to audio bus data register.
    MemoryToPeripheral,
    /// Audio bus data register to buffer.
    PeripheralToMemory,
}

/// Stream arbitration priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// FIFO usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FifoMode {
    /// No FIFO; every request moves one item.
    Direct,
    /// Full-threshold FIFO with 8-beat memory and peripheral bursts.
    Burst8,
}

#[cfg(feature = "direct-mode")]
const FIFO_MODE: FifoMode = FifoMode::Direct;
#[cfg(not(feature = "direct-mode"))]
const FIFO_MODE: FifoMode = FifoMode::Burst8;

/// Everything programmed into one stream before it is armed.
///
/// Items are 16 bits on both sides; the peripheral address is fixed by the
/// board implementation and never increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    pub channel: u8,
    pub direction: Direction,
    pub priority: Priority,
    /// Start of the circular buffer.
    pub memory_address: u32,
    /// Items per wrap (`NDTR` reload value).
    pub items: u16,
    pub circular: bool,
    pub memory_increment: bool,
    pub fifo: FifoMode,
    /// Interrupt enables.
    pub interrupts: StreamEvents,
}

impl StreamConfig {
    fn audio(channel: u8, direction: Direction, memory_address: u32, interrupts: StreamEvents) -> Self {
        Self {
            channel,
            direction,
            priority: Priority::VeryHigh,
            memory_address,
            items: DMA_BUFFER_SAMPLES as u16,
            circular: true,
            memory_increment: true,
            fifo: FIFO_MODE,
            interrupts,
        }
    }

    /// Transmit stream over the buffer at `memory_address`. Only error
    /// interrupts are enabled; the receive stream paces the callback.
    pub fn transmit(memory_address: u32) -> Self {
        Self::audio(
            TX_CHANNEL,
            Direction::MemoryToPeripheral,
            memory_address,
            StreamEvents::TRANSFER_ERROR | StreamEvents::DIRECT_MODE_ERROR,
        )
    }

    /// Receive stream over the buffer at `memory_address`.
    pub fn receive(memory_address: u32) -> Self {
        Self::audio(
            RX_CHANNEL,
            Direction::PeripheralToMemory,
            memory_address,
            StreamEvents::HALF_TRANSFER
                | StreamEvents::TRANSFER_COMPLETE
                | StreamEvents::TRANSFER_ERROR
                | StreamEvents::DIRECT_MODE_ERROR,
        )
    }
}

/// Disable `stream` and wait for the hardware to release it.
pub(crate) fn release<S: DmaStream>(stream: &mut S, spin_limit: u32) -> Result<(), Error> {
    stream.disable();
    spin_until(spin_limit, || !stream.is_enabled()).map_err(|_| Error::DmaTimeout)
}

/// Release, program and clear a stream, leaving it disarmed.
pub(crate) fn prepare<S: DmaStream>(stream: &mut S, config: &StreamConfig, spin_limit: u32) -> Result<(), Error> {
    release(stream, spin_limit)?;
    stream.configure(config);
    stream.clear(StreamEvents::all());
    Ok(())
}
