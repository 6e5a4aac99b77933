//! Hardware seams.
//!
//! The driver never touches registers directly. Each peripheral it needs is
//! expressed as a small trait whose methods map one-to-one onto register
//! operations of the STM32F4 RCC, SPI3/I2S3ext, DMA1 and I2C2 blocks. A
//! board crate implements them over its PAC; the test suite implements them
//! over simulated state.
//!
//! | Trait | Hardware |
//! |-------|----------|
//! | [`AudioPll`] | `RCC` PLLI2S |
//! | [`AudioBus`] | `SPI3` (master TX) + `I2S3ext` (slave RX), NVIC `SPI3` line |
//! | [`DmaController`] | `DMA1` clock and reset |
//! | [`DmaStream`] | `DMA1_Stream7` (TX) / `DMA1_Stream0` (RX) + NVIC lines |
//! | [`ControlBusPeripheral`] | `I2C2` |
//! | [`BoardPins`] | GPIO muxing for the audio bus, error indicator pin |

use bitflags::bitflags;

use crate::clock::{Prescaler, SampleRate};
use crate::io::stream::StreamConfig;

/// Dedicated audio PLL (PLLI2S).
pub trait AudioPll {
    /// Stop the PLL.
    fn disable(&mut self);
    /// Select the PLL as audio-bus kernel clock and program the multiplier
    /// (`N`) and output divider (`R`). Only called while disabled.
    fn configure(&mut self, multiplier: u16, divider: u8);
    /// Start the PLL.
    fn enable(&mut self);
    /// `true` once the PLL reports lock.
    fn is_locked(&mut self) -> bool;
}

/// I2S framing standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Standard {
    /// Philips I2S: data delayed one bit clock after the word-select edge.
    Philips,
    /// MSB-justified.
    LeftJustified,
}

/// Word format programmed into both audio-bus blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusFormat {
    /// Framing standard.
    pub standard: Standard,
    /// Bits of sample data per channel slot.
    pub data_bits: u8,
    /// Width of each channel slot in bit clocks.
    pub channel_bits: u8,
}

impl BusFormat {
    /// Philips framing, 16-bit data in 16-bit slots.
    pub const PHILIPS_16: Self = Self {
        standard: Standard::Philips,
        data_bits: 16,
        channel_bits: 16,
    };
}

/// The duplex audio bus: a master transmit block plus the extended block
/// running as slave receiver on the same clocks.
pub trait AudioBus {
    /// Enable the bus clock and pulse the peripheral reset.
    fn power_up(&mut self);
    /// Gate the bus clock.
    fn power_down(&mut self);
    /// `true` while the bus clock is enabled.
    fn is_powered(&mut self) -> bool;
    /// Write the same prescaler to the master and extended blocks.
    fn set_prescaler(&mut self, prescaler: Prescaler);
    /// Configure the master block as transmitter and the extended block as
    /// slave receiver with `format`, enable their DMA requests, and leave
    /// both blocks disabled.
    fn configure(&mut self, format: BusFormat);
    /// Enable or disable the error interrupt of both blocks.
    fn set_error_interrupts(&mut self, enabled: bool);
    /// Enable the master (transmit) block. This starts the bit clocks.
    fn enable_transmitter(&mut self);
    /// Enable the extended (receive) block.
    fn enable_receiver(&mut self);
    /// Disable both blocks.
    fn disable(&mut self);
    /// Current level of the word-select line.
    fn word_select_high(&mut self) -> bool;
    /// Read the extended block status and report its frame-error bit.
    fn frame_error(&mut self) -> bool;
    /// Mask or unmask the bus error interrupt line.
    fn set_interrupt_line(&mut self, enabled: bool);
    /// Drop a pending bus error interrupt.
    fn clear_pending_interrupt(&mut self);
}

/// The DMA controller shared by both audio streams.
pub trait DmaController {
    /// Enable the controller clock and pulse its reset.
    fn power_up(&mut self);
    /// Gate the controller clock.
    fn power_down(&mut self);
    /// `true` while the controller clock is enabled.
    fn is_powered(&mut self) -> bool;
}

bitflags! {
    /// Status / interrupt bits of one DMA stream, in stream-relative
    /// positions (the layout of stream 0 in `LISR`).
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct StreamEvents: u8 {
        /// FIFO overrun/underrun.
        const FIFO_ERROR = 1 << 0;
        /// Direct-mode error.
        const DIRECT_MODE_ERROR = 1 << 2;
        /// Bus error on a transfer.
        const TRANSFER_ERROR = 1 << 3;
        /// First half of the buffer transferred.
        const HALF_TRANSFER = 1 << 4;
        /// Whole buffer transferred; the stream wrapped.
        const TRANSFER_COMPLETE = 1 << 5;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StreamEvents {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "StreamEvents({=u8:#x})", self.bits())
    }
}

/// One DMA stream.
pub trait DmaStream {
    /// `true` while the stream's enable bit reads back set.
    fn is_enabled(&mut self) -> bool;
    /// Request the stream to stop. Hardware may take a while to release it.
    fn disable(&mut self);
    /// Program addresses, item count and control bits. Only called while
    /// the stream is disabled.
    fn configure(&mut self, config: &StreamConfig);
    /// Arm the stream.
    fn enable(&mut self);
    /// Items left before the stream wraps (`NDTR`).
    fn remaining(&mut self) -> u16;
    /// Pending status bits.
    fn events(&mut self) -> StreamEvents;
    /// Clear the given status bits.
    fn clear(&mut self, events: StreamEvents);
    /// Mask or unmask the stream's interrupt line.
    fn set_interrupt_line(&mut self, enabled: bool);
    /// Drop a pending interrupt on the stream's line.
    fn clear_pending_interrupt(&mut self);
}

bitflags! {
    /// Control-bus status as read from `SR1 << 16 | SR2`.
    ///
    /// Reading both halves in that order also clears the address-sent bit,
    /// which the protocol engine relies on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusFlags: u32 {
        /// `SR2.MSL`: peripheral is bus master.
        const MASTER = 1 << 0;
        /// `SR2.BUSY`: lines are not idle.
        const BUSY = 1 << 1;
        /// `SR1.SB`: start condition generated.
        const START_SENT = 1 << 16;
        /// `SR1.ADDR`: address sent and acknowledged.
        const ADDRESS_SENT = 1 << 17;
        /// `SR1.BTF`: byte transfer finished.
        const BYTE_FINISHED = 1 << 18;
        /// `SR1.RXNE`: a received byte is waiting.
        const RX_NOT_EMPTY = 1 << 22;
        /// `SR1.TXE`: data register empty.
        const TX_EMPTY = 1 << 23;
        /// `SR1.AF`: acknowledge failure.
        const ACK_FAILURE = 1 << 26;
    }
}

/// The low-speed control bus peripheral (I2C master).
pub trait ControlBusPeripheral {
    /// Enable clocks, mux the pins (open drain, pulled up), drive the codec
    /// address pin low, reset the block, program bus timing and enable it.
    fn power_up(&mut self);
    /// Gate the bus clock and its pin banks.
    fn power_down(&mut self);
    /// Read the status registers.
    fn flags(&mut self) -> BusFlags;
    /// Request a (repeated) start condition.
    fn generate_start(&mut self);
    /// Request a stop condition.
    fn generate_stop(&mut self);
    /// Acknowledge received bytes (`true`) or answer with NACK (`false`).
    fn set_ack(&mut self, enabled: bool);
    /// Assert or release the software reset of the block.
    fn set_software_reset(&mut self, asserted: bool);
    /// Load the data register.
    fn write_data(&mut self, byte: u8);
    /// Read the data register.
    fn read_data(&mut self) -> u8;
}

/// Board-level pin handling around the audio bus.
pub trait BoardPins {
    /// Clock the GPIO banks and mux MCK/CK/WS/SD/ext_SD for `rate`.
    fn configure_audio_pins(&mut self, rate: SampleRate);
    /// Return the audio pins to their reset state and gate their banks.
    fn release_audio_pins(&mut self);
    /// Drive the error indicator output.
    fn set_error_indicator(&mut self, on: bool);
}

/// A concrete set of peripheral implementations.
pub trait Platform {
    /// Audio PLL.
    type Pll: AudioPll;
    /// Duplex audio bus.
    type Bus: AudioBus;
    /// DMA controller.
    type Dma: DmaController;
    /// DMA stream type, used for both directions.
    type Stream: DmaStream;
    /// Control bus.
    type ControlBus: ControlBusPeripheral;
    /// Board pins.
    type Pins: BoardPins;
}

/// Everything the driver takes ownership of.
pub struct Peripherals<P: Platform> {
    /// Audio PLL.
    pub pll: P::Pll,
    /// Duplex audio bus.
    pub bus: P::Bus,
    /// DMA controller.
    pub dma: P::Dma,
    /// Memory→peripheral stream.
    pub tx: P::Stream,
    /// Peripheral→memory stream.
    pub rx: P::Stream,
    /// Control bus.
    pub control: P::ControlBus,
    /// Board pins.
    pub pins: P::Pins,
}
