//! # audio-hw
//!
//! A `no_std` full-duplex audio I/O driver for STM32F4-class parts: an I2S
//! bus clocked from the dedicated audio PLL, two circular DMA streams moving
//! 16-bit interleaved stereo between memory and the bus, block-rate dispatch
//! to an application callback, frame-error recovery, and a polled I2C engine
//! that programs the external codec.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Seams | [`hal`] | Traits a board implements over its register access crate |
//! | Clocks | [`clock`] | PLL and prescaler table per sample rate |
//! | Control | [`control_bus`] / [`control`] / [`codec`] | I2C engine, `CodecOps`, codec families |
//! | Transport | [`io`] | Double-buffer ownership and stream programming |
//! | Dispatch | [`driver`] / [`process`] | Lifecycle, interrupt entry points, callback |
//! | Faults | [`recovery`] | Run state, counters, event log, recovery states |
//! | Inputs | [`control_inputs`] | Control-voltage ADC interface |
//!
//! ## Quick start
//!
//! ```ignore
//! use audio_hw::codec::Wm8731;
//! use audio_hw::{AudioDriver, AudioIo, DmaBuffers, DriverConfig, FaultMonitor};
//!
//! static MONITOR: FaultMonitor = FaultMonitor::new();
//!
//! let mut driver = AudioDriver::new(
//!     board.audio_peripherals(),
//!     Wm8731::new(),
//!     |io: &mut AudioIo<'_>| io.pass_through(),
//!     buffers,
//!     &MONITOR,
//!     DriverConfig::default(),
//! );
//! driver.setup(44_100)?;
//! driver.start()?;
//!
//! // DMA1_STREAM0:  driver.on_rx_interrupt()
//! // DMA1_STREAM7:  driver.on_tx_interrupt()
//! // SPI3:          driver.on_bus_error_interrupt()
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `wm8731` | yes | WM8731-style codec family |
//! | `cs4270` | yes | CS4270-style codec family |
//! | `direct-mode` | no | DMA direct mode instead of 8-beat FIFO bursts |
//! | `defmt` | no | Logging through `defmt`, `defmt::Format` on public types |
//! | `log` | no | Logging through the `log` facade |
//!
//! ## Audio parameters
//!
//! - **Block size:** 128 frames ([`constants::AUDIO_BLOCK_FRAMES`])
//! - **Channels:** 2 in, 2 out, interleaved ([`constants::CODEC_CHANNELS`])
//! - **Sample rates:** 16 000, 32 000, 44 100 Hz ([`SampleRate`])
//! - **Sample format:** `i16` (signed 16-bit, Philips I2S framing)

#![no_std]

#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod constants;
pub mod config;
pub mod error;
pub mod poll;
pub mod hal;
pub mod clock;
pub mod control_bus;
pub mod control;
pub mod io;
pub mod process;
pub mod recovery;
pub mod driver;
pub mod control_inputs;

#[cfg(any(feature = "wm8731", feature = "cs4270"))]
pub mod codec;

#[cfg(test)]
pub(crate) mod sim;

pub use clock::SampleRate;
pub use config::{DriverConfig, SpinLimits};
pub use control::{CodecOps, RegisterFormat};
pub use control_bus::{BusPhase, BusTimeout, ControlBus};
pub use driver::AudioDriver;
pub use error::Error;
pub use io::{DmaBuffers, Half};
pub use process::{AudioCallback, AudioIo};
pub use recovery::{FaultCounts, FaultEvent, FaultMonitor, RecoveryState, RunState};
