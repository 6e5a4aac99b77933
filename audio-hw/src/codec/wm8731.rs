//! WM8731-style codec: 7-bit register index, 9-bit register value.
//!
//! The first byte after the device address carries the index in its upper
//! seven bits and value bit 8 in bit 0; the second byte is the low eight bits
//! of the value. Registers are write-only on the real part, so the driver
//! never reads back.

use embedded_hal::i2c::I2c;

use crate::clock::SampleRate;
use crate::control::{CodecOps, RegisterFormat};

pub(crate) mod reg {
    pub const LEFT_LINE_IN: u8 = 0x00;
    pub const RIGHT_LINE_IN: u8 = 0x01;
    pub const LEFT_HP_OUT: u8 = 0x02;
    pub const RIGHT_HP_OUT: u8 = 0x03;
    pub const ANALOG_PATH: u8 = 0x04;
    pub const DIGITAL_PATH: u8 = 0x05;
    pub const POWER_DOWN: u8 = 0x06;
    pub const DIGITAL_IF: u8 = 0x07;
    pub const SAMPLING: u8 = 0x08;
    pub const ACTIVE: u8 = 0x09;
    pub const RESET: u8 = 0x0F;
}

/// Line input: 0 dB, unmuted.
const LINE_IN_0DB: u16 = 0x017;
/// Headphone output: 0 dB.
const HP_OUT_0DB: u16 = 0x079;
/// DAC selected, bypass off, microphone muted.
const ANALOG_DAC_ONLY: u16 = 0x012;
/// Everything on except microphone, oscillator and clock output.
const POWER_LINE_ONLY: u16 = 0x062;
/// Slave, 16-bit words, I2S (Philips) format.
const IF_I2S_16_SLAVE: u16 = 0x002;

/// WM8731-style codec on the control bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Wm8731 {
    address: u8,
}

impl Wm8731 {
    /// Address with CSB tied low.
    pub const DEFAULT_ADDRESS: u8 = 0x1A;

    /// Address with CSB tied high.
    pub const ALT_ADDRESS: u8 = 0x1B;

    /// Codec at [`DEFAULT_ADDRESS`](Self::DEFAULT_ADDRESS).
    pub const fn new() -> Self {
        Self::new_with_address(Self::DEFAULT_ADDRESS)
    }

    /// Codec at a specific 7-bit address.
    pub const fn new_with_address(address: u8) -> Self {
        Self { address }
    }

    /// Sampling-control value for `rate` in normal mode with a 256 × Fs
    /// master clock.
    pub const fn sampling_control(rate: SampleRate) -> u16 {
        match rate {
            SampleRate::Hz44100 => 0x08 << 2,
            SampleRate::Hz32000 => 0x06 << 2,
            // 32 kHz filter code with the core clock halved.
            SampleRate::Hz16000 => (0x06 << 2) | (1 << 6),
        }
    }
}

impl Default for Wm8731 {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFormat for Wm8731 {
    fn format_register_address(&self, index: u8, value: u16) -> u8 {
        (index << 1) | ((value >> 8) as u8 & 1)
    }
}

impl CodecOps for Wm8731 {
    fn address(&self) -> u8 {
        self.address
    }

    fn configure<B: I2c>(&mut self, bus: &mut B, rate: SampleRate) -> Result<(), B::Error> {
        self.write_register(bus, reg::RESET, 0)?;
        // Interface and sampling registers only latch while inactive.
        self.write_register(bus, reg::ACTIVE, 0)?;
        self.write_register(bus, reg::POWER_DOWN, POWER_LINE_ONLY)?;
        self.write_register(bus, reg::LEFT_LINE_IN, LINE_IN_0DB)?;
        self.write_register(bus, reg::RIGHT_LINE_IN, LINE_IN_0DB)?;
        self.write_register(bus, reg::LEFT_HP_OUT, HP_OUT_0DB)?;
        self.write_register(bus, reg::RIGHT_HP_OUT, HP_OUT_0DB)?;
        self.write_register(bus, reg::ANALOG_PATH, ANALOG_DAC_ONLY)?;
        self.write_register(bus, reg::DIGITAL_PATH, 0)?;
        self.write_register(bus, reg::DIGITAL_IF, IF_I2S_16_SLAVE)?;
        self.write_register(bus, reg::SAMPLING, Self::sampling_control(rate))
    }

    fn start<B: I2c>(&mut self, bus: &mut B) -> Result<(), B::Error> {
        self.write_register(bus, reg::ACTIVE, 1)
    }

    fn correct_frame_error<B: I2c>(&mut self, bus: &mut B) -> Result<(), B::Error> {
        // The restart that follows writes ACTIVE again once clocks are back.
        self.write_register(bus, reg::ACTIVE, 0)
    }
}
