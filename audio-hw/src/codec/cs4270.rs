//! CS4270-style codec: 8-bit memory address pointer, 8-bit register value.

use embedded_hal::i2c::I2c;

use crate::clock::SampleRate;
use crate::control::{CodecOps, RegisterFormat};

pub(crate) mod reg {
    pub const DEVICE_ID: u8 = 0x01;
    pub const POWER_CONTROL: u8 = 0x02;
    pub const MODE_CONTROL: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const TRANSITION: u8 = 0x05;
    pub const MUTE: u8 = 0x06;
    pub const VOLUME_A: u8 = 0x07;
    pub const VOLUME_B: u8 = 0x08;
}

/// `POWER_CONTROL.PDN`: whole device powered down.
const PDN: u16 = 1 << 0;
/// Single-speed mode, MCLK / LRCK = 256, pop guard on.
const MODE_SINGLE_SPEED_256: u16 = 0x01;
/// ADC and DAC both in I2S format.
const IF_I2S_BOTH: u16 = (1 << 3) | 0x01;
/// Soft ramp and zero-cross on volume changes.
const SOFT_RAMP_ZERO_CROSS: u16 = 0x60;

/// Auto-increment bit of the map byte. Never set: every write targets one
/// register.
const MAP_INCR: u8 = 1 << 7;

/// CS4270-style codec on the control bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cs4270 {
    address: u8,
}

impl Cs4270 {
    /// Address with AD0..AD2 tied low.
    pub const DEFAULT_ADDRESS: u8 = 0x48;

    /// Codec at [`DEFAULT_ADDRESS`](Self::DEFAULT_ADDRESS).
    pub const fn new() -> Self {
        Self::new_with_address(Self::DEFAULT_ADDRESS)
    }

    /// Codec at a specific 7-bit address.
    pub const fn new_with_address(address: u8) -> Self {
        Self { address }
    }

    /// Read the device/revision register.
    pub fn device_id<B: I2c>(&mut self, bus: &mut B) -> Result<u8, B::Error> {
        self.read_register(bus, reg::DEVICE_ID).map(|value| value as u8)
    }
}

impl Default for Cs4270 {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFormat for Cs4270 {
    fn format_register_address(&self, index: u8, _value: u16) -> u8 {
        index & !MAP_INCR
    }
}

impl CodecOps for Cs4270 {
    fn address(&self) -> u8 {
        self.address
    }

    // All supported rates are single-speed at 256 × Fs, so the rate does
    // not change the register contents.
    fn configure<B: I2c>(&mut self, bus: &mut B, _rate: SampleRate) -> Result<(), B::Error> {
        self.write_register(bus, reg::POWER_CONTROL, PDN)?;
        self.write_register(bus, reg::MODE_CONTROL, MODE_SINGLE_SPEED_256)?;
        self.write_register(bus, reg::INTERFACE, IF_I2S_BOTH)?;
        self.write_register(bus, reg::TRANSITION, SOFT_RAMP_ZERO_CROSS)?;
        self.write_register(bus, reg::MUTE, 0)?;
        self.write_register(bus, reg::VOLUME_A, 0)?;
        self.write_register(bus, reg::VOLUME_B, 0)
    }

    fn start<B: I2c>(&mut self, bus: &mut B) -> Result<(), B::Error> {
        self.write_register(bus, reg::POWER_CONTROL, 0)
    }

    fn correct_frame_error<B: I2c>(&mut self, bus: &mut B) -> Result<(), B::Error> {
        self.write_register(bus, reg::POWER_CONTROL, PDN)
    }
}
