use embedded_hal::i2c::I2c;

use crate::clock::SampleRate;
use crate::control_bus;

/// How a codec packs a register index into the first byte of a write.
pub trait RegisterFormat {
    /// First byte sent after the device address for a write of `value` to
    /// register `index`. Must be pure.
    fn format_register_address(&self, index: u8, value: u16) -> u8;
}

/// Codec-specific operations the driver calls around bring-up and recovery.
///
/// Every method takes the control bus explicitly so the same codec value can
/// be driven through the real engine or a mock.
pub trait CodecOps: RegisterFormat {
    /// 7-bit device address.
    fn address(&self) -> u8;

    /// Program the codec for slave-mode 16-bit I2S at `rate`. Runs once the
    /// control bus is powered and before the audio streams are armed.
    fn configure<B: I2c>(&mut self, bus: &mut B, rate: SampleRate) -> Result<(), B::Error>;

    /// Activate the codec once its clocks are running.
    fn start<B: I2c>(&mut self, bus: &mut B) -> Result<(), B::Error>;

    /// Resynchronise the codec after the receiver lost frame alignment.
    fn correct_frame_error<B: I2c>(&mut self, bus: &mut B) -> Result<(), B::Error>;

    /// Write `value` to register `index`.
    fn write_register<B: I2c>(&mut self, bus: &mut B, index: u8, value: u16) -> Result<(), B::Error> {
        let address = self.address();
        control_bus::write_register(bus, &*self, address, index, value)
    }

    /// Read register `index`.
    fn read_register<B: I2c>(&mut self, bus: &mut B, index: u8) -> Result<u16, B::Error> {
        let address = self.address();
        control_bus::read_register(bus, &*self, address, index)
    }
}
