//! Control-bus protocol engine.
//!
//! Drives the I2C master one phase at a time (start, address, data, stop),
//! polling the status flags after each phase with a bounded spin. A bus
//! that never answers surfaces as [`BusTimeout`] naming the phase that
//! stalled; the engine then issues a stop condition so the lines are
//! released for the next attempt.
//!
//! [`ControlBus`] implements [`embedded_hal::i2c::I2c`] with 7-bit
//! addressing, so codec drivers are written against the HAL trait and can be
//! unit-tested with a mock bus. Register access is layered on top by
//! [`write_register`] and [`read_register`], which frame a register index
//! and value through a codec's [`RegisterFormat`].
//!
//! # Wire sequences
//!
//! ```text
//! write_register:  S  addr+W  A  byte1  A  byte2  A  P
//! read_register:   S  addr+W  A  byte1  A  P   S  addr+R  A  msb  A  lsb  N  P
//! ```
//!
//! `byte1` is `format_register_address(index, value)`; `byte2` is the low
//! byte of the value.

use core::fmt;

use embedded_hal::i2c::{self, ErrorType, I2c, Operation};

use crate::control::RegisterFormat;
use crate::hal::{BusFlags, ControlBusPeripheral};
use crate::poll::spin_until;

/// Protocol phase a control-bus wait belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusPhase {
    /// Waiting for the start condition and master mode.
    Start,
    /// Waiting for the address to be acknowledged.
    Address,
    /// Waiting for the data register to drain.
    Transmit,
    /// Waiting for a received byte.
    Receive,
    /// Waiting for the bus to go idle after a stop condition.
    Stop,
    /// Waiting for the bus to go idle during a software reset.
    Reset,
}

impl fmt::Display for BusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusPhase::Start => "start",
            BusPhase::Address => "address",
            BusPhase::Transmit => "transmit",
            BusPhase::Receive => "receive",
            BusPhase::Stop => "stop",
            BusPhase::Reset => "reset",
        })
    }
}

/// A control-bus phase did not complete within the spin limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusTimeout {
    /// The phase that stalled.
    pub phase: BusPhase,
}

impl fmt::Display for BusTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "control bus timed out in {} phase", self.phase)
    }
}

impl core::error::Error for BusTimeout {}

impl i2c::Error for BusTimeout {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Write,
    Read,
}

/// Polled I2C master over a [`ControlBusPeripheral`].
pub struct ControlBus<I> {
    i2c: I,
    spin_limit: u32,
}

impl<I> ControlBus<I>
where
    I: ControlBusPeripheral,
{
    /// Wrap a peripheral. Every phase waits at most `spin_limit` status
    /// reads.
    pub fn new(i2c: I, spin_limit: u32) -> Self {
        Self { i2c, spin_limit }
    }

    /// Release the peripheral.
    pub fn release(self) -> I {
        self.i2c
    }

    /// Clock, mux and enable the peripheral.
    pub fn power_up(&mut self) {
        self.i2c.power_up();
    }

    /// Gate the peripheral.
    pub fn power_down(&mut self) {
        self.i2c.power_down();
    }

    /// Pulse the software reset and wait for the lines to go idle.
    ///
    /// The reset is released even when the wait times out.
    pub fn software_reset(&mut self) -> Result<(), BusTimeout> {
        self.i2c.set_software_reset(true);
        let idle = self.wait(BusPhase::Reset, |flags| !flags.contains(BusFlags::BUSY));
        self.i2c.set_software_reset(false);
        idle
    }

    /// Write `value` to register `index` of the device at 7-bit `address`.
    pub fn write_register<F>(&mut self, format: &F, address: u8, index: u8, value: u16) -> Result<(), BusTimeout>
    where
        F: RegisterFormat + ?Sized,
    {
        write_register(self, format, address, index, value)
    }

    /// Read register `index` of the device at 7-bit `address`.
    pub fn read_register<F>(&mut self, format: &F, address: u8, index: u8) -> Result<u16, BusTimeout>
    where
        F: RegisterFormat + ?Sized,
    {
        read_register(self, format, address, index)
    }

    fn wait<F>(&mut self, phase: BusPhase, mut done: F) -> Result<(), BusTimeout>
    where
        F: FnMut(BusFlags) -> bool,
    {
        let i2c = &mut self.i2c;
        spin_until(self.spin_limit, || done(i2c.flags())).map_err(|_| BusTimeout { phase })
    }

    fn address_phase(&mut self, address: u8, direction: Direction) -> Result<(), BusTimeout> {
        if direction == Direction::Read {
            self.i2c.set_ack(true);
        }
        self.i2c.generate_start();
        self.wait(BusPhase::Start, |flags| {
            flags.contains(BusFlags::START_SENT | BusFlags::MASTER)
        })?;

        let rw = match direction {
            Direction::Write => 0,
            Direction::Read => 1,
        };
        debug_assert!(address < 0x80, "expected a 7-bit device address, got {:#04x}", address);
        self.i2c.write_data(((address & 0x7F) << 1) | rw);
        self.wait(BusPhase::Address, |flags| flags.contains(BusFlags::ADDRESS_SENT))
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), BusTimeout> {
        for &byte in bytes {
            self.wait(BusPhase::Transmit, |flags| flags.contains(BusFlags::TX_EMPTY))?;
            self.i2c.write_data(byte);
        }
        self.wait(BusPhase::Transmit, |flags| flags.contains(BusFlags::TX_EMPTY))
    }

    fn receive(&mut self, buffer: &mut [u8], nack_last: bool) -> Result<(), BusTimeout> {
        let last = buffer.len().saturating_sub(1);
        for (i, byte) in buffer.iter_mut().enumerate() {
            if nack_last && i == last {
                self.i2c.set_ack(false);
            }
            self.wait(BusPhase::Receive, |flags| flags.contains(BusFlags::RX_NOT_EMPTY))?;
            *byte = self.i2c.read_data();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BusTimeout> {
        self.i2c.generate_stop();
        self.wait(BusPhase::Stop, |flags| !flags.contains(BusFlags::BUSY))
    }

    fn run(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusTimeout> {
        let mut previous = None;
        for i in 0..operations.len() {
            let next_is_read = matches!(operations.get(i + 1), Some(Operation::Read(_)));
            match &mut operations[i] {
                Operation::Write(bytes) => {
                    if previous != Some(Direction::Write) {
                        self.address_phase(address, Direction::Write)?;
                    }
                    self.transmit(bytes)?;
                    previous = Some(Direction::Write);
                }
                Operation::Read(buffer) => {
                    if previous != Some(Direction::Read) {
                        self.address_phase(address, Direction::Read)?;
                    }
                    self.receive(buffer, !next_is_read)?;
                    previous = Some(Direction::Read);
                }
            }
        }
        self.stop()
    }
}

impl<I> ErrorType for ControlBus<I> {
    type Error = BusTimeout;
}

impl<I> I2c for ControlBus<I>
where
    I: ControlBusPeripheral,
{
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        let result = self.run(address, operations);
        if let Err(timeout) = result {
            debug!("control bus stalled in {} phase, releasing", timeout.phase);
            self.i2c.set_ack(false);
            self.i2c.generate_stop();
        }
        result
    }
}

/// Write `value` to register `index`: one transaction carrying the framed
/// address byte and the low value byte.
pub fn write_register<B, F>(bus: &mut B, format: &F, address: u8, index: u8, value: u16) -> Result<(), B::Error>
where
    B: I2c,
    F: RegisterFormat + ?Sized,
{
    let frame = [format.format_register_address(index, value), value as u8];
    bus.write(address, &frame)
}

/// Read register `index`: a write transaction selecting the register, then
/// a separate read transaction returning the value most significant byte
/// first.
pub fn read_register<B, F>(bus: &mut B, format: &F, address: u8, index: u8) -> Result<u16, B::Error>
where
    B: I2c,
    F: RegisterFormat + ?Sized,
{
    bus.write(address, &[format.format_register_address(index, 0)])?;
    let mut value = [0u8; 2];
    bus.read(address, &mut value)?;
    Ok(u16::from_be_bytes(value))
}
