//! Driver error type.
//!
//! Only setup-time and recovery-time failures are errors. Steady-state faults
//! (frame slips, underruns, DMA error bits) are counted by
//! [`FaultMonitor`](crate::recovery::FaultMonitor) instead.

use core::fmt;

use crate::control_bus::{BusPhase, BusTimeout};
use crate::recovery::RunState;

/// Errors returned by the lifecycle calls and the recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Requested sample rate is not one of 16000, 32000 or 44100 Hz.
    UnsupportedRate(u32),
    /// A control-bus phase never completed.
    BusTimeout(BusPhase),
    /// PLLI2S never reported lock.
    PllLockTimeout,
    /// A DMA stream never released, never enabled, or its clock never gated.
    DmaTimeout,
    /// The word-select line never went high while starting the receiver.
    WordSelectTimeout,
    /// The call is not valid in the current run state.
    InvalidState(RunState),
}

impl From<BusTimeout> for Error {
    fn from(timeout: BusTimeout) -> Self {
        Error::BusTimeout(timeout.phase)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedRate(hz) => write!(f, "unsupported sample rate {hz} Hz"),
            Error::BusTimeout(phase) => write!(f, "control bus timed out in {phase} phase"),
            Error::PllLockTimeout => f.write_str("PLLI2S did not lock"),
            Error::DmaTimeout => f.write_str("DMA stream did not change state"),
            Error::WordSelectTimeout => f.write_str("word-select line stuck low"),
            Error::InvalidState(state) => write!(f, "operation not valid while {state}"),
        }
    }
}

impl core::error::Error for Error {}
