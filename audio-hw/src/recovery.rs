//! Run state, fault accounting and the frame-error recovery state machine.
//!
//! ```text
//!              bus error ISR sees FRE            next receive ISR
//!   Normal ─────────────────────────► FrameErrorPending ─────────► Recovering
//!     ▲                                                               │
//!     └──────────── re-armed (or failed → run state Faulted) ─────────┘
//! ```
//!
//! [`FaultMonitor`] is shared between the interrupt entry points and
//! foreground observers. Every field is an atomic, so observers read
//! consistent single values without masking interrupts.

pub mod events;

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

pub use events::{EventLog, FaultEvent};

/// Capacity of the monitor's event log.
pub const EVENT_LOG_CAPACITY: usize = 16;

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// Never set up, or set up failed before any hardware was configured.
    Uninitialized,
    /// Clocks, buses and streams programmed; streams not armed.
    Configured,
    /// Streams armed and the codec started.
    Running,
    /// Setup, start or a recovery attempt failed part-way. `setup` followed
    /// by `start` clears it.
    Faulted,
}

impl RunState {
    const fn code(self) -> u8 {
        match self {
            RunState::Uninitialized => 0,
            RunState::Configured => 1,
            RunState::Running => 2,
            RunState::Faulted => 3,
        }
    }

    const fn from_code(code: u8) -> Self {
        match code {
            1 => RunState::Configured,
            2 => RunState::Running,
            3 => RunState::Faulted,
            _ => RunState::Uninitialized,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Uninitialized => "uninitialized",
            RunState::Configured => "configured",
            RunState::Running => "running",
            RunState::Faulted => "faulted",
        })
    }
}

/// Frame-error recovery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryState {
    Normal,
    /// A frame error was latched; the next receive interrupt recovers.
    FrameErrorPending,
    /// The receive interrupt is re-initialising the audio path.
    Recovering,
}

impl RecoveryState {
    const fn code(self) -> u8 {
        match self {
            RecoveryState::Normal => 0,
            RecoveryState::FrameErrorPending => 1,
            RecoveryState::Recovering => 2,
        }
    }

    const fn from_code(code: u8) -> Self {
        match code {
            1 => RecoveryState::FrameErrorPending,
            2 => RecoveryState::Recovering,
            _ => RecoveryState::Normal,
        }
    }
}

/// Snapshot of the fault counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultCounts {
    pub frame_errors: u32,
    pub underruns: u32,
    pub transfer_errors: u32,
    pub direct_mode_errors: u32,
    /// Completed recovery cycles.
    pub recoveries: u32,
    /// Callback invocations.
    pub blocks: u32,
    /// Events lost to a full event log.
    pub dropped_events: u32,
}

impl FaultCounts {
    /// Transfer and direct-mode errors combined.
    pub fn dma_errors(&self) -> u32 {
        self.transfer_errors.saturating_add(self.direct_mode_errors)
    }
}

/// Shared fault state of one driver.
pub struct FaultMonitor {
    run_state: AtomicU8,
    recovery_state: AtomicU8,
    frame_error_pending: AtomicBool,
    frame_errors: AtomicU32,
    underruns: AtomicU32,
    transfer_errors: AtomicU32,
    direct_mode_errors: AtomicU32,
    recoveries: AtomicU32,
    blocks: AtomicU32,
    events: EventLog<EVENT_LOG_CAPACITY>,
}

impl FaultMonitor {
    pub const fn new() -> Self {
        Self {
            run_state: AtomicU8::new(RunState::Uninitialized.code()),
            recovery_state: AtomicU8::new(RecoveryState::Normal.code()),
            frame_error_pending: AtomicBool::new(false),
            frame_errors: AtomicU32::new(0),
            underruns: AtomicU32::new(0),
            transfer_errors: AtomicU32::new(0),
            direct_mode_errors: AtomicU32::new(0),
            recoveries: AtomicU32::new(0),
            blocks: AtomicU32::new(0),
            events: EventLog::new(),
        }
    }

    pub fn run_state(&self) -> RunState {
        RunState::from_code(self.run_state.load(Ordering::Acquire))
    }

    pub fn recovery_state(&self) -> RecoveryState {
        RecoveryState::from_code(self.recovery_state.load(Ordering::Acquire))
    }

    /// `true` between a latched frame error and the start of its recovery.
    pub fn frame_error_pending(&self) -> bool {
        self.frame_error_pending.load(Ordering::Acquire)
    }

    /// Current counter values.
    pub fn counts(&self) -> FaultCounts {
        FaultCounts {
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            transfer_errors: self.transfer_errors.load(Ordering::Relaxed),
            direct_mode_errors: self.direct_mode_errors.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            dropped_events: self.events.dropped(),
        }
    }

    /// Transfer and direct-mode errors combined.
    pub fn dma_errors(&self) -> u32 {
        self.counts().dma_errors()
    }

    /// Take the oldest unread fault event. Call from one context only.
    pub fn next_event(&self) -> Option<FaultEvent> {
        self.events.pop()
    }

    pub(crate) fn set_run_state(&self, state: RunState) {
        self.run_state.store(state.code(), Ordering::Release);
    }

    pub(crate) fn set_recovery_state(&self, state: RecoveryState) {
        self.recovery_state.store(state.code(), Ordering::Release);
    }

    /// Latch a frame error for the next receive interrupt.
    pub(crate) fn raise_frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
        self.set_recovery_state(RecoveryState::FrameErrorPending);
        self.frame_error_pending.store(true, Ordering::Release);
        self.events.push(FaultEvent::FrameError);
    }

    /// Consume a latched frame error, moving to `Recovering` if one was set.
    pub(crate) fn take_frame_error(&self) -> bool {
        let pending = self.frame_error_pending.swap(false, Ordering::AcqRel);
        if pending {
            self.set_recovery_state(RecoveryState::Recovering);
        }
        pending
    }

    pub(crate) fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
        self.events.push(FaultEvent::BufferUnderrun);
    }

    pub(crate) fn record_transfer_error(&self) {
        self.transfer_errors.fetch_add(1, Ordering::Relaxed);
        self.events.push(FaultEvent::TransferError);
    }

    pub(crate) fn record_direct_mode_error(&self) {
        self.direct_mode_errors.fetch_add(1, Ordering::Relaxed);
        self.events.push(FaultEvent::DirectModeError);
    }

    pub(crate) fn record_recovery(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for FaultMonitor {
    fn default() -> Self {
        Self::new()
    }
}
