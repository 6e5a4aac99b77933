//! Bounded lock-free fault event log.
//!
//! Interrupt handlers push [`FaultEvent`]s; the foreground drains them.
//! Events are stored as one `AtomicU8` code per slot, so the log needs no
//! `unsafe` and no critical sections.
//!
//! # Concurrency contract
//!
//! - Any number of interrupt contexts may call [`push()`](EventLog::push),
//!   including ones that preempt each other.
//! - Only ONE context may call [`pop()`](EventLog::pop).
//!
//! When the log is full the newest event is dropped and counted; counters in
//! [`FaultMonitor`](super::FaultMonitor) stay exact either way.

use core::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

/// A steady-state fault. Never returned as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultEvent {
    /// The receive block lost frame alignment.
    FrameError,
    /// The callback overran its block.
    BufferUnderrun,
    /// A DMA stream reported a bus error.
    TransferError,
    /// A DMA stream in direct mode missed a request.
    DirectModeError,
}

const EMPTY: u8 = 0;

impl FaultEvent {
    const fn code(self) -> u8 {
        match self {
            FaultEvent::FrameError => 1,
            FaultEvent::BufferUnderrun => 2,
            FaultEvent::TransferError => 3,
            FaultEvent::DirectModeError => 4,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FaultEvent::FrameError),
            2 => Some(FaultEvent::BufferUnderrun),
            3 => Some(FaultEvent::TransferError),
            4 => Some(FaultEvent::DirectModeError),
            _ => None,
        }
    }
}

/// Fixed-capacity event log holding up to `N` events.
pub struct EventLog<const N: usize> {
    slots: [AtomicU8; N],
    /// Slots reserved by producers, wrapping.
    head: AtomicUsize,
    /// Slots consumed, wrapping. Only advanced by the consumer.
    tail: AtomicUsize,
    dropped: AtomicU32,
}

impl<const N: usize> EventLog<N> {
    /// Empty log.
    pub const fn new() -> Self {
        assert!(N >= 1, "event log needs at least one slot");
        Self {
            slots: [const { AtomicU8::new(EMPTY) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Append `event`. Returns `false` and counts a drop if the log is full.
    pub fn push(&self, event: FaultEvent) -> bool {
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            if head.wrapping_sub(tail) >= N {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            match self
                .head
                .compare_exchange_weak(head, head.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => head = current,
            }
        }
        // The consumer empties a slot before advancing past it, so the
        // reserved slot is free.
        self.slots[head % N].store(event.code(), Ordering::Release);
        true
    }

    /// Take the oldest event.
    ///
    /// A slot reserved by a producer that has not finished writing reads as
    /// empty; the event shows up on a later call.
    pub fn pop(&self) -> Option<FaultEvent> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        let code = self.slots[tail % N].swap(EMPTY, Ordering::AcqRel);
        let event = FaultEvent::from_code(code)?;
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(event)
    }

    /// Events waiting to be popped, including reserved but unwritten slots.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events discarded because the log was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}
