//! Driver configuration.

/// Iteration bounds for every hardware-flag poll the driver performs.
///
/// Each poll reads a status register once per iteration, so the wall-clock
/// bound scales with bus speed. All limits must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpinLimits {
    /// PLLI2S lock after enabling the PLL.
    pub pll_lock: u32,
    /// A DMA stream clearing its enable bit after being disabled.
    pub stream_release: u32,
    /// Both DMA streams reporting enabled after arming.
    pub stream_enable: u32,
    /// Word-select going high before the receive block is enabled.
    pub word_select: u32,
    /// DMA and audio-bus clocks reporting gated during `disable`.
    pub clock_gate: u32,
    /// Each control-bus phase (start, address, byte, stop, reset).
    pub control_bus: u32,
}

impl SpinLimits {
    /// Default control-bus bound.
    pub const CONTROL_BUS_DEFAULT: u32 = 1_000_000;
}

impl Default for SpinLimits {
    fn default() -> Self {
        Self {
            pll_lock: 100_000,
            stream_release: 10_000,
            stream_enable: 10_000,
            word_select: 100_000,
            clock_gate: 1_000,
            control_bus: Self::CONTROL_BUS_DEFAULT,
        }
    }
}

/// Top-level driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    /// Poll bounds.
    pub spin: SpinLimits,
    /// Combined DMA transfer/direct-mode error count at which
    /// [`AudioDriver::needs_escalation`](crate::AudioDriver::needs_escalation)
    /// starts returning `true`. `None` disables escalation.
    pub escalation_threshold: Option<u32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            spin: SpinLimits::default(),
            escalation_threshold: Some(64),
        }
    }
}
