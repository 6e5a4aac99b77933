//! Audio clock configuration.
//!
//! The audio bus runs as master from PLLI2S. For each supported rate the PLL
//! multiplier/divider and the bus prescaler are chosen so that the frame
//! clock lands as close to nominal as the dividers allow with 16-bit stereo
//! framing and the master clock output (256 × Fs) enabled:
//!
//! ```text
//! Fs = (PLL_INPUT_HZ × N / R) / (256 × (2 × I2SDIV + ODD))
//! ```

use core::fmt;

use crate::constants::PLL_INPUT_HZ;
use crate::error::Error;
use crate::hal::{AudioBus, AudioPll};
use crate::poll::spin_until;

/// Supported sample rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    /// 16 kHz.
    Hz16000,
    /// 32 kHz.
    Hz32000,
    /// 44.1 kHz.
    Hz44100,
}

impl SampleRate {
    /// Every supported rate, ascending.
    pub const ALL: [SampleRate; 3] = [SampleRate::Hz16000, SampleRate::Hz32000, SampleRate::Hz44100];

    /// Nominal rate in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            SampleRate::Hz16000 => 16_000,
            SampleRate::Hz32000 => 32_000,
            SampleRate::Hz44100 => 44_100,
        }
    }

    /// PLL and prescaler settings for this rate.
    pub const fn clock_settings(self) -> ClockSettings {
        match self {
            SampleRate::Hz44100 => ClockSettings {
                pll_multiplier: 271,
                pll_divider: 2,
                prescaler: Prescaler { divider: 6, odd: false, master_clock_output: true },
            },
            SampleRate::Hz16000 => ClockSettings {
                pll_multiplier: 213,
                pll_divider: 2,
                prescaler: Prescaler { divider: 13, odd: false, master_clock_output: true },
            },
            SampleRate::Hz32000 => ClockSettings {
                pll_multiplier: 213,
                pll_divider: 2,
                prescaler: Prescaler { divider: 6, odd: true, master_clock_output: true },
            },
        }
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = Error;

    fn try_from(hz: u32) -> Result<Self, Self::Error> {
        match hz {
            16_000 => Ok(SampleRate::Hz16000),
            32_000 => Ok(SampleRate::Hz32000),
            44_100 => Ok(SampleRate::Hz44100),
            other => Err(Error::UnsupportedRate(other)),
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// Audio-bus prescaler register contents (`I2SPR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Prescaler {
    /// Linear divider, `I2SDIV`. Values 0 and 1 are forbidden by hardware.
    pub divider: u8,
    /// Odd factor: total division is `2 × divider + odd`.
    pub odd: bool,
    /// Drive the master clock output.
    pub master_clock_output: bool,
}

impl Prescaler {
    /// Raw register value.
    pub const fn bits(self) -> u16 {
        (self.divider as u16) | ((self.odd as u16) << 8) | ((self.master_clock_output as u16) << 9)
    }

    /// Total division applied to the kernel clock before the 256× framing.
    pub const fn division(self) -> u32 {
        2 * self.divider as u32 + self.odd as u32
    }
}

/// Complete clock plan for one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockSettings {
    /// VCO multiplier, `PLLI2SN`.
    pub pll_multiplier: u16,
    /// VCO output divider, `PLLI2SR`.
    pub pll_divider: u8,
    /// Bus prescaler.
    pub prescaler: Prescaler,
}

impl ClockSettings {
    /// Kernel clock fed to the audio bus, in Hz.
    pub const fn kernel_clock_hz(&self) -> u32 {
        PLL_INPUT_HZ / self.pll_divider as u32 * self.pll_multiplier as u32
    }

    /// Frame rate these settings actually produce.
    pub fn achieved_rate_hz(&self) -> f32 {
        self.kernel_clock_hz() as f32 / (256 * self.prescaler.division()) as f32
    }

    /// Deviation of [`achieved_rate_hz`](Self::achieved_rate_hz) from
    /// `nominal`, in parts per million.
    pub fn deviation_ppm(&self, nominal: SampleRate) -> f32 {
        let nominal = nominal.hz() as f32;
        libm::fabsf(self.achieved_rate_hz() - nominal) / nominal * 1_000_000.0
    }
}

/// Program PLLI2S and the bus prescaler for `rate`, then wait for lock.
///
/// Takes an already-validated [`SampleRate`], so the only failure is a PLL
/// that never locks within `spin_limit` polls.
pub fn configure_clocks<P, B>(pll: &mut P, bus: &mut B, rate: SampleRate, spin_limit: u32) -> Result<(), Error>
where
    P: AudioPll,
    B: AudioBus,
{
    let settings = rate.clock_settings();

    pll.disable();
    pll.configure(settings.pll_multiplier, settings.pll_divider);
    bus.set_prescaler(settings.prescaler);
    pll.enable();

    spin_until(spin_limit, || pll.is_locked()).map_err(|_| Error::PllLockTimeout)?;

    debug!("PLLI2S locked for {} Hz", rate.hz());
    Ok(())
}
