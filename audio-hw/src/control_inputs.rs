//! Control-input (potentiometer / sensor ADC) interface.
//!
//! Independent of the audio path: converters sample control voltages and
//! report completion through their own DMA interrupts, which set bits in
//! [`ReadyFlags`]. The foreground polls [`ControlInputs::ready`] and
//! restarts conversions in one-shot mode.

use core::sync::atomic::{AtomicU8, Ordering};

/// Conversion scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcMode {
    /// Converters free-run and DMA rewrites the results continuously.
    Continuous,
    /// Each [`ControlInputs::start_conversion`] runs one scan.
    OneShot,
}

/// Ready bit of converter 1.
pub const ADC1_READY: u8 = 1 << 0;
/// Ready bit of converter 3.
pub const ADC3_READY: u8 = 1 << 1;

/// Per-converter completion mask, set from interrupt context.
pub struct ReadyFlags {
    bits: AtomicU8,
    expected: u8,
}

impl ReadyFlags {
    /// Flags for the converters in `expected`.
    pub const fn new(expected: u8) -> Self {
        Self {
            bits: AtomicU8::new(0),
            expected,
        }
    }

    /// Both converters used by the board.
    pub const fn adc1_adc3() -> Self {
        Self::new(ADC1_READY | ADC3_READY)
    }

    /// Mark converters in `mask` as done. Interrupt-safe.
    pub fn set(&self, mask: u8) {
        self.bits.fetch_or(mask & self.expected, Ordering::AcqRel);
    }

    /// `true` once every expected converter has reported.
    pub fn all_ready(&self) -> bool {
        self.bits.load(Ordering::Acquire) & self.expected == self.expected
    }

    /// Forget all completions.
    pub fn clear(&self) {
        self.bits.store(0, Ordering::Release);
    }

    /// Raw mask.
    pub fn bits(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }
}

/// Board ADC subsystem.
pub trait ControlInputs {
    /// Program the converters, their DMA streams and pins for `mode`.
    fn configure(&mut self, mode: AdcMode);
    /// Start one scan on every converter.
    fn start_conversion(&mut self);
    /// `true` when every converter has finished its scan.
    fn ready(&self) -> bool;
    /// Clear the ready state before the next scan.
    fn clear_ready(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockAdc<'a> {
        flags: &'a ReadyFlags,
        mode: Option<AdcMode>,
        started: u32,
    }

    impl ControlInputs for MockAdc<'_> {
        fn configure(&mut self, mode: AdcMode) {
            self.mode = Some(mode);
        }

        fn start_conversion(&mut self) {
            self.started += 1;
        }

        fn ready(&self) -> bool {
            self.flags.all_ready()
        }

        fn clear_ready(&mut self) {
            self.flags.clear();
        }
    }

    #[test]
    fn ready_needs_every_converter() {
        let flags = ReadyFlags::adc1_adc3();
        assert!(!flags.all_ready());

        flags.set(ADC1_READY);
        assert!(!flags.all_ready());

        flags.set(ADC3_READY);
        assert!(flags.all_ready());
        assert_eq!(flags.bits(), 0b11);
    }

    #[test]
    fn unexpected_bits_are_ignored() {
        let flags = ReadyFlags::new(ADC1_READY);
        flags.set(1 << 5);
        assert_eq!(flags.bits(), 0);
        flags.set(ADC1_READY);
        assert!(flags.all_ready());
    }

    #[test]
    fn one_shot_cycle() {
        let flags = ReadyFlags::adc1_adc3();
        let mut adc = MockAdc { flags: &flags, mode: None, started: 0 };
        adc.configure(AdcMode::OneShot);
        adc.start_conversion();

        // DMA interrupts of both converters.
        flags.set(ADC1_READY);
        flags.set(ADC3_READY);
        assert!(adc.ready());

        adc.clear_ready();
        assert!(!adc.ready());
        assert_eq!(adc.mode, Some(AdcMode::OneShot));
        assert_eq!(adc.started, 1);
    }
}
