//! Simulated peripherals for the unit tests.
//!
//! Every simulated peripheral is a cheap clonable handle over shared state:
//! one clone goes into the driver, the test keeps another to inject events
//! and inspect what the driver did.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::clock::{Prescaler, SampleRate};
use crate::hal::{
    AudioBus, AudioPll, BoardPins, BusFlags, BusFormat, ControlBusPeripheral, DmaController, DmaStream, Peripherals,
    Platform, StreamEvents,
};
use crate::io::StreamConfig;

// ── PLL ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PllState {
    pub enabled: bool,
    pub multiplier: u16,
    pub divider: u8,
    /// Lock polls that report unlocked after each enable.
    pub lock_delay: u32,
    polls: u32,
}

#[derive(Clone)]
pub struct SimPll(Rc<RefCell<PllState>>);

impl SimPll {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(PllState {
            lock_delay: 2,
            ..PllState::default()
        })))
    }

    pub fn state(&self) -> PllState {
        *self.0.borrow()
    }

    pub fn set_lock_delay(&self, polls: u32) {
        self.0.borrow_mut().lock_delay = polls;
    }
}

impl AudioPll for SimPll {
    fn disable(&mut self) {
        self.0.borrow_mut().enabled = false;
    }

    fn configure(&mut self, multiplier: u16, divider: u8) {
        let mut s = self.0.borrow_mut();
        assert!(!s.enabled, "PLL reprogrammed while running");
        s.multiplier = multiplier;
        s.divider = divider;
    }

    fn enable(&mut self) {
        let mut s = self.0.borrow_mut();
        s.enabled = true;
        s.polls = 0;
    }

    fn is_locked(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        if !s.enabled {
            return false;
        }
        if s.polls < s.lock_delay {
            s.polls += 1;
            return false;
        }
        true
    }
}

// ── Audio bus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct BusState {
    pub powered: bool,
    pub prescaler: Option<Prescaler>,
    pub format: Option<BusFormat>,
    pub error_interrupts: bool,
    pub tx_enabled: bool,
    pub rx_enabled: bool,
    pub line_enabled: bool,
    /// Frame-error bit latched in the extended block status.
    pub frame_error: bool,
    pub word_select_stuck: bool,
    ws_polls: u32,
}

#[derive(Clone)]
pub struct SimBus(Rc<RefCell<BusState>>);

impl SimBus {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(BusState::default())))
    }

    pub fn state(&self) -> BusState {
        *self.0.borrow()
    }

    pub fn inject_frame_error(&self) {
        self.0.borrow_mut().frame_error = true;
    }

    pub fn stick_word_select(&self, stuck: bool) {
        self.0.borrow_mut().word_select_stuck = stuck;
    }
}

impl AudioBus for SimBus {
    fn power_up(&mut self) {
        let mut s = self.0.borrow_mut();
        s.powered = true;
        s.tx_enabled = false;
        s.rx_enabled = false;
    }

    fn power_down(&mut self) {
        self.0.borrow_mut().powered = false;
    }

    fn is_powered(&mut self) -> bool {
        self.0.borrow().powered
    }

    fn set_prescaler(&mut self, prescaler: Prescaler) {
        self.0.borrow_mut().prescaler = Some(prescaler);
    }

    fn configure(&mut self, format: BusFormat) {
        self.0.borrow_mut().format = Some(format);
    }

    fn set_error_interrupts(&mut self, enabled: bool) {
        self.0.borrow_mut().error_interrupts = enabled;
    }

    fn enable_transmitter(&mut self) {
        let mut s = self.0.borrow_mut();
        s.tx_enabled = true;
        s.ws_polls = 0;
    }

    fn enable_receiver(&mut self) {
        self.0.borrow_mut().rx_enabled = true;
    }

    fn disable(&mut self) {
        let mut s = self.0.borrow_mut();
        s.tx_enabled = false;
        s.rx_enabled = false;
    }

    fn word_select_high(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        if !s.tx_enabled || s.word_select_stuck {
            return false;
        }
        // First poll lands in the left-channel (low) half of the frame.
        s.ws_polls += 1;
        s.ws_polls > 1
    }

    fn frame_error(&mut self) -> bool {
        // Reading the status register clears the flag.
        core::mem::take(&mut self.0.borrow_mut().frame_error)
    }

    fn set_interrupt_line(&mut self, enabled: bool) {
        self.0.borrow_mut().line_enabled = enabled;
    }

    fn clear_pending_interrupt(&mut self) {}
}

// ── DMA ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct DmaState {
    powered: bool,
    power_ups: u32,
}

#[derive(Clone)]
pub struct SimDma(Rc<RefCell<DmaState>>);

impl SimDma {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(DmaState::default())))
    }

    pub fn power_ups(&self) -> u32 {
        self.0.borrow().power_ups
    }

    pub fn is_powered_now(&self) -> bool {
        self.0.borrow().powered
    }
}

impl DmaController for SimDma {
    fn power_up(&mut self) {
        let mut s = self.0.borrow_mut();
        s.powered = true;
        s.power_ups += 1;
    }

    fn power_down(&mut self) {
        self.0.borrow_mut().powered = false;
    }

    fn is_powered(&mut self) -> bool {
        self.0.borrow().powered
    }
}

#[derive(Debug, Default)]
struct StreamState {
    enabled: bool,
    config: Option<StreamConfig>,
    remaining: u16,
    pending: StreamEvents,
    release_delay: u32,
    release_polls: u32,
    disable_requested: bool,
    line_enabled: bool,
    enables: u32,
}

/// One DMA stream with a simulated transfer counter.
#[derive(Clone)]
pub struct SimStream(Rc<RefCell<StreamState>>);

impl SimStream {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(StreamState::default())))
    }

    /// Polls of the enable bit that still read set after a disable request.
    pub fn set_release_delay(&self, polls: u32) {
        self.0.borrow_mut().release_delay = polls;
    }

    /// Pretend a previous owner left the stream running.
    pub fn force_enabled(&self) {
        self.0.borrow_mut().enabled = true;
    }

    pub fn is_armed(&self) -> bool {
        self.0.borrow().enabled
    }

    pub fn config(&self) -> Option<StreamConfig> {
        self.0.borrow().config
    }

    pub fn pending(&self) -> StreamEvents {
        self.0.borrow().pending
    }

    /// Times the stream was armed.
    pub fn enables(&self) -> u32 {
        self.0.borrow().enables
    }

    pub fn inject(&self, events: StreamEvents) {
        self.0.borrow_mut().pending |= events;
    }

    fn items(s: &StreamState) -> u16 {
        s.config.map_or(0, |c| c.items)
    }

    /// DMA reached the middle of the buffer.
    pub fn fire_half(&self) {
        let mut s = self.0.borrow_mut();
        s.remaining = Self::items(&s) / 2;
        s.pending |= StreamEvents::HALF_TRANSFER;
    }

    /// DMA reached the end of the buffer and reloaded the counter.
    pub fn fire_full(&self) {
        let mut s = self.0.borrow_mut();
        s.remaining = Self::items(&s);
        s.pending |= StreamEvents::TRANSFER_COMPLETE;
    }

    /// Move the transfer position forward by `items`, wrapping.
    pub fn advance(&self, items: usize) {
        let mut s = self.0.borrow_mut();
        let total = Self::items(&s) as usize;
        if total == 0 {
            return;
        }
        let position = (total - s.remaining as usize + items) % total;
        s.remaining = (total - position) as u16;
    }
}

impl DmaStream for SimStream {
    fn is_enabled(&mut self) -> bool {
        let mut s = self.0.borrow_mut();
        if s.enabled && s.disable_requested {
            if s.release_polls >= s.release_delay {
                s.enabled = false;
                s.disable_requested = false;
            } else {
                s.release_polls += 1;
            }
        }
        s.enabled
    }

    fn disable(&mut self) {
        let mut s = self.0.borrow_mut();
        if s.enabled && !s.disable_requested {
            s.disable_requested = true;
            s.release_polls = 0;
        }
    }

    fn configure(&mut self, config: &StreamConfig) {
        let mut s = self.0.borrow_mut();
        assert!(!s.enabled, "stream configured while enabled");
        s.config = Some(*config);
        s.remaining = config.items;
    }

    fn enable(&mut self) {
        let mut s = self.0.borrow_mut();
        s.enabled = true;
        s.disable_requested = false;
        s.remaining = Self::items(&s);
        s.enables += 1;
    }

    fn remaining(&mut self) -> u16 {
        self.0.borrow().remaining
    }

    fn events(&mut self) -> StreamEvents {
        self.0.borrow().pending
    }

    fn clear(&mut self, events: StreamEvents) {
        self.0.borrow_mut().pending.remove(events);
    }

    fn set_interrupt_line(&mut self, enabled: bool) {
        self.0.borrow_mut().line_enabled = enabled;
    }

    fn clear_pending_interrupt(&mut self) {}
}

// ── Control bus ────────────────────────────────────────────────────────────

/// How the simulated codec decodes the first data byte of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Index in bits 7:1, value bit 8 in bit 0; reads return 9 bits.
    NineBit,
    /// Map byte is the index; 8-bit values.
    EightBit,
}

/// One completed write transaction as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Address byte, including the R/W bit.
    pub address: u8,
    pub bytes: Vec<u8>,
}

struct I2cState {
    framing: Framing,
    regs: [u16; 128],
    pointer: u8,
    powered: bool,
    stalled: bool,
    present: bool,
    reset: bool,
    ack: bool,
    busy: bool,
    master: bool,
    start_sent: bool,
    expecting_address: bool,
    address_sent: bool,
    transmitting: bool,
    reading: bool,
    current_address: u8,
    tx: Vec<u8>,
    rx: VecDeque<u8>,
    frames: Vec<Frame>,
    stops: usize,
    last_read_address: Option<u8>,
}

impl I2cState {
    fn commit_write(&mut self) {
        if !self.transmitting || self.tx.is_empty() {
            return;
        }
        let (index, value) = match self.framing {
            Framing::NineBit => (self.tx[0] >> 1, self.tx.get(1).map(|&lo| (u16::from(self.tx[0] & 1) << 8) | u16::from(lo))),
            Framing::EightBit => (self.tx[0] & 0x7F, self.tx.get(1).map(|&lo| u16::from(lo))),
        };
        self.pointer = index;
        if let Some(value) = value {
            self.regs[index as usize] = value;
        }
        self.frames.push(Frame {
            address: self.current_address,
            bytes: core::mem::take(&mut self.tx),
        });
        self.transmitting = false;
    }

    fn load_response(&mut self) {
        let value = self.regs[self.pointer as usize];
        self.rx.clear();
        match self.framing {
            Framing::NineBit => self.rx.extend(value.to_be_bytes()),
            Framing::EightBit => self.rx.extend([0, value as u8]),
        }
    }
}

/// Register-file codec behind a byte-level I2C master.
#[derive(Clone)]
pub struct SimControlBus(Rc<RefCell<I2cState>>);

impl SimControlBus {
    pub fn new(framing: Framing) -> Self {
        Self(Rc::new(RefCell::new(I2cState {
            framing,
            regs: [0; 128],
            pointer: 0,
            powered: false,
            stalled: false,
            present: true,
            reset: false,
            ack: false,
            busy: false,
            master: false,
            start_sent: false,
            expecting_address: false,
            address_sent: false,
            transmitting: false,
            reading: false,
            current_address: 0,
            tx: Vec::new(),
            rx: VecDeque::new(),
            frames: Vec::new(),
            stops: 0,
            last_read_address: None,
        })))
    }

    /// Hold the lines busy: nothing the master requests ever completes.
    pub fn stall(&self, stalled: bool) {
        self.0.borrow_mut().stalled = stalled;
    }

    /// Whether a device acknowledges its address.
    pub fn set_present(&self, present: bool) {
        self.0.borrow_mut().present = present;
    }

    pub fn register(&self, index: u8) -> u16 {
        self.0.borrow().regs[index as usize]
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.0.borrow().frames.clone()
    }

    pub fn stops(&self) -> usize {
        self.0.borrow().stops
    }

    pub fn last_read_address(&self) -> Option<u8> {
        self.0.borrow().last_read_address
    }

    pub fn ack_enabled(&self) -> bool {
        self.0.borrow().ack
    }

    pub fn is_busy(&self) -> bool {
        self.0.borrow().busy
    }

    pub fn in_reset(&self) -> bool {
        self.0.borrow().reset
    }

    pub fn is_powered(&self) -> bool {
        self.0.borrow().powered
    }
}

impl ControlBusPeripheral for SimControlBus {
    fn power_up(&mut self) {
        self.0.borrow_mut().powered = true;
    }

    fn power_down(&mut self) {
        self.0.borrow_mut().powered = false;
    }

    fn flags(&mut self) -> BusFlags {
        let s = self.0.borrow();
        if s.stalled {
            return BusFlags::BUSY;
        }
        let mut flags = BusFlags::empty();
        flags.set(BusFlags::BUSY, s.busy);
        flags.set(BusFlags::MASTER, s.master);
        flags.set(BusFlags::START_SENT, s.start_sent);
        flags.set(BusFlags::ADDRESS_SENT, s.address_sent);
        flags.set(BusFlags::TX_EMPTY | BusFlags::BYTE_FINISHED, s.transmitting);
        flags.set(BusFlags::RX_NOT_EMPTY, s.reading && !s.rx.is_empty());
        flags
    }

    fn generate_start(&mut self) {
        let mut s = self.0.borrow_mut();
        if s.stalled || s.reset {
            return;
        }
        s.commit_write();
        s.busy = true;
        s.master = true;
        s.start_sent = true;
        s.expecting_address = true;
        s.address_sent = false;
        s.reading = false;
    }

    fn generate_stop(&mut self) {
        let mut s = self.0.borrow_mut();
        if s.stalled {
            return;
        }
        s.commit_write();
        s.busy = false;
        s.master = false;
        s.start_sent = false;
        s.expecting_address = false;
        s.address_sent = false;
        s.transmitting = false;
        s.reading = false;
        s.rx.clear();
        s.stops += 1;
    }

    fn set_ack(&mut self, enabled: bool) {
        self.0.borrow_mut().ack = enabled;
    }

    fn set_software_reset(&mut self, asserted: bool) {
        let mut s = self.0.borrow_mut();
        s.reset = asserted;
        if asserted {
            s.busy = false;
            s.master = false;
            s.start_sent = false;
            s.expecting_address = false;
            s.address_sent = false;
            s.transmitting = false;
            s.reading = false;
            s.tx.clear();
            s.rx.clear();
        }
    }

    fn write_data(&mut self, byte: u8) {
        let mut s = self.0.borrow_mut();
        if s.stalled {
            return;
        }
        if s.expecting_address {
            s.expecting_address = false;
            s.start_sent = false;
            if !s.present {
                return;
            }
            s.address_sent = true;
            s.current_address = byte;
            if byte & 1 == 1 {
                s.reading = true;
                s.last_read_address = Some(byte);
                s.load_response();
            } else {
                s.transmitting = true;
                s.tx.clear();
            }
        } else if s.transmitting {
            s.tx.push(byte);
        }
    }

    fn read_data(&mut self) -> u8 {
        self.0.borrow_mut().rx.pop_front().unwrap_or(0)
    }
}

// ── Pins ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PinState {
    pub configured: Option<SampleRate>,
    pub configure_calls: u32,
    pub released: bool,
    pub error_indicator: bool,
}

#[derive(Clone)]
pub struct SimPins(Rc<RefCell<PinState>>);

impl SimPins {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(PinState::default())))
    }

    pub fn state(&self) -> PinState {
        *self.0.borrow()
    }
}

impl BoardPins for SimPins {
    fn configure_audio_pins(&mut self, rate: SampleRate) {
        let mut s = self.0.borrow_mut();
        s.configured = Some(rate);
        s.configure_calls += 1;
        s.released = false;
    }

    fn release_audio_pins(&mut self) {
        self.0.borrow_mut().released = true;
    }

    fn set_error_indicator(&mut self, on: bool) {
        self.0.borrow_mut().error_indicator = on;
    }
}

// ── Platform ───────────────────────────────────────────────────────────────

pub struct SimPlatform;

impl Platform for SimPlatform {
    type Pll = SimPll;
    type Bus = SimBus;
    type Dma = SimDma;
    type Stream = SimStream;
    type ControlBus = SimControlBus;
    type Pins = SimPins;
}

/// Test-side handles onto a simulated platform.
pub struct SimHandles {
    pub pll: SimPll,
    pub bus: SimBus,
    pub dma: SimDma,
    pub tx: SimStream,
    pub rx: SimStream,
    pub control: SimControlBus,
    pub pins: SimPins,
}

impl SimHandles {
    /// A fresh platform with a nine-bit-framed codec on the control bus.
    pub fn new() -> (Peripherals<SimPlatform>, SimHandles) {
        let handles = SimHandles {
            pll: SimPll::new(),
            bus: SimBus::new(),
            dma: SimDma::new(),
            tx: SimStream::new(),
            rx: SimStream::new(),
            control: SimControlBus::new(Framing::NineBit),
            pins: SimPins::new(),
        };
        let peripherals = Peripherals {
            pll: handles.pll.clone(),
            bus: handles.bus.clone(),
            dma: handles.dma.clone(),
            tx: handles.tx.clone(),
            rx: handles.rx.clone(),
            control: handles.control.clone(),
            pins: handles.pins.clone(),
        };
        (peripherals, handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DMA_BUFFER_SAMPLES;

    #[test]
    fn stream_counter_wraps() {
        let stream = SimStream::new();
        let mut s = stream.clone();
        s.configure(&StreamConfig::receive(0));
        s.enable();
        assert_eq!(s.remaining(), DMA_BUFFER_SAMPLES as u16);

        stream.advance(10);
        assert_eq!(s.remaining(), DMA_BUFFER_SAMPLES as u16 - 10);
        stream.advance(DMA_BUFFER_SAMPLES);
        assert_eq!(s.remaining(), DMA_BUFFER_SAMPLES as u16 - 10);
    }

    #[test]
    fn nine_bit_codec_decodes_writes() {
        let sim = SimControlBus::new(Framing::NineBit);
        let mut bus = sim.clone();
        bus.generate_start();
        bus.write_data(0x34);
        bus.write_data(0x05);
        bus.write_data(0x7F);
        bus.generate_stop();
        assert_eq!(sim.register(0x02), 0x17F);
        assert_eq!(sim.stops(), 1);
    }
}
