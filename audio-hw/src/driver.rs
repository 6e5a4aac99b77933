//! The full-duplex audio driver.
//!
//! [`AudioDriver`] owns every peripheral of the audio path and exposes three
//! interrupt entry points plus the lifecycle calls:
//!
//! ```text
//!   setup(rate) ──► Configured ──start()──► Running
//!        ▲                                    │
//!        └───────────── disable() ◄───────────┘
//!
//!   DMA1_STREAM0 ──► on_rx_interrupt()        block dispatch, recovery, underrun check
//!   DMA1_STREAM7 ──► on_tx_interrupt()        error accounting
//!   SPI3         ──► on_bus_error_interrupt() frame-error latch
//! ```
//!
//! The application keeps the driver in whatever its interrupt layer uses for
//! shared resources (an RTIC resource, a `critical_section::Mutex`) and
//! forwards the three vectors. The [`FaultMonitor`] is borrowed rather than
//! owned so foreground code can watch it without taking that lock.
//!
//! ## Usage
//!
//! ```ignore
//! static mut BUFFERS: DmaBuffers = DmaBuffers::new();
//! static MONITOR: FaultMonitor = FaultMonitor::new();
//!
//! let mut driver = AudioDriver::new(
//!     peripherals,
//!     Wm8731::new(),
//!     |io: &mut AudioIo<'_>| io.pass_through(),
//!     unsafe { &mut *core::ptr::addr_of_mut!(BUFFERS) },
//!     &MONITOR,
//!     DriverConfig::default(),
//! );
//! driver.setup(44_100)?;
//! driver.start()?;
//! ```
//!
//! Recovery from a frame error runs synchronously inside the receive
//! interrupt. Every wait on that path is bounded by [`SpinLimits`], so the
//! worst-case latency is the sum of those limits.
//!
//! [`SpinLimits`]: crate::config::SpinLimits

use crate::clock::{self, SampleRate};
use crate::config::DriverConfig;
use crate::constants::{AUDIO_BLOCK_FRAMES, BLOCK_SAMPLES, CODEC_CHANNELS, DMA_COUNT_MASK};
use crate::control::CodecOps;
use crate::control_bus::ControlBus;
use crate::hal::{AudioBus, BoardPins, BusFormat, DmaController, DmaStream, Peripherals, Platform, StreamEvents};
use crate::io::stream::{self, StreamConfig};
use crate::io::{DmaBuffers, DoubleBuffer, Half};
use crate::poll::spin_until;
use crate::process::{AudioCallback, AudioIo};
use crate::recovery::{FaultMonitor, RecoveryState, RunState};
use crate::Error;

/// Full-duplex audio driver over platform `P`, codec `C` and callback `F`.
pub struct AudioDriver<'b, P, C, F>
where
    P: Platform,
{
    pll: P::Pll,
    bus: P::Bus,
    dma: P::Dma,
    tx: P::Stream,
    rx: P::Stream,
    control: ControlBus<P::ControlBus>,
    pins: P::Pins,
    codec: C,
    callback: F,
    buffers: DoubleBuffer<'b>,
    monitor: &'b FaultMonitor,
    config: DriverConfig,
    rate: Option<SampleRate>,
    /// Clocks, streams and buses are programmed for `rate`.
    powered: bool,
    /// The escalation warning has been logged.
    escalated: bool,
    /// Combined DMA errors when the current session was set up.
    errors_at_setup: u32,
    /// Half handed to the callback last; the restarted streams begin at
    /// [`Half::First`] again after a recovery.
    last_served: Option<Half>,
}

impl<'b, P, C, F> AudioDriver<'b, P, C, F>
where
    P: Platform,
    C: CodecOps,
    F: AudioCallback,
{
    /// Take ownership of the peripherals. Touches no hardware.
    pub fn new(
        peripherals: Peripherals<P>,
        codec: C,
        callback: F,
        buffers: &'b mut DmaBuffers,
        monitor: &'b FaultMonitor,
        config: DriverConfig,
    ) -> Self {
        let Peripherals {
            pll,
            bus,
            dma,
            tx,
            rx,
            control,
            pins,
        } = peripherals;

        Self {
            pll,
            bus,
            dma,
            tx,
            rx,
            control: ControlBus::new(control, config.spin.control_bus),
            pins,
            codec,
            callback,
            buffers: DoubleBuffer::new(buffers),
            monitor,
            config,
            rate: None,
            powered: false,
            escalated: false,
            errors_at_setup: 0,
            last_served: None,
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Program clocks, streams and buses for `rate_hz`.
    ///
    /// An unsupported rate is rejected before any hardware access and leaves
    /// the run state unchanged. Safe to call again after [`disable`](Self::disable)
    /// or after a failure; not allowed while running.
    pub fn setup(&mut self, rate_hz: u32) -> Result<(), Error> {
        let rate = SampleRate::try_from(rate_hz)?;
        let state = self.monitor.run_state();
        if state == RunState::Running {
            return Err(Error::InvalidState(state));
        }

        self.monitor.take_frame_error();
        self.monitor.set_recovery_state(RecoveryState::Normal);
        self.escalated = false;
        self.errors_at_setup = self.monitor.dma_errors();

        // Buffers are only touched once neither stream can write them.
        let result = match self.release_streams() {
            Ok(()) => {
                self.buffers.reset();
                self.configure_hardware(rate)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("audio setup failed: {}", e);
            self.fault();
            return Err(e);
        }
        self.monitor.set_run_state(RunState::Configured);
        info!("audio path configured for {} Hz", rate.hz());
        Ok(())
    }

    /// Configure the codec, arm both streams and start the bus clocks.
    ///
    /// After [`disable`](Self::disable) the hardware is reprogrammed for the
    /// stored rate first.
    pub fn start(&mut self) -> Result<(), Error> {
        let state = self.monitor.run_state();
        let rate = match (state, self.rate) {
            (RunState::Configured, Some(rate)) => rate,
            _ => return Err(Error::InvalidState(state)),
        };

        self.last_served = None;
        let result = if self.powered {
            self.arm(rate)
        } else {
            self.configure_hardware(rate).and_then(|()| self.arm(rate))
        };
        if let Err(e) = result {
            error!("audio start failed: {}", e);
            self.fault();
            return Err(e);
        }

        self.monitor.set_run_state(RunState::Running);
        info!("audio streaming at {} Hz", rate.hz());
        Ok(())
    }

    /// Stop streaming and gate the audio clocks.
    ///
    /// Idempotent; valid in every state. The stored rate is kept so a later
    /// [`start`](Self::start) resumes at it.
    pub fn disable(&mut self) -> Result<(), Error> {
        self.shutdown()?;
        let next = if self.rate.is_some() {
            RunState::Configured
        } else {
            RunState::Uninitialized
        };
        self.monitor.set_run_state(next);
        info!("audio path disabled");
        Ok(())
    }

    // ── Interrupt entry points ─────────────────────────────────────────

    /// Receive-stream interrupt: hand the ready half to the callback.
    ///
    /// Returns an error only when a frame-error recovery ran and failed; the
    /// callback is skipped for that cycle, both streams are stopped and the
    /// run state is `Faulted`.
    ///
    /// Outside `Running` the pending flags are cleared and nothing else
    /// happens.
    pub fn on_rx_interrupt(&mut self) -> Result<(), Error> {
        self.rx.clear_pending_interrupt();
        let events = self.rx.events();
        if self.monitor.run_state() != RunState::Running {
            self.rx.clear(events);
            return Ok(());
        }
        let before = self.rx.remaining();

        if service_errors(&mut self.rx, events, self.monitor) {
            self.check_escalation();
        }

        let mut served = false;
        if events.contains(StreamEvents::TRANSFER_COMPLETE) {
            self.rx.clear(StreamEvents::TRANSFER_COMPLETE);
            self.buffers.mark_ready(Half::Second);
            served = true;
        }
        if events.contains(StreamEvents::HALF_TRANSFER) {
            self.rx.clear(StreamEvents::HALF_TRANSFER);
            self.buffers.mark_ready(Half::First);
            served = true;
        }

        let re_armed = self.monitor.take_frame_error();
        if re_armed {
            self.monitor.set_run_state(RunState::Faulted);
            if let Err(e) = self.recover() {
                error!("frame-error recovery failed: {}", e);
                self.fault();
                self.monitor.set_recovery_state(RecoveryState::Normal);
                return Err(e);
            }
            self.monitor.set_recovery_state(RecoveryState::Normal);
        }

        // A half is never handed over twice in a row. After a recovery on a
        // half-transfer event the ready half is rewound to the second one,
        // which the callback already has.
        if served && self.last_served != Some(self.buffers.ready_half()) {
            self.dispatch();
        }

        // Re-arming reloaded the transfer counter, so `before` is stale.
        if !re_armed {
            let after = self.rx.remaining();
            let moved = before.wrapping_sub(after) & DMA_COUNT_MASK;
            if moved as usize > BLOCK_SAMPLES {
                trace!("buffer underrun, DMA moved {} samples during dispatch", moved);
                self.monitor.record_underrun();
            }
        }
        Ok(())
    }

    /// Transmit-stream interrupt: clear and count stream errors.
    pub fn on_tx_interrupt(&mut self) {
        self.tx.clear_pending_interrupt();
        let events = self.tx.events();
        if service_errors(&mut self.tx, events, self.monitor) {
            self.check_escalation();
        }
    }

    /// Audio-bus error interrupt: latch a frame error for the next receive
    /// interrupt.
    pub fn on_bus_error_interrupt(&mut self) {
        self.bus.set_interrupt_line(false);
        self.bus.clear_pending_interrupt();
        if self.bus.frame_error() {
            debug!("frame error on receive block");
            self.monitor.raise_frame_error();
            self.pins.set_error_indicator(true);
        }
        self.bus.set_interrupt_line(true);
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Rate of the last successful setup.
    pub fn sample_rate(&self) -> Option<SampleRate> {
        self.rate
    }

    /// Frames per callback block.
    pub fn block_frames(&self) -> usize {
        AUDIO_BLOCK_FRAMES
    }

    /// Interleaved channels in the callback's input.
    pub fn input_channels(&self) -> usize {
        CODEC_CHANNELS
    }

    /// Interleaved channels in the callback's output.
    pub fn output_channels(&self) -> usize {
        CODEC_CHANNELS
    }

    pub fn configuration(&self) -> &DriverConfig {
        &self.config
    }

    pub fn run_state(&self) -> RunState {
        self.monitor.run_state()
    }

    pub fn monitor(&self) -> &'b FaultMonitor {
        self.monitor
    }

    pub fn buffers(&self) -> &DoubleBuffer<'b> {
        &self.buffers
    }

    /// `true` once the DMA errors since the last [`setup`](Self::setup)
    /// reached [`DriverConfig::escalation_threshold`]. What to do about it
    /// is up to the caller.
    pub fn needs_escalation(&self) -> bool {
        match self.config.escalation_threshold {
            Some(threshold) => self.monitor.dma_errors().wrapping_sub(self.errors_at_setup) >= threshold,
            None => false,
        }
    }

    /// Run `f` with the codec and the control bus, for register pokes from
    /// the foreground.
    pub fn with_codec<R>(&mut self, f: impl FnOnce(&mut C, &mut ControlBus<P::ControlBus>) -> R) -> R {
        f(&mut self.codec, &mut self.control)
    }

    /// Tear the driver down, returning everything it owned.
    pub fn release(self) -> (Peripherals<P>, C, F) {
        let peripherals = Peripherals {
            pll: self.pll,
            bus: self.bus,
            dma: self.dma,
            tx: self.tx,
            rx: self.rx,
            control: self.control.release(),
            pins: self.pins,
        };
        (peripherals, self.codec, self.callback)
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn configure_hardware(&mut self, rate: SampleRate) -> Result<(), Error> {
        let spin = self.config.spin;

        self.pins.configure_audio_pins(rate);
        self.dma.power_up();
        stream::prepare(
            &mut self.tx,
            &StreamConfig::transmit(self.buffers.tx_address()),
            spin.stream_release,
        )?;
        stream::prepare(
            &mut self.rx,
            &StreamConfig::receive(self.buffers.rx_address()),
            spin.stream_release,
        )?;

        self.bus.power_up();
        clock::configure_clocks(&mut self.pll, &mut self.bus, rate, spin.pll_lock)?;
        self.bus.configure(BusFormat::PHILIPS_16);
        self.bus.set_error_interrupts(true);
        self.control.power_up();

        self.rate = Some(rate);
        self.powered = true;
        Ok(())
    }

    fn arm(&mut self, rate: SampleRate) -> Result<(), Error> {
        let spin = self.config.spin;

        self.codec.configure(&mut self.control, rate)?;

        self.tx.enable();
        self.rx.enable();
        self.tx.set_interrupt_line(true);
        self.rx.set_interrupt_line(true);
        self.bus.set_interrupt_line(true);

        self.bus.enable_transmitter();
        // The receive block must be enabled while word-select is high or it
        // locks onto the wrong channel.
        let bus = &mut self.bus;
        spin_until(spin.word_select, || bus.word_select_high()).map_err(|_| Error::WordSelectTimeout)?;
        self.bus.enable_receiver();

        let (tx, rx) = (&mut self.tx, &mut self.rx);
        spin_until(spin.stream_enable, || tx.is_enabled() && rx.is_enabled()).map_err(|_| Error::DmaTimeout)?;

        self.codec.start(&mut self.control)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        self.rx.set_interrupt_line(false);
        self.rx.clear_pending_interrupt();
        self.tx.set_interrupt_line(false);
        self.tx.clear_pending_interrupt();
        self.bus.set_interrupt_line(false);
        self.bus.clear_pending_interrupt();

        self.bus.disable();
        let released = self.release_streams();

        self.dma.power_down();
        self.bus.power_down();
        self.pins.release_audio_pins();
        self.powered = false;

        let (dma, bus) = (&mut self.dma, &mut self.bus);
        let gated = spin_until(self.config.spin.clock_gate, || !dma.is_powered() && !bus.is_powered())
            .map_err(|_| Error::DmaTimeout);
        released.and(gated)
    }

    /// Disable both streams and wait until the hardware lets go of them.
    fn release_streams(&mut self) -> Result<(), Error> {
        let limit = self.config.spin.stream_release;
        let tx = stream::release(&mut self.tx, limit);
        let rx = stream::release(&mut self.rx, limit);
        tx.and(rx)
    }

    /// Stop everything after a failed bring-up and mark the path faulted.
    fn fault(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("shutdown after fault failed: {}", e);
        }
        self.monitor.set_run_state(RunState::Faulted);
    }

    fn recover(&mut self) -> Result<(), Error> {
        let rate = match self.rate {
            Some(rate) => rate,
            None => return Err(Error::InvalidState(self.monitor.run_state())),
        };
        warn!("frame error, re-initialising audio path at {} Hz", rate.hz());

        self.codec.correct_frame_error(&mut self.control)?;
        self.shutdown()?;
        self.control.power_down();

        self.configure_hardware(rate)?;
        self.monitor.set_run_state(RunState::Configured);
        self.buffers.rewind();
        self.arm(rate)?;
        self.monitor.set_run_state(RunState::Running);

        self.monitor.record_recovery();
        self.pins.set_error_indicator(false);
        Ok(())
    }

    fn dispatch(&mut self) {
        let half = self.buffers.ready_half();
        let (input, output) = self.buffers.ready_slices();
        let mut io = AudioIo {
            input,
            output,
            frames: AUDIO_BLOCK_FRAMES,
            channels_in: CODEC_CHANNELS,
            channels_out: CODEC_CHANNELS,
            half,
        };
        self.callback.process(&mut io);
        self.last_served = Some(half);
        self.monitor.record_block();
    }

    fn check_escalation(&mut self) {
        if !self.escalated && self.needs_escalation() {
            self.escalated = true;
            warn!("{} DMA errors, escalation threshold reached", self.monitor.dma_errors());
        }
    }
}

/// Clear and count error bits of one stream. Returns `true` if any were set.
fn service_errors<S: DmaStream>(stream: &mut S, events: StreamEvents, monitor: &FaultMonitor) -> bool {
    let errors = events & (StreamEvents::TRANSFER_ERROR | StreamEvents::DIRECT_MODE_ERROR | StreamEvents::FIFO_ERROR);
    if errors.is_empty() {
        return false;
    }
    stream.clear(errors);

    if errors.contains(StreamEvents::TRANSFER_ERROR) {
        debug!("DMA transfer error");
        monitor.record_transfer_error();
    }
    if errors.contains(StreamEvents::DIRECT_MODE_ERROR) {
        debug!("DMA direct-mode error");
        monitor.record_direct_mode_error();
    }
    errors.intersects(StreamEvents::TRANSFER_ERROR | StreamEvents::DIRECT_MODE_ERROR)
}
