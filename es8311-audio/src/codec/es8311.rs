//! ES8311 codec handle.
//!
//! The driver is generic over a [`RegisterBus`], an
//! [`embedded_hal::delay::DelayNs`] provider and a [`SerialAudioPort`].
//!
//! # Example
//!
//! ```ignore
//! let mut codec = Es8311::new(I2cBus::new(i2c), delay, sai, CodecConfig::default());
//! codec.bring_up(16_000)?;            // identify, reset, configure
//! codec.set_output_volume(70)?;
//!
//! static SIGNAL: StreamSignal = StreamSignal::new();
//! let mut session = codec.start_streaming(&mut buf_a, &mut buf_b, 256, &SIGNAL)?;
//! session.run(&mut delay)?;           // until SIGNAL.request_stop()
//! codec.stop_streaming(session)?;
//! codec.tear_down()?;
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use super::registers as reg;
use super::sequence::{ConfigStep, Phase, Sequence};
use crate::config::{CodecConfig, SampleRate};
use crate::error::{
    BusError, ClockError, ControlError, IdentificationError, InitError, SequenceError,
    StopError, StreamError, TearDownError,
};
use crate::gain::{MicGainStep, VolumePercent};
use crate::stream::{BufferPair, Session, StreamSignal, StreamSummary};
use crate::transport::{RegisterBus, SerialAudioPort};

/// Depth of the phase-transition trace.
pub const TRACE_DEPTH: usize = 16;

static NEXT_HANDLE: AtomicU32 = AtomicU32::new(0);

/// ES8311 codec handle.
///
/// Owns the register bus, the delay provider and, outside of streaming, the
/// serial-audio port. While a [`Session`] is active the port lives in the
/// session and is handed back by [`Es8311::stop_streaming`].
pub struct Es8311<B, D, S> {
    /// Tags sessions started by this handle.
    id: u32,
    bus: B,
    delay: D,
    serial: Option<S>,
    config: CodecConfig,
    phase: Phase,
    rate: Option<SampleRate>,
    /// Phases entered since the last bring-up request.
    trace: Vec<Phase, TRACE_DEPTH>,
    /// Last value written to or read from each register.
    shadow: [Option<u8>; 256],
    version: Option<u8>,
    /// A register write was attempted since the last reset-assert.
    touched: bool,
}

impl<B, D, S> Es8311<B, D, S>
where
    B: RegisterBus,
    D: DelayNs,
    S: SerialAudioPort,
{
    /// Create a handle in [`Phase::Uninitialized`]. No bus traffic.
    pub fn new(bus: B, delay: D, serial: S, config: CodecConfig) -> Self {
        Self {
            id: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            bus,
            delay,
            serial: Some(serial),
            config,
            phase: Phase::Uninitialized,
            rate: None,
            trace: Vec::new(),
            shadow: [None; 256],
            version: None,
            touched: false,
        }
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Rate configured by the last successful hardware preparation.
    pub fn sample_rate(&self) -> Option<SampleRate> {
        self.rate
    }

    /// Phases visited since the last `bring_up` call, starting with the
    /// phase the request was made from.
    pub fn transitions(&self) -> &[Phase] {
        &self.trace
    }

    /// Last known value of `register`, if it has been written or read.
    pub fn shadow(&self, register: u8) -> Option<u8> {
        self.shadow[usize::from(register)]
    }

    /// Contents of the version register, read during identification.
    pub fn chip_version(&self) -> Option<u8> {
        self.version
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    // ── Raw register access ────────────────────────────────────────────

    /// Write one register and update the shadow.
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.touched = true;
        self.bus.write(register, value)?;
        self.shadow[usize::from(register)] = Some(value);
        Ok(())
    }

    /// Read one register and update the shadow.
    pub fn read_register(&mut self, register: u8) -> Result<u8, BusError> {
        let value = self.bus.read(register)?;
        self.shadow[usize::from(register)] = Some(value);
        Ok(value)
    }

    // ── Bring-up ───────────────────────────────────────────────────────

    /// Identify, reset and configure the codec for `rate_hz`.
    ///
    /// Allowed from [`Phase::Uninitialized`] and [`Phase::TornDown`]. Stops at
    /// the first failure and falls back to [`Phase::Uninitialized`]; a retry
    /// starts over from the beginning.
    pub fn bring_up(&mut self, rate_hz: u32) -> Result<(), InitError> {
        if !self.phase.accepts_bring_up() {
            return Err(InitError::InvalidPhase(self.phase));
        }

        #[cfg(feature = "defmt")]
        defmt::info!("es8311: bring-up at {} Hz", rate_hz);

        self.trace.clear();
        let _ = self.trace.push(self.phase);
        self.shadow = [None; 256];
        self.version = None;

        match self.run_sequence(rate_hz) {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::info!("es8311: configured");
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::error!("es8311: bring-up aborted in {}: {}", self.phase, err);
                self.rate = None;
                self.enter(Phase::Uninitialized);
                Err(err)
            }
        }
    }

    fn run_sequence(&mut self, rate_hz: u32) -> Result<(), InitError> {
        let seq = Sequence::new().prepare_hardware(self, rate_hz)?;
        let seq = seq.identify(self)?;
        let seq = seq.reset(self)?;
        let _ready = seq.configure(self)?;
        Ok(())
    }

    // Step helpers used by the sequence.

    pub(super) fn enter(&mut self, next: Phase) {
        debug_assert!(self.phase.can_transition_to(next));

        #[cfg(feature = "defmt")]
        defmt::debug!("es8311: {} -> {}", self.phase, next);

        self.phase = next;
        if self.trace.is_full() {
            self.trace.remove(0);
        }
        let _ = self.trace.push(next);
    }

    pub(super) fn configure_port(&mut self, rate: SampleRate) -> Result<(), ClockError> {
        match self.serial.as_mut() {
            Some(port) => port.configure(rate),
            None => Err(ClockError::Peripheral),
        }
    }

    pub(super) fn set_sample_rate(&mut self, rate: SampleRate) {
        self.rate = Some(rate);
    }

    pub(super) fn set_chip_version(&mut self, version: u8) {
        self.version = Some(version);
    }

    pub(super) fn settle_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub(super) fn identify_read(&mut self, register: u8) -> Result<u8, IdentificationError> {
        self.read_register(register)
            .map_err(|cause| IdentificationError::Unreadable { register, cause })
    }

    pub(super) fn step_write(
        &mut self,
        step: ConfigStep,
        register: u8,
        value: u8,
    ) -> Result<(), SequenceError> {
        self.write_register(register, value)
            .map_err(|cause| SequenceError { step, register, cause })
    }

    pub(super) fn step_read(&mut self, step: ConfigStep, register: u8) -> Result<u8, SequenceError> {
        self.read_register(register)
            .map_err(|cause| SequenceError { step, register, cause })
    }

    // ── Gain control ───────────────────────────────────────────────────

    fn require_gain_control(&self) -> Result<(), ControlError> {
        if self.phase.accepts_gain_control() {
            Ok(())
        } else {
            Err(ControlError::InvalidPhase(self.phase))
        }
    }

    /// Set the DAC volume in percent (0–100).
    pub fn set_output_volume(&mut self, percent: u8) -> Result<(), ControlError> {
        let level = VolumePercent::try_new(percent)?;
        self.require_gain_control()?;
        self.write_register(reg::DAC_VOLUME, level.register_value())?;
        self.config.output_volume = level;
        Ok(())
    }

    /// Set the ADC volume in percent (0–100).
    pub fn set_input_volume(&mut self, percent: u8) -> Result<(), ControlError> {
        let level = VolumePercent::try_new(percent)?;
        self.require_gain_control()?;
        self.write_register(reg::ADC_VOLUME, level.register_value())?;
        self.config.input_volume = level;
        Ok(())
    }

    /// Set the microphone PGA gain in 3 dB steps (0–10).
    ///
    /// Only the PGAGAIN field of the input-select register changes.
    pub fn set_microphone_gain(&mut self, step: u8) -> Result<(), ControlError> {
        let gain = MicGainStep::try_new(step)?;
        self.require_gain_control()?;
        let current = self.shadow(reg::SYSTEM_14).unwrap_or(reg::LINSEL);
        let value = (current & !reg::PGAGAIN_MASK) | gain.register_value();
        self.write_register(reg::SYSTEM_14, value)?;
        self.config.mic_gain = gain;
        Ok(())
    }

    // ── Streaming ──────────────────────────────────────────────────────

    /// Start a streaming session over two equal-length buffers.
    ///
    /// The serial-audio port moves into the returned [`Session`] until
    /// [`Es8311::stop_streaming`]. `signal` is cleared and armed here.
    pub fn start_streaming<'b>(
        &mut self,
        buffer_a: &'b mut [i16],
        buffer_b: &'b mut [i16],
        cycle_len: usize,
        signal: &'b StreamSignal,
    ) -> Result<Session<'b, S>, StreamError> {
        if self.phase != Phase::Configured {
            return Err(StreamError::InvalidPhase(self.phase));
        }

        let (len_a, len_b) = (buffer_a.len(), buffer_b.len());
        if len_a != len_b || cycle_len == 0 || cycle_len > len_a {
            return Err(StreamError::InvalidBuffers {
                len_a,
                len_b,
                cycle_len,
            });
        }
        let buffers = BufferPair::new(buffer_a, buffer_b).ok_or(StreamError::InvalidBuffers {
            len_a,
            len_b,
            cycle_len,
        })?;

        let port = self
            .serial
            .take()
            .ok_or(StreamError::InvalidPhase(self.phase))?;

        #[cfg(feature = "defmt")]
        defmt::info!("es8311: streaming {} samples per cycle", cycle_len);

        self.enter(Phase::Streaming);
        Ok(Session::new(self.id, port, buffers, cycle_len, signal))
    }

    /// End `session`, halt the transfer channel and take the port back.
    ///
    /// The port is returned to the handle even when stopping the channel
    /// fails. A session started by another handle is handed back untouched
    /// as [`StopError::ForeignSession`].
    pub fn stop_streaming<'b>(
        &mut self,
        session: Session<'b, S>,
    ) -> Result<StreamSummary, StopError<'b, S>> {
        if session.owner() != self.id {
            return Err(StopError::ForeignSession(session));
        }

        let (port, summary, stopped) = session.finish();
        self.serial = Some(port);
        if self.phase == Phase::Streaming {
            self.enter(Phase::Configured);
        }

        #[cfg(feature = "defmt")]
        defmt::info!(
            "es8311: streaming stopped after {} cycles ({} retries)",
            summary.cycles,
            summary.retries
        );

        stopped.map_err(|cause| StopError::Failed(StreamError::Stop(cause)))?;
        Ok(summary)
    }

    // ── Tear-down ──────────────────────────────────────────────────────

    /// Assert reset and release the serial-audio port.
    ///
    /// Idempotent once torn down. Refused while a session holds the port;
    /// use [`Es8311::tear_down_streaming`] instead. Otherwise best-effort:
    /// the port is released and the phase becomes [`Phase::TornDown`] even
    /// when the reset write fails. The reset error is reported first.
    ///
    /// Reset is skipped only when no register has been written since the
    /// last reset, so a bring-up aborted half way still powers down.
    pub fn tear_down(&mut self) -> Result<(), TearDownError> {
        match self.phase {
            Phase::TornDown => return Ok(()),
            Phase::Streaming => return Err(TearDownError::SessionActive),
            _ => {}
        }

        let reset = if self.touched {
            self.write_register(reg::RESET, reg::RESET_ASSERT_ALL)
                .map_err(TearDownError::Reset)
        } else {
            Ok(())
        };
        if reset.is_ok() {
            self.touched = false;
        }
        let released = match self.serial.as_mut() {
            Some(port) => port.release().map_err(TearDownError::Release),
            None => Ok(()),
        };

        self.rate = None;
        self.enter(Phase::TornDown);

        #[cfg(feature = "defmt")]
        match (&reset, &released) {
            (Ok(()), Ok(())) => defmt::info!("es8311: torn down"),
            _ => defmt::warn!("es8311: tear-down incomplete: {} / {}", reset, released),
        }

        reset.and(released)
    }

    /// Stop `session`, then tear down.
    ///
    /// A channel-stop failure is reported as [`TearDownError::Release`] when
    /// tear-down itself succeeded. A foreign session is handed back and
    /// nothing is torn down.
    pub fn tear_down_streaming<'b>(
        &mut self,
        session: Session<'b, S>,
    ) -> Result<(), StopError<'b, S, TearDownError>> {
        let stopped = match self.stop_streaming(session) {
            Err(StopError::ForeignSession(session)) => {
                return Err(StopError::ForeignSession(session));
            }
            other => other,
        };
        self.tear_down().map_err(StopError::Failed)?;
        match stopped {
            Err(StopError::Failed(StreamError::Stop(cause))) => {
                Err(StopError::Failed(TearDownError::Release(cause)))
            }
            _ => Ok(()),
        }
    }

    /// Destroy the handle and return its parts. The port is `None` if a
    /// session still owns it.
    pub fn release(self) -> (B, D, Option<S>) {
        (self.bus, self.delay, self.serial)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClockConfigError, InvalidParameterError, TransferError};
    use crate::transport::SerialAudio;

    // ── Mock register bus with register file ──────────────────────────

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Write(u8, u8),
        Read(u8),
    }

    /// Register file that records every transaction in order.
    struct MockBus {
        regs: [u8; 256],
        log: std::vec::Vec<Op>,
        /// Index of the transaction to fail with `error`.
        fail_at: Option<usize>,
        error: BusError,
    }

    impl MockBus {
        fn new() -> Self {
            let mut regs = [0u8; 256];
            regs[usize::from(reg::CHIP_ID1)] = 0x83;
            regs[usize::from(reg::CHIP_ID2)] = 0x11;
            regs[usize::from(reg::CHIP_VERSION)] = 0x20;
            regs[usize::from(reg::ADC_16)] = 0x24;
            Self {
                regs,
                log: std::vec::Vec::new(),
                fail_at: None,
                error: BusError::NoAcknowledge,
            }
        }

        fn failing_at(index: usize) -> Self {
            Self {
                fail_at: Some(index),
                ..Self::new()
            }
        }

        fn failing_at_with(index: usize, error: BusError) -> Self {
            Self {
                error,
                ..Self::failing_at(index)
            }
        }

        fn record(&mut self, op: Op) -> Result<(), BusError> {
            let index = self.log.len();
            self.log.push(op);
            if self.fail_at == Some(index) {
                Err(self.error)
            } else {
                Ok(())
            }
        }

        fn writes(&self) -> std::vec::Vec<(u8, u8)> {
            self.log
                .iter()
                .filter_map(|op| match *op {
                    Op::Write(r, v) => Some((r, v)),
                    Op::Read(_) => None,
                })
                .collect()
        }
    }

    impl RegisterBus for MockBus {
        fn write(&mut self, register: u8, value: u8) -> Result<(), BusError> {
            self.record(Op::Write(register, value))?;
            self.regs[usize::from(register)] = value;
            Ok(())
        }

        fn read(&mut self, register: u8) -> Result<u8, BusError> {
            self.record(Op::Read(register))?;
            Ok(self.regs[usize::from(register)])
        }
    }

    // ── Mock delay (accumulates) ───────────────────────────────────────

    #[derive(Default)]
    struct MockDelay {
        total_ns: u64,
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    // ── Mock serial-audio port ─────────────────────────────────────────

    #[derive(Default)]
    struct MockPort {
        configured: Option<SampleRate>,
        configure_error: Option<ClockError>,
        stop_error: Option<TransferError>,
        release_error: Option<TransferError>,
        stops: u32,
        releases: u32,
    }

    impl SerialAudioPort for MockPort {
        fn configure(&mut self, rate: SampleRate) -> Result<(), ClockError> {
            if let Some(err) = self.configure_error {
                return Err(err);
            }
            self.configured = Some(rate);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), TransferError> {
            self.stops += 1;
            self.stop_error.map_or(Ok(()), Err)
        }

        fn release(&mut self) -> Result<(), TransferError> {
            self.releases += 1;
            self.release_error.map_or(Ok(()), Err)
        }
    }

    impl SerialAudio for MockPort {
        fn transfer(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), TransferError> {
            rx.copy_from_slice(tx);
            Ok(())
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    type Codec = Es8311<MockBus, MockDelay, MockPort>;

    fn make_codec_with(bus: MockBus, port: MockPort) -> Codec {
        Es8311::new(bus, MockDelay::default(), port, CodecConfig::default())
    }

    fn make_codec() -> Codec {
        make_codec_with(MockBus::new(), MockPort::default())
    }

    fn configured_codec() -> Codec {
        let mut c = make_codec();
        c.bring_up(16_000).unwrap();
        c
    }

    /// Number of bus transactions in a successful bring-up.
    const BRING_UP_OPS: usize = 24;

    // ── Bring-up ───────────────────────────────────────────────────────

    #[test]
    fn bring_up_visits_phases_in_order() {
        for rate in SampleRate::ALL {
            let mut codec = make_codec();
            codec.bring_up(rate.hz()).unwrap();
            assert_eq!(
                codec.transitions(),
                &[
                    Phase::Uninitialized,
                    Phase::HardwareReady,
                    Phase::Identified,
                    Phase::Reset,
                    Phase::Configured,
                ]
            );
            assert_eq!(codec.phase(), Phase::Configured);
            assert_eq!(codec.sample_rate(), Some(rate));
            assert_eq!(codec.chip_version(), Some(0x20));

            let (_, _, port) = codec.release();
            assert_eq!(port.unwrap().configured, Some(rate));
        }
    }

    #[test]
    fn bring_up_issues_exact_transactions() {
        let mut codec = make_codec();
        codec.bring_up(16_000).unwrap();
        let (bus, _, _) = codec.release();

        use Op::{Read, Write};
        assert_eq!(
            bus.log,
            [
                Read(0xFD),
                Read(0xFE),
                Read(0xFF),
                Write(0x00, 0x1F),
                Write(0x00, 0x00),
                Write(0x00, 0x80),
                Write(0x01, 0x9F),
                Write(0x02, 0x18),
                Write(0x03, 0x20),
                Write(0x04, 0x20),
                Read(0x16),
                Write(0x16, 0x20),
                Write(0x05, 0x00),
                Write(0x09, 0x0D),
                Write(0x0A, 0x0D),
                Write(0x0D, 0x01),
                Write(0x0E, 0x02),
                Write(0x12, 0x00),
                Write(0x13, 0x10),
                Write(0x1C, 0x6A),
                Write(0x37, 0x48),
                Write(0x32, 0x7F),
                Write(0x17, 0x7F),
                Write(0x14, 0x15),
            ]
        );
        assert_eq!(bus.log.len(), BRING_UP_OPS);
    }

    #[test]
    fn bring_up_waits_for_power_on_and_reset() {
        let mut codec = make_codec();
        codec.bring_up(8_000).unwrap();
        let (_, delay, _) = codec.release();
        assert_eq!(delay.total_ns, 120_000_000);
    }

    #[test]
    fn bring_up_uses_configured_levels() {
        let config = CodecConfig {
            output_volume: VolumePercent::MAX,
            input_volume: VolumePercent::MIN,
            mic_gain: MicGainStep::try_new(0).unwrap(),
        };
        let mut codec = Es8311::new(MockBus::new(), MockDelay::default(), MockPort::default(), config);
        codec.bring_up(16_000).unwrap();
        assert_eq!(codec.shadow(reg::DAC_VOLUME), Some(0xFF));
        assert_eq!(codec.shadow(reg::ADC_VOLUME), Some(0x00));
        assert_eq!(codec.shadow(reg::SYSTEM_14), Some(reg::LINSEL));
    }

    #[test]
    fn unsupported_rate_touches_nothing() {
        let mut codec = make_codec();
        assert_eq!(
            codec.bring_up(44_100),
            Err(InitError::ClockConfig(ClockConfigError::UnsupportedRate(44_100)))
        );
        assert_eq!(codec.phase(), Phase::Uninitialized);
        assert_eq!(codec.sample_rate(), None);

        let (bus, delay, port) = codec.release();
        assert!(bus.log.is_empty());
        assert_eq!(delay.total_ns, 0);
        assert_eq!(port.unwrap().configured, None);
    }

    #[test]
    fn port_failure_is_a_clock_error_without_bus_traffic() {
        let port = MockPort {
            configure_error: Some(ClockError::ClockTree),
            ..MockPort::default()
        };
        let mut codec = make_codec_with(MockBus::new(), port);
        assert_eq!(
            codec.bring_up(16_000),
            Err(InitError::ClockConfig(ClockConfigError::Port(ClockError::ClockTree)))
        );
        let (bus, _, _) = codec.release();
        assert!(bus.log.is_empty());
    }

    #[test]
    fn id_mismatch_stops_before_any_write() {
        let mut bus = MockBus::new();
        bus.regs[usize::from(reg::CHIP_ID2)] = 0x12;
        let mut codec = make_codec_with(bus, MockPort::default());

        assert_eq!(
            codec.bring_up(16_000),
            Err(InitError::Identification(IdentificationError::Mismatch {
                id1: 0x83,
                id2: 0x12
            }))
        );
        assert_eq!(codec.phase(), Phase::Uninitialized);
        assert_eq!(codec.chip_version(), None);
        assert_eq!(
            codec.transitions(),
            &[Phase::Uninitialized, Phase::HardwareReady, Phase::Uninitialized]
        );

        let (bus, _, _) = codec.release();
        assert_eq!(bus.log, [Op::Read(0xFD), Op::Read(0xFE)]);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn unreadable_id_is_identification_error() {
        let mut codec = make_codec_with(MockBus::failing_at(0), MockPort::default());
        assert_eq!(
            codec.bring_up(16_000),
            Err(InitError::Identification(IdentificationError::Unreadable {
                register: reg::CHIP_ID1,
                cause: BusError::NoAcknowledge,
            }))
        );
        let (bus, _, _) = codec.release();
        assert_eq!(bus.log.len(), 1);
    }

    #[test]
    fn unreadable_version_is_only_diagnostic() {
        // Transaction 2 is the version read.
        let mut codec = make_codec_with(MockBus::failing_at(2), MockPort::default());
        codec.bring_up(16_000).unwrap();
        assert_eq!(codec.phase(), Phase::Configured);
        assert_eq!(codec.chip_version(), None);
        let (bus, _, _) = codec.release();
        assert_eq!(bus.log.len(), BRING_UP_OPS);
    }

    #[test]
    fn bus_timeout_is_reported_unchanged() {
        let mut codec =
            make_codec_with(MockBus::failing_at_with(4, BusError::Timeout), MockPort::default());
        assert_eq!(
            codec.bring_up(16_000),
            Err(InitError::Sequence(SequenceError {
                step: ConfigStep::ResetRelease,
                register: reg::RESET,
                cause: BusError::Timeout,
            }))
        );
    }

    #[test]
    fn configure_failure_aborts_at_first_error() {
        // Transaction 18 is the headphone-drive write.
        let mut codec = make_codec_with(MockBus::failing_at(18), MockPort::default());
        assert_eq!(
            codec.bring_up(16_000),
            Err(InitError::Sequence(SequenceError {
                step: ConfigStep::HeadphoneDrive,
                register: reg::SYSTEM_13,
                cause: BusError::NoAcknowledge,
            }))
        );
        assert_eq!(codec.phase(), Phase::Uninitialized);
        assert_eq!(codec.transitions().last(), Some(&Phase::Uninitialized));

        // The failing index is behind us now, so a retry goes through.
        codec.bring_up(16_000).unwrap();
        assert_eq!(codec.phase(), Phase::Configured);

        let (bus, _, _) = codec.release();
        assert_eq!(bus.log.len(), 19 + BRING_UP_OPS);
        assert_eq!(bus.log[18], Op::Write(0x13, 0x10));
    }

    #[test]
    fn reset_failure_names_the_step() {
        // Transaction 4 is the reset release.
        let mut codec = make_codec_with(MockBus::failing_at(4), MockPort::default());
        let err = codec.bring_up(16_000).unwrap_err();
        assert_eq!(
            err,
            InitError::Sequence(SequenceError {
                step: ConfigStep::ResetRelease,
                register: reg::RESET,
                cause: BusError::NoAcknowledge,
            })
        );
    }

    #[test]
    fn bring_up_is_refused_once_configured() {
        let mut codec = configured_codec();
        assert_eq!(
            codec.bring_up(16_000),
            Err(InitError::InvalidPhase(Phase::Configured))
        );
        let (bus, _, _) = codec.release();
        assert_eq!(bus.log.len(), BRING_UP_OPS);
    }

    // ── Gain control ───────────────────────────────────────────────────

    #[test]
    fn gain_setters_write_single_registers() {
        let mut codec = configured_codec();
        codec.set_output_volume(100).unwrap();
        codec.set_input_volume(0).unwrap();
        codec.set_microphone_gain(10).unwrap();
        assert_eq!(codec.config().output_volume.get(), 100);
        assert_eq!(codec.config().mic_gain.db(), 30);

        let (bus, _, _) = codec.release();
        let writes = bus.writes();
        assert_eq!(
            &writes[writes.len() - 3..],
            &[(0x32, 0xFF), (0x17, 0x00), (0x14, 0x1A)]
        );
    }

    #[test]
    fn out_of_range_gain_never_touches_the_bus() {
        let mut codec = configured_codec();
        assert_eq!(
            codec.set_output_volume(101),
            Err(ControlError::InvalidParameter(
                InvalidParameterError::VolumeOutOfRange(101)
            ))
        );
        assert_eq!(
            codec.set_input_volume(200),
            Err(ControlError::InvalidParameter(
                InvalidParameterError::VolumeOutOfRange(200)
            ))
        );
        assert_eq!(
            codec.set_microphone_gain(11),
            Err(ControlError::InvalidParameter(
                InvalidParameterError::MicGainOutOfRange(11)
            ))
        );
        let (bus, _, _) = codec.release();
        assert_eq!(bus.log.len(), BRING_UP_OPS);
    }

    #[test]
    fn gain_requires_a_configured_codec() {
        let mut codec = make_codec();
        assert_eq!(
            codec.set_output_volume(50),
            Err(ControlError::InvalidPhase(Phase::Uninitialized))
        );
        codec.bring_up(16_000).unwrap();
        codec.tear_down().unwrap();
        assert_eq!(
            codec.set_microphone_gain(3),
            Err(ControlError::InvalidPhase(Phase::TornDown))
        );
    }

    #[test]
    fn gain_bus_error_is_propagated() {
        let mut codec = make_codec_with(MockBus::failing_at(BRING_UP_OPS), MockPort::default());
        codec.bring_up(16_000).unwrap();
        assert_eq!(
            codec.set_output_volume(10),
            Err(ControlError::Bus(BusError::NoAcknowledge))
        );
        // Shadow keeps the last value the device acknowledged.
        assert_eq!(codec.shadow(reg::DAC_VOLUME), Some(0x7F));
        assert_eq!(codec.config().output_volume.get(), 50);
    }

    // ── Tear-down ──────────────────────────────────────────────────────

    #[test]
    fn tear_down_resets_and_releases_once() {
        let mut codec = configured_codec();
        codec.tear_down().unwrap();
        assert_eq!(codec.phase(), Phase::TornDown);
        assert_eq!(codec.sample_rate(), None);
        codec.tear_down().unwrap();

        let (bus, _, port) = codec.release();
        assert_eq!(bus.log.len(), BRING_UP_OPS + 1);
        assert_eq!(bus.log.last(), Some(&Op::Write(0x00, 0x1F)));
        assert_eq!(port.unwrap().releases, 1);
    }

    #[test]
    fn tear_down_before_bring_up_skips_reset() {
        let mut codec = make_codec();
        codec.tear_down().unwrap();
        assert_eq!(codec.phase(), Phase::TornDown);
        let (bus, _, port) = codec.release();
        assert!(bus.log.is_empty());
        assert_eq!(port.unwrap().releases, 1);
    }

    #[test]
    fn aborted_bring_up_is_reset_on_tear_down() {
        // Transaction 18 is the headphone-drive write; analog stages are up.
        let mut codec = make_codec_with(MockBus::failing_at(18), MockPort::default());
        codec.bring_up(16_000).unwrap_err();
        assert_eq!(codec.phase(), Phase::Uninitialized);

        codec.tear_down().unwrap();
        assert_eq!(codec.phase(), Phase::TornDown);
        let (bus, _, port) = codec.release();
        assert_eq!(bus.log.len(), 20);
        assert_eq!(bus.log.last(), Some(&Op::Write(0x00, 0x1F)));
        assert_eq!(port.unwrap().releases, 1);
    }

    #[test]
    fn failed_identification_needs_no_reset() {
        let mut bus = MockBus::new();
        bus.regs[usize::from(reg::CHIP_ID1)] = 0x00;
        let mut codec = make_codec_with(bus, MockPort::default());
        codec.bring_up(16_000).unwrap_err();
        codec.tear_down().unwrap();
        let (bus, _, _) = codec.release();
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn tear_down_is_best_effort() {
        let port = MockPort {
            release_error: Some(TransferError::Dma),
            ..MockPort::default()
        };
        let mut codec = make_codec_with(MockBus::failing_at(BRING_UP_OPS), port);
        codec.bring_up(16_000).unwrap();

        // Reset error wins over the release error, but both were attempted.
        assert_eq!(
            codec.tear_down(),
            Err(TearDownError::Reset(BusError::NoAcknowledge))
        );
        assert_eq!(codec.phase(), Phase::TornDown);
        let (_, _, port) = codec.release();
        assert_eq!(port.unwrap().releases, 1);
    }

    #[test]
    fn release_error_is_reported_after_clean_reset() {
        let port = MockPort {
            release_error: Some(TransferError::Busy),
            ..MockPort::default()
        };
        let mut codec = make_codec_with(MockBus::new(), port);
        codec.bring_up(16_000).unwrap();
        assert_eq!(
            codec.tear_down(),
            Err(TearDownError::Release(TransferError::Busy))
        );
        assert_eq!(codec.phase(), Phase::TornDown);
    }

    #[test]
    fn bring_up_again_after_tear_down() {
        let mut codec = configured_codec();
        codec.tear_down().unwrap();
        codec.bring_up(22_050).unwrap();
        assert_eq!(codec.transitions()[0], Phase::TornDown);
        assert_eq!(codec.phase(), Phase::Configured);
        assert_eq!(codec.sample_rate(), Some(SampleRate::Hz22050));
    }

    // ── Streaming lifecycle ────────────────────────────────────────────

    #[test]
    fn streaming_moves_the_port_and_back() {
        let signal = StreamSignal::new();
        let mut a = [1i16; 8];
        let mut b = [0i16; 8];
        let mut codec = configured_codec();

        let mut session = codec.start_streaming(&mut a, &mut b, 8, &signal).unwrap();
        assert_eq!(codec.phase(), Phase::Streaming);
        assert!(signal.is_active());

        // Control path stays available.
        codec.set_output_volume(25).unwrap();
        assert_eq!(codec.tear_down(), Err(TearDownError::SessionActive));

        session.cycle(&mut MockDelay::default()).unwrap();
        let summary = codec.stop_streaming(session).unwrap();
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.swaps, 1);
        assert_eq!(codec.phase(), Phase::Configured);
        assert!(!signal.is_active());
        assert!(signal.stop_requested());

        let (_, _, port) = codec.release();
        assert_eq!(port.unwrap().stops, 1);
    }

    #[test]
    fn second_session_is_refused() {
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let (mut c, mut d) = ([0i16; 4], [0i16; 4]);
        let mut codec = configured_codec();

        let session = codec.start_streaming(&mut a, &mut b, 4, &signal).unwrap();
        assert!(matches!(
            codec.start_streaming(&mut c, &mut d, 4, &signal),
            Err(StreamError::InvalidPhase(Phase::Streaming))
        ));
        codec.stop_streaming(session).unwrap();
    }

    #[test]
    fn streaming_requires_configured_phase() {
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut codec = make_codec();
        assert!(matches!(
            codec.start_streaming(&mut a, &mut b, 4, &signal),
            Err(StreamError::InvalidPhase(Phase::Uninitialized))
        ));
    }

    #[test]
    fn buffer_shapes_are_validated() {
        let signal = StreamSignal::new();
        let mut codec = configured_codec();

        let (mut a, mut b) = ([0i16; 4], [0i16; 5]);
        assert!(matches!(
            codec.start_streaming(&mut a, &mut b, 4, &signal),
            Err(StreamError::InvalidBuffers { len_a: 4, len_b: 5, cycle_len: 4 })
        ));

        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        assert!(matches!(
            codec.start_streaming(&mut a, &mut b, 0, &signal),
            Err(StreamError::InvalidBuffers { cycle_len: 0, .. })
        ));
        assert!(matches!(
            codec.start_streaming(&mut a, &mut b, 5, &signal),
            Err(StreamError::InvalidBuffers { cycle_len: 5, .. })
        ));
        assert_eq!(codec.phase(), Phase::Configured);
    }

    #[test]
    fn stop_failure_still_returns_the_port() {
        let port = MockPort {
            stop_error: Some(TransferError::Timeout),
            ..MockPort::default()
        };
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut codec = make_codec_with(MockBus::new(), port);
        codec.bring_up(16_000).unwrap();

        let session = codec.start_streaming(&mut a, &mut b, 4, &signal).unwrap();
        let err = codec.stop_streaming(session).unwrap_err();
        assert_eq!(err.failure(), Some(&StreamError::Stop(TransferError::Timeout)));
        assert_eq!(codec.phase(), Phase::Configured);
        codec.tear_down().unwrap();

        let (_, _, port) = codec.release();
        let port = port.unwrap();
        assert_eq!(port.stops, 1);
        assert_eq!(port.releases, 1);
    }

    #[test]
    fn tear_down_streaming_stops_then_resets() {
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut codec = configured_codec();

        let session = codec.start_streaming(&mut a, &mut b, 2, &signal).unwrap();
        codec.tear_down_streaming(session).unwrap();
        assert_eq!(codec.phase(), Phase::TornDown);
        assert_eq!(
            codec.transitions(),
            &[
                Phase::Uninitialized,
                Phase::HardwareReady,
                Phase::Identified,
                Phase::Reset,
                Phase::Configured,
                Phase::Streaming,
                Phase::Configured,
                Phase::TornDown,
            ]
        );

        let (bus, _, port) = codec.release();
        assert_eq!(bus.log.last(), Some(&Op::Write(0x00, 0x1F)));
        let port = port.unwrap();
        assert_eq!((port.stops, port.releases), (1, 1));
    }

    #[test]
    fn trace_keeps_the_latest_transitions() {
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut codec = configured_codec();
        for _ in 0..TRACE_DEPTH {
            let session = codec.start_streaming(&mut a, &mut b, 4, &signal).unwrap();
            codec.stop_streaming(session).unwrap();
        }
        assert_eq!(codec.transitions().len(), TRACE_DEPTH);
        assert_eq!(codec.transitions().last(), Some(&Phase::Configured));
    }

    #[test]
    fn tear_down_streaming_reports_stop_failure_as_release() {
        let port = MockPort {
            stop_error: Some(TransferError::Timeout),
            ..MockPort::default()
        };
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut codec = make_codec_with(MockBus::new(), port);
        codec.bring_up(16_000).unwrap();

        let session = codec.start_streaming(&mut a, &mut b, 4, &signal).unwrap();
        let err = codec.tear_down_streaming(session).unwrap_err();
        assert_eq!(err.failure(), Some(&TearDownError::Release(TransferError::Timeout)));
        assert_eq!(codec.phase(), Phase::TornDown);

        let (bus, _, port) = codec.release();
        assert_eq!(bus.log.last(), Some(&Op::Write(0x00, 0x1F)));
        let port = port.unwrap();
        assert_eq!((port.stops, port.releases), (1, 1));
    }

    #[test]
    fn tear_down_streaming_reports_reset_failure_first() {
        let port = MockPort {
            stop_error: Some(TransferError::Busy),
            ..MockPort::default()
        };
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut codec = make_codec_with(MockBus::failing_at(BRING_UP_OPS), port);
        codec.bring_up(16_000).unwrap();

        let session = codec.start_streaming(&mut a, &mut b, 4, &signal).unwrap();
        let err = codec.tear_down_streaming(session).unwrap_err();
        assert_eq!(err.failure(), Some(&TearDownError::Reset(BusError::NoAcknowledge)));
        assert_eq!(codec.phase(), Phase::TornDown);

        let (_, _, port) = codec.release();
        assert_eq!(port.unwrap().releases, 1);
    }

    #[test]
    fn foreign_session_is_handed_back() {
        let signal = StreamSignal::new();
        let (mut a, mut b) = ([0i16; 4], [0i16; 4]);
        let mut first = configured_codec();
        let mut second = configured_codec();

        let session = first.start_streaming(&mut a, &mut b, 4, &signal).unwrap();
        let session = match second.stop_streaming(session) {
            Err(StopError::ForeignSession(session)) => session,
            other => panic!("stopped another handle's session: {other:?}"),
        };
        let session = match second.tear_down_streaming(session) {
            Err(StopError::ForeignSession(session)) => session,
            other => panic!("tore down with another handle's session: {other:?}"),
        };
        assert_eq!(second.phase(), Phase::Configured);
        assert_eq!(first.phase(), Phase::Streaming);
        assert!(signal.is_active());

        first.stop_streaming(session).unwrap();
        first.tear_down().unwrap();
        second.tear_down().unwrap();

        let (_, _, port) = first.release();
        assert_eq!(port.unwrap().stops, 1);
        let (_, _, port) = second.release();
        let port = port.unwrap();
        assert_eq!((port.stops, port.releases), (0, 1));
    }
}
