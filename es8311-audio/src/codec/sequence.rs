//! Bring-up state machine.
//!
//! Two layers:
//!
//! - [`Phase`] is the runtime lifecycle state stored in the codec handle and
//!   checked by every public operation. [`Phase::can_transition_to`] is the
//!   total transition function.
//! - `Sequence` is a zero-sized typestate used inside `bring_up`. Each step
//!   consumes the previous state, so the ordering
//!
//! ```text
//! [Start] --prepare_hardware--> [PortReady] --identify--> [Identified]
//!         --reset--> [ResetDone] --configure--> [Ready]
//! ```
//!
//! cannot be reordered or skipped without a compile error.

use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;

use super::es8311::Es8311;
use super::registers as reg;
use crate::config::SampleRate;
use crate::constants::{POWER_ON_SETTLE_MS, RESET_SETTLE_MS};
use crate::error::{ClockConfigError, IdentificationError, InitError};
use crate::transport::{RegisterBus, SerialAudioPort};

// ── Runtime phase ──────────────────────────────────────────────────────────

/// Lifecycle phase of a codec handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Created, nothing touched yet, or a bring-up was aborted.
    Uninitialized,
    /// Serial-audio clock tree and peripheral configured.
    HardwareReady,
    /// Chip ID verified.
    Identified,
    /// Reset pulsed and clock state machine on.
    Reset,
    /// Fully configured; gain control and streaming are available.
    Configured,
    /// A streaming session owns the serial-audio port.
    Streaming,
    /// Reset asserted and serial-audio port released.
    TornDown,
}

impl Phase {
    /// Next phase along the bring-up chain, if any.
    pub const fn successor(self) -> Option<Phase> {
        match self {
            Phase::Uninitialized | Phase::TornDown => Some(Phase::HardwareReady),
            Phase::HardwareReady => Some(Phase::Identified),
            Phase::Identified => Some(Phase::Reset),
            Phase::Reset => Some(Phase::Configured),
            Phase::Configured | Phase::Streaming => None,
        }
    }

    /// Whether the handle may move from `self` to `next`.
    pub const fn can_transition_to(self, next: Phase) -> bool {
        match (self, next) {
            (Phase::Uninitialized | Phase::TornDown, Phase::HardwareReady)
            | (Phase::HardwareReady, Phase::Identified)
            | (Phase::Identified, Phase::Reset)
            | (Phase::Reset, Phase::Configured)
            | (Phase::Configured, Phase::Streaming)
            | (Phase::Streaming, Phase::Configured) => true,
            // Abort paths of a failed bring-up.
            (
                Phase::Uninitialized
                | Phase::HardwareReady
                | Phase::Identified
                | Phase::Reset
                | Phase::TornDown,
                Phase::Uninitialized,
            ) => true,
            (Phase::TornDown, Phase::TornDown) => false,
            (_, Phase::TornDown) => true,
            _ => false,
        }
    }

    /// Phases in which gain registers may be written.
    pub const fn accepts_gain_control(self) -> bool {
        matches!(self, Phase::Configured | Phase::Streaming)
    }

    /// Phases from which `bring_up` may start.
    pub const fn accepts_bring_up(self) -> bool {
        matches!(self, Phase::Uninitialized | Phase::TornDown)
    }
}

/// One register access of the reset and configuration steps.
///
/// Reported in [`SequenceError`](crate::error::SequenceError) to pinpoint where a bring-up stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigStep {
    ResetAssert,
    ResetRelease,
    StateMachineOn,
    ClockSource,
    ClockMultiplier,
    AdcOversampling,
    DacOversampling,
    AdcScale,
    ClockDividers,
    SerialPortIn,
    SerialPortOut,
    AnalogPower,
    PgaAdcPower,
    DacPower,
    HeadphoneDrive,
    AdcEqualizer,
    DacRamp,
    DacVolume,
    AdcVolume,
    InputSelect,
}

// ── Typestate ──────────────────────────────────────────────────────────────

/// Nothing done yet.
pub(crate) struct Start;

/// Serial-audio port configured for the requested rate.
pub(crate) struct PortReady;

/// Chip ID verified.
pub(crate) struct Identified;

/// Reset released and clock state machine enabled.
pub(crate) struct ResetDone;

/// Every configuration write issued.
pub(crate) struct Ready;

/// Bring-up ordering token. Zero-sized.
#[must_use]
pub(crate) struct Sequence<State> {
    _state: PhantomData<State>,
}

impl<State> Sequence<State> {
    fn advance<Next>(self) -> Sequence<Next> {
        Sequence {
            _state: PhantomData,
        }
    }
}

impl Sequence<Start> {
    pub(crate) fn new() -> Self {
        Sequence {
            _state: PhantomData,
        }
    }

    /// Validate the rate and bring up the serial-audio clock tree.
    ///
    /// An unsupported rate fails before the port or the register bus is
    /// touched.
    pub(crate) fn prepare_hardware<B, D, S>(
        self,
        codec: &mut Es8311<B, D, S>,
        rate_hz: u32,
    ) -> Result<Sequence<PortReady>, InitError>
    where
        B: RegisterBus,
        D: DelayNs,
        S: SerialAudioPort,
    {
        let rate =
            SampleRate::from_hz(rate_hz).ok_or(ClockConfigError::UnsupportedRate(rate_hz))?;
        codec
            .configure_port(rate)
            .map_err(ClockConfigError::Port)?;
        codec.set_sample_rate(rate);
        codec.enter(Phase::HardwareReady);
        Ok(self.advance())
    }
}

impl Sequence<PortReady> {
    /// Wait for the chip to settle, then check both ID registers. The version
    /// byte is read for diagnostics only; a failed read leaves it unknown.
    pub(crate) fn identify<B, D, S>(
        self,
        codec: &mut Es8311<B, D, S>,
    ) -> Result<Sequence<Identified>, InitError>
    where
        B: RegisterBus,
        D: DelayNs,
        S: SerialAudioPort,
    {
        codec.settle_ms(POWER_ON_SETTLE_MS);

        let id1 = codec.identify_read(reg::CHIP_ID1)?;
        let id2 = codec.identify_read(reg::CHIP_ID2)?;
        if id1 != reg::EXPECTED_ID1 || id2 != reg::EXPECTED_ID2 {
            return Err(IdentificationError::Mismatch { id1, id2 }.into());
        }

        match codec.read_register(reg::CHIP_VERSION) {
            Ok(version) => {
                codec.set_chip_version(version);

                #[cfg(feature = "defmt")]
                defmt::info!("es8311: chip id {=u8:#x} {=u8:#x}, version {=u8:#x}", id1, id2, version);
            }
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("es8311: version register unreadable: {}", _err);
            }
        }

        codec.enter(Phase::Identified);
        Ok(self.advance())
    }
}

impl Sequence<Identified> {
    /// Pulse every reset line, then start the clock state machine.
    ///
    /// Reset must be cleared before CSM is switched on.
    pub(crate) fn reset<B, D, S>(
        self,
        codec: &mut Es8311<B, D, S>,
    ) -> Result<Sequence<ResetDone>, InitError>
    where
        B: RegisterBus,
        D: DelayNs,
        S: SerialAudioPort,
    {
        codec.step_write(ConfigStep::ResetAssert, reg::RESET, reg::RESET_ASSERT_ALL)?;
        codec.settle_ms(RESET_SETTLE_MS);
        codec.step_write(ConfigStep::ResetRelease, reg::RESET, reg::RESET_CLEAR)?;
        codec.step_write(ConfigStep::StateMachineOn, reg::RESET, reg::CSM_ON)?;

        codec.enter(Phase::Reset);
        Ok(self.advance())
    }
}

impl Sequence<ResetDone> {
    /// Clocking, serial format, power-up, filters and default levels.
    pub(crate) fn configure<B, D, S>(
        self,
        codec: &mut Es8311<B, D, S>,
    ) -> Result<Sequence<Ready>, InitError>
    where
        B: RegisterBus,
        D: DelayNs,
        S: SerialAudioPort,
    {
        let config = *codec.config();

        // MCLK derived from BCLK; IMCLK = 8 x BCLK.
        codec.step_write(
            ConfigStep::ClockSource,
            reg::CLK_MANAGER1,
            reg::CLK_MANAGER1_BCLK_SOURCE,
        )?;
        codec.step_write(
            ConfigStep::ClockMultiplier,
            reg::CLK_MANAGER2,
            reg::MULT_PRE_X8 | reg::DIV_PRE_1,
        )?;
        codec.step_write(ConfigStep::AdcOversampling, reg::CLK_MANAGER3, reg::ADC_OSR_32)?;
        codec.step_write(ConfigStep::DacOversampling, reg::CLK_MANAGER4, reg::DAC_OSR_32)?;

        let scale = codec.step_read(ConfigStep::AdcScale, reg::ADC_16)?;
        codec.step_write(ConfigStep::AdcScale, reg::ADC_16, scale & !reg::ADC_SCALE_MASK)?;

        codec.step_write(
            ConfigStep::ClockDividers,
            reg::CLK_MANAGER5,
            reg::DIV_CLKADC_1 | reg::DIV_CLKDAC_1,
        )?;

        codec.step_write(ConfigStep::SerialPortIn, reg::SDP_IN, reg::SDP_16BIT_LEFT_JUSTIFIED)?;
        codec.step_write(ConfigStep::SerialPortOut, reg::SDP_OUT, reg::SDP_16BIT_LEFT_JUSTIFIED)?;

        // Power-up order is analog, PGA/ADC, DAC, headphone drive.
        codec.step_write(ConfigStep::AnalogPower, reg::SYSTEM_0D, reg::SYSTEM_0D_ANALOG_POWER_UP)?;
        codec.step_write(ConfigStep::PgaAdcPower, reg::SYSTEM_0E, reg::SYSTEM_0E_PGA_ADC_POWER_UP)?;
        codec.step_write(ConfigStep::DacPower, reg::SYSTEM_12, reg::SYSTEM_12_DAC_POWER_UP)?;
        codec.step_write(ConfigStep::HeadphoneDrive, reg::SYSTEM_13, reg::HPSW)?;

        codec.step_write(ConfigStep::AdcEqualizer, reg::ADC_1C, reg::ADC_1C_EQ_BYPASS_DC_CANCEL)?;
        codec.step_write(
            ConfigStep::DacRamp,
            reg::DAC_37,
            reg::DAC_RAMPRATE_DEFAULT | reg::DAC_EQBYPASS,
        )?;

        codec.step_write(
            ConfigStep::DacVolume,
            reg::DAC_VOLUME,
            config.output_volume.register_value(),
        )?;
        codec.step_write(
            ConfigStep::AdcVolume,
            reg::ADC_VOLUME,
            config.input_volume.register_value(),
        )?;
        codec.step_write(
            ConfigStep::InputSelect,
            reg::SYSTEM_14,
            reg::LINSEL | config.mic_gain.register_value(),
        )?;

        codec.enter(Phase::Configured);
        Ok(self.advance())
    }
}
