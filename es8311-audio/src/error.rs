//! Error taxonomy.
//!
//! Transport errors ([`BusError`], [`ClockError`], [`TransferError`]) are what
//! the external collaborators report. The remaining types are what the driver
//! reports to its caller, each tied to one operation.

use core::fmt;

use thiserror::Error;

use crate::codec::{ConfigStep, Phase};
use crate::stream::Session;

// ── Transport errors ───────────────────────────────────────────────────────

/// A single register read or write failed.
///
/// [`I2cBus`](crate::I2cBus) never reports `Timeout` since
/// `embedded_hal::i2c::ErrorKind` has no timeout kind. A HAL that can tell a
/// timeout apart should implement [`RegisterBus`](crate::RegisterBus)
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    #[error("register bus transaction timed out")]
    Timeout,
    #[error("codec did not acknowledge")]
    NoAcknowledge,
    /// Arbitration loss, overrun or any other controller fault.
    #[error("register bus fault")]
    Bus,
}

/// The serial-audio clock tree or peripheral could not be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    #[error("clock tree could not produce the requested rate")]
    ClockTree,
    #[error("serial-audio peripheral init failed")]
    Peripheral,
}

/// A serial-audio block transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    #[error("transfer timed out")]
    Timeout,
    #[error("transfer overrun")]
    Overrun,
    #[error("transfer channel busy")]
    Busy,
    #[error("dma error")]
    Dma,
}

// ── Driver errors ──────────────────────────────────────────────────────────

/// A gain or volume argument was outside its domain. No bus access happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvalidParameterError {
    #[error("volume {0}% is outside 0..=100")]
    VolumeOutOfRange(u8),
    #[error("microphone gain step {0} is outside 0..=10")]
    MicGainOutOfRange(u8),
}

/// The requested rate could not be set up. Raised before any register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockConfigError {
    #[error("unsupported sample rate {0} Hz")]
    UnsupportedRate(u32),
    #[error("serial-audio port configuration failed: {0}")]
    Port(ClockError),
}

/// The device did not identify as an ES8311.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdentificationError {
    #[error("identification register {register:#04x} unreadable: {cause}")]
    Unreadable { register: u8, cause: BusError },
    #[error("unexpected chip id {id1:#04x} {id2:#04x}")]
    Mismatch { id1: u8, id2: u8 },
}

/// A register access inside the reset or configuration steps failed.
///
/// The device is left partially configured; bring-up must be repeated from
/// the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("{step:?} failed at register {register:#04x}: {cause}")]
pub struct SequenceError {
    pub step: ConfigStep,
    pub register: u8,
    pub cause: BusError,
}

/// Bring-up failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    #[error("bring-up is not allowed in phase {0:?}")]
    InvalidPhase(Phase),
    #[error(transparent)]
    ClockConfig(#[from] ClockConfigError),
    #[error(transparent)]
    Identification(#[from] IdentificationError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

/// A gain or volume change failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlError {
    #[error("gain control is not available in phase {0:?}")]
    InvalidPhase(Phase),
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Streaming could not start, or the active session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    #[error("streaming is not available in phase {0:?}")]
    InvalidPhase(Phase),
    #[error("buffers of {len_a} and {len_b} samples cannot carry {cycle_len}-sample cycles")]
    InvalidBuffers {
        len_a: usize,
        len_b: usize,
        cycle_len: usize,
    },
    #[error("cycle {cycle} failed after {attempts} attempts: {cause}")]
    Transfer {
        cycle: u32,
        attempts: u8,
        cause: TransferError,
    },
    /// The session already failed and must be restarted.
    #[error("session has failed")]
    Failed,
    #[error("transfer channel did not stop cleanly: {0}")]
    Stop(TransferError),
}

/// Tear-down reported a problem. Resources were still released unless the
/// error is [`TearDownError::SessionActive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TearDownError {
    /// A streaming session still owns the serial-audio port.
    #[error("a streaming session is still active")]
    SessionActive,
    #[error("reset write failed: {0}")]
    Reset(BusError),
    #[error("serial-audio port release failed: {0}")]
    Release(TransferError),
}

/// Ending a session failed.
///
/// `E` is [`StreamError`] for [`Es8311::stop_streaming`](crate::Es8311::stop_streaming)
/// and [`TearDownError`] for
/// [`Es8311::tear_down_streaming`](crate::Es8311::tear_down_streaming).
pub enum StopError<'b, S, E = StreamError> {
    /// The session was started by another handle. It is handed back as is so
    /// that handle can still stop it.
    ForeignSession(Session<'b, S>),
    Failed(E),
}

impl<S, E> StopError<'_, S, E> {
    /// The operation error, if the session was not foreign.
    pub fn failure(&self) -> Option<&E> {
        match self {
            StopError::ForeignSession(_) => None,
            StopError::Failed(err) => Some(err),
        }
    }
}

impl<S, E: fmt::Debug> fmt::Debug for StopError<'_, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopError::ForeignSession(_) => f.write_str("ForeignSession(..)"),
            StopError::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

impl<S, E: fmt::Display> fmt::Display for StopError<'_, S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopError::ForeignSession(_) => f.write_str("session belongs to another codec handle"),
            StopError::Failed(err) => err.fmt(f),
        }
    }
}

impl<S, E: core::error::Error> core::error::Error for StopError<'_, S, E> {}
