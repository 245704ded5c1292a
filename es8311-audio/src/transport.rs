//! Interfaces to the two buses the codec sits on.
//!
//! - [`RegisterBus`]: one-byte register reads and writes over the control bus.
//! - [`SerialAudioPort`], [`SerialAudio`], [`AsyncSerialAudio`]: the
//!   synchronous serial audio bus carrying sample data.
//!
//! Retries and timeouts belong to the implementations of these traits. The
//! driver treats every call as a single bounded transaction and propagates
//! failure immediately.

use crate::config::SampleRate;
use crate::error::{BusError, ClockError, TransferError};

/// Single-register access to the codec control interface.
pub trait RegisterBus {
    /// Write one register.
    fn write(&mut self, register: u8, value: u8) -> Result<(), BusError>;

    /// Read one register.
    fn read(&mut self, register: u8) -> Result<u8, BusError>;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    fn write(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        (**self).write(register, value)
    }

    fn read(&mut self, register: u8) -> Result<u8, BusError> {
        (**self).read(register)
    }
}

/// Lifecycle of the serial-audio peripheral, shared by both transfer modes.
pub trait SerialAudioPort {
    /// Configure the clock tree and initialise the peripheral for `rate`.
    fn configure(&mut self, rate: SampleRate) -> Result<(), ClockError>;

    /// Halt the transfer channel. Called once a streaming session ends.
    fn stop(&mut self) -> Result<(), TransferError>;

    /// De-initialise the peripheral. Called on tear-down.
    fn release(&mut self) -> Result<(), TransferError>;
}

/// Blocking full-duplex block transfer.
pub trait SerialAudio: SerialAudioPort {
    /// Transmit `tx` while receiving into `rx`. Both slices have the same
    /// length. Returns once the whole block has been exchanged.
    fn transfer(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), TransferError>;
}

/// Completion-driven full-duplex block transfer.
///
/// The future resolves when the peripheral signals transfer completion
/// (typically a DMA transfer-complete interrupt).
pub trait AsyncSerialAudio: SerialAudioPort {
    /// Transmit `tx` while receiving into `rx`.
    async fn transfer(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), TransferError>;
}

#[cfg(feature = "i2c")]
pub use self::i2c::I2cBus;

#[cfg(feature = "i2c")]
mod i2c {
    use embedded_hal::i2c::{ErrorKind, I2c};

    use super::RegisterBus;
    use crate::codec::registers as reg;
    use crate::error::BusError;

    /// [`RegisterBus`] over an `embedded-hal` I2C controller.
    ///
    /// Writes are `[register, value]`; reads are a `write_read` of
    /// `[register]` followed by one byte.
    pub struct I2cBus<I2C> {
        i2c: I2C,
        address: u8,
    }

    impl<I2C: I2c> I2cBus<I2C> {
        /// Default address (A0 pin low).
        pub const DEFAULT_ADDRESS: u8 = reg::I2C_ADDR_A0_LOW;

        /// Alternate address (A0 pin high).
        pub const ALT_ADDRESS: u8 = reg::I2C_ADDR_A0_HIGH;

        /// Wrap a bus using the default address (0x18).
        pub fn new(i2c: I2C) -> Self {
            Self::new_with_address(i2c, Self::DEFAULT_ADDRESS)
        }

        pub fn new_with_address(i2c: I2C, address: u8) -> Self {
            Self { i2c, address }
        }

        pub fn address(&self) -> u8 {
            self.address
        }

        /// Return the wrapped I2C bus.
        pub fn release(self) -> I2C {
            self.i2c
        }
    }

    // `ErrorKind` has no timeout kind, so `BusError::Timeout` only comes from
    // hand-written `RegisterBus` implementations.
    fn map_error<E: embedded_hal::i2c::Error>(err: E) -> BusError {
        match err.kind() {
            ErrorKind::NoAcknowledge(_) => BusError::NoAcknowledge,
            _ => BusError::Bus,
        }
    }

    impl<I2C: I2c> RegisterBus for I2cBus<I2C> {
        fn write(&mut self, register: u8, value: u8) -> Result<(), BusError> {
            self.i2c
                .write(self.address, &[register, value])
                .map_err(map_error)
        }

        fn read(&mut self, register: u8) -> Result<u8, BusError> {
            let mut value = [0u8; 1];
            self.i2c
                .write_read(self.address, &[register], &mut value)
                .map_err(map_error)?;
            Ok(value[0])
        }
    }

}
