//! # es8311-audio
//!
//! A `no_std`, allocation-free driver core for the Everest Semi
//! [ES8311](http://www.everest-semi.com/pdf/ES8311%20PB.pdf) mono audio
//! codec. It brings the chip up over its register bus, exposes gain control,
//! and runs full-duplex ping-pong streaming over a synchronous serial-audio
//! port.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Registers | [`codec::registers`] | Register addresses and bit patterns |
//! | Transport | [`transport`] | `RegisterBus` and serial-audio traits, I²C adapter |
//! | Codec | [`codec`] | [`Es8311`] handle: bring-up, gain, tear-down |
//! | Mapping | [`gain`] | Percent and step to register byte conversions |
//! | Streaming | [`stream`] | Buffer pair, stop signal, streaming session |
//! | Trait | [`control`] | [`AudioControl`] for generic level control |
//!
//! ## Quick start
//!
//! ```ignore
//! use es8311_audio::{CodecConfig, Es8311, I2cBus, StreamSignal};
//!
//! static SIGNAL: StreamSignal = StreamSignal::new();
//!
//! let mut codec = Es8311::new(I2cBus::new(i2c), delay, sai, CodecConfig::default());
//! codec.bring_up(16_000)?;
//!
//! let mut session = codec.start_streaming(&mut buf_a, &mut buf_b, 1024, &SIGNAL)?;
//! session.run(&mut timer)?;   // another context calls SIGNAL.request_stop()
//! codec.stop_streaming(session)?;
//! codec.tear_down()?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `i2c` | yes | [`I2cBus`] adapter over `embedded_hal::i2c::I2c` |
//! | `defmt` | no | `defmt` logging and `defmt::Format` on public types |
//!
//! ## Audio parameters
//!
//! - **Sample rates:** 8, 11.025, 16 and 22.05 kHz ([`SampleRate`])
//! - **Sample format:** `i16`, 16-bit left-justified on the wire
//! - **Reference buffer:** 2048 samples ([`constants::STREAM_BUFFER_SAMPLES`])
//! - **Transfer retries:** 2 per cycle ([`constants::TRANSFER_RETRY_BUDGET`])

#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

pub mod constants;
pub mod config;
pub mod error;
pub mod gain;
pub mod transport;
pub mod codec;
pub mod stream;
pub mod control;

pub use codec::{ConfigStep, Es8311, Phase};
pub use config::{CodecConfig, SampleRate};
pub use control::AudioControl;
pub use error::{
    BusError, ClockConfigError, ClockError, ControlError, IdentificationError, InitError,
    InvalidParameterError, SequenceError, StopError, StreamError, TearDownError, TransferError,
};
pub use gain::{MicGainStep, VolumePercent};
pub use stream::{BufferPair, Session, Slot, StreamSignal, StreamSummary};
#[cfg(feature = "i2c")]
pub use transport::I2cBus;
pub use transport::{AsyncSerialAudio, RegisterBus, SerialAudio, SerialAudioPort};
