//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use embedded_hal::delay::DelayNs;
use es8311_audio::{
    BusError, ClockError, CodecConfig, Es8311, RegisterBus, SampleRate, SerialAudio,
    SerialAudioPort, TransferError,
};

/// Register file preloaded with the ES8311 identification bytes.
pub struct RegisterFile {
    pub regs: [u8; 256],
    pub writes: Vec<(u8, u8)>,
    pub reads: usize,
}

impl RegisterFile {
    pub fn new() -> Self {
        let mut regs = [0u8; 256];
        regs[0xFD] = 0x83;
        regs[0xFE] = 0x11;
        Self {
            regs,
            writes: Vec::new(),
            reads: 0,
        }
    }
}

impl RegisterBus for RegisterFile {
    fn write(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.regs[usize::from(register)] = value;
        self.writes.push((register, value));
        Ok(())
    }

    fn read(&mut self, register: u8) -> Result<u8, BusError> {
        self.reads += 1;
        Ok(self.regs[usize::from(register)])
    }
}

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Echoes every transmitted sample plus one into the receive buffer.
#[derive(Default)]
pub struct EchoPort {
    pub rate: Option<SampleRate>,
    pub transfers: u32,
    pub stops: u32,
    pub releases: u32,
}

impl SerialAudioPort for EchoPort {
    fn configure(&mut self, rate: SampleRate) -> Result<(), ClockError> {
        self.rate = Some(rate);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransferError> {
        self.stops += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), TransferError> {
        self.releases += 1;
        Ok(())
    }
}

impl SerialAudio for EchoPort {
    fn transfer(&mut self, tx: &[i16], rx: &mut [i16]) -> Result<(), TransferError> {
        self.transfers += 1;
        for (r, t) in rx.iter_mut().zip(tx) {
            *r = t.wrapping_add(1);
        }
        Ok(())
    }
}

pub type TestCodec = Es8311<RegisterFile, NoopDelay, EchoPort>;

pub fn configured_codec() -> TestCodec {
    let mut codec = Es8311::new(
        RegisterFile::new(),
        NoopDelay,
        EchoPort::default(),
        CodecConfig::default(),
    );
    codec.bring_up(16_000).expect("bring-up");
    codec
}
