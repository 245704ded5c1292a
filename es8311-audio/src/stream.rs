//! Ping-pong streaming over the serial-audio port.
//!
//! A [`Session`] owns the port and a [`BufferPair`]. Each cycle transmits
//! `cycle_len` samples from the transmit buffer while receiving the same
//! number into the receive buffer, then swaps the two roles. Nothing is
//! copied; only the tag naming the transmit slot changes.
//!
//! ```text
//!   cycle n:    A ──tx──▶ codec ──rx──▶ B
//!   cycle n+1:  B ──tx──▶ codec ──rx──▶ A
//! ```
//!
//! Stopping goes through a caller-owned [`StreamSignal`]. A stop request is
//! observed at the next cycle boundary; an in-flight transfer always runs to
//! completion.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;

use crate::constants::{TRANSFER_RETRY_BACKOFF_MS, TRANSFER_RETRY_BUDGET};
use crate::error::{StreamError, TransferError};
use crate::transport::{AsyncSerialAudio, SerialAudio, SerialAudioPort};

// ── Buffer pair ────────────────────────────────────────────────────────────

/// One of the two buffers of a [`BufferPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub const fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// Two equal-length sample buffers with a tagged transmit role.
pub struct BufferPair<'b> {
    a: &'b mut [i16],
    b: &'b mut [i16],
    tx: Slot,
    swaps: u32,
}

impl<'b> BufferPair<'b> {
    /// Pair two buffers; `a` transmits first. `None` if the lengths differ.
    pub fn new(a: &'b mut [i16], b: &'b mut [i16]) -> Option<Self> {
        if a.len() != b.len() {
            return None;
        }
        Some(Self {
            a,
            b,
            tx: Slot::A,
            swaps: 0,
        })
    }

    /// Samples per buffer.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Slot currently holding the transmit role.
    pub fn tx_slot(&self) -> Slot {
        self.tx
    }

    /// Split into `(transmit, receive)` views.
    pub fn roles(&mut self) -> (&[i16], &mut [i16]) {
        match self.tx {
            Slot::A => (&*self.a, &mut *self.b),
            Slot::B => (&*self.b, &mut *self.a),
        }
    }

    /// Buffer that the next cycle transmits.
    pub fn transmit(&self) -> &[i16] {
        match self.tx {
            Slot::A => &*self.a,
            Slot::B => &*self.b,
        }
    }

    /// Buffer that the next cycle transmits, for filling between cycles.
    pub fn transmit_mut(&mut self) -> &mut [i16] {
        match self.tx {
            Slot::A => &mut *self.a,
            Slot::B => &mut *self.b,
        }
    }

    /// Buffer that the next cycle receives into.
    pub fn receive(&self) -> &[i16] {
        match self.tx {
            Slot::A => &*self.b,
            Slot::B => &*self.a,
        }
    }

    /// Exchange the roles.
    pub fn swap(&mut self) {
        self.tx = self.tx.other();
        self.swaps = self.swaps.wrapping_add(1);
    }

    /// Number of role swaps so far.
    pub fn swaps(&self) -> u32 {
        self.swaps
    }

    /// Give the buffers back as `(a, b)`.
    pub fn into_inner(self) -> (&'b mut [i16], &'b mut [i16]) {
        (self.a, self.b)
    }
}

// ── Stop signal ────────────────────────────────────────────────────────────

/// Cross-context stop flag and progress counter for one session at a time.
///
/// Usually a `static`. All methods take `&self` and are safe to call from
/// any thread or interrupt handler.
pub struct StreamSignal {
    stop: AtomicBool,
    active: AtomicBool,
    cycles: AtomicU32,
}

impl StreamSignal {
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            active: AtomicBool::new(false),
            cycles: AtomicU32::new(0),
        }
    }

    /// Ask the running session to end at the next cycle boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether a session is currently bound to this signal.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Cycles completed by the current (or last) session.
    pub fn completed_cycles(&self) -> u32 {
        self.cycles.load(Ordering::Acquire)
    }

    fn arm(&self) {
        self.stop.store(false, Ordering::Relaxed);
        self.cycles.store(0, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    fn disarm(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for StreamSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ── Session ────────────────────────────────────────────────────────────────

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamSummary {
    /// Completed cycles.
    pub cycles: u32,
    /// Transfer attempts that failed and were retried.
    pub retries: u32,
    /// Buffer role swaps.
    pub swaps: u32,
}

/// An active streaming session.
///
/// Created by [`Es8311::start_streaming`](crate::Es8311::start_streaming)
/// and handed back to
/// [`Es8311::stop_streaming`](crate::Es8311::stop_streaming).
pub struct Session<'b, S> {
    owner: u32,
    port: S,
    buffers: BufferPair<'b>,
    cycle_len: usize,
    signal: &'b StreamSignal,
    cycles: u32,
    retries: u32,
    failed: bool,
}

impl<'b, S: SerialAudioPort> Session<'b, S> {
    pub(crate) fn new(
        owner: u32,
        port: S,
        buffers: BufferPair<'b>,
        cycle_len: usize,
        signal: &'b StreamSignal,
    ) -> Self {
        signal.arm();
        Self {
            owner,
            port,
            buffers,
            cycle_len,
            signal,
            cycles: 0,
            retries: 0,
            failed: false,
        }
    }

    pub(crate) fn owner(&self) -> u32 {
        self.owner
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            cycles: self.cycles,
            retries: self.retries,
            swaps: self.buffers.swaps(),
        }
    }

    pub fn buffers(&self) -> &BufferPair<'b> {
        &self.buffers
    }

    /// Mutable buffer access between cycles.
    pub fn buffers_mut(&mut self) -> &mut BufferPair<'b> {
        &mut self.buffers
    }

    pub fn cycle_len(&self) -> usize {
        self.cycle_len
    }

    pub fn signal(&self) -> &'b StreamSignal {
        self.signal
    }

    /// Whether a cycle exhausted its retry budget.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn check_live(&self) -> Result<(), StreamError> {
        if self.failed {
            Err(StreamError::Failed)
        } else {
            Ok(())
        }
    }

    /// Account a failed attempt. `Ok` means retry after the back-off.
    fn retry_or_fail(&mut self, attempt: u8, cause: TransferError) -> Result<(), StreamError> {
        if attempt <= TRANSFER_RETRY_BUDGET {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "stream: cycle {} attempt {} failed: {}, retrying",
                self.cycles,
                attempt,
                cause
            );
            self.retries += 1;
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        defmt::error!(
            "stream: cycle {} failed after {} attempts: {}",
            self.cycles,
            attempt,
            cause
        );
        self.failed = true;
        self.signal.disarm();
        Err(StreamError::Transfer {
            cycle: self.cycles,
            attempts: attempt,
            cause,
        })
    }

    fn complete_cycle(&mut self) {
        self.buffers.swap();
        self.cycles = self.cycles.wrapping_add(1);
        self.signal.record_cycle();
    }

    /// Halt the channel and split the session into its port and counters.
    pub(crate) fn finish(self) -> (S, StreamSummary, Result<(), TransferError>) {
        let summary = self.summary();
        let Session {
            mut port, signal, ..
        } = self;
        signal.request_stop();
        let stopped = port.stop();
        signal.disarm();
        (port, summary, stopped)
    }
}

impl<'b, S: SerialAudio> Session<'b, S> {
    /// Run one cycle with blocking transfers.
    ///
    /// Makes up to `TRANSFER_RETRY_BUDGET + 1` attempts, sleeping
    /// `TRANSFER_RETRY_BACKOFF_MS` on `delay` between them. Suitable for
    /// timer- or interrupt-driven callers.
    pub fn cycle<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), StreamError> {
        self.check_live()?;
        let n = self.cycle_len;
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let (tx, rx) = self.buffers.roles();
            match SerialAudio::transfer(&mut self.port, &tx[..n], &mut rx[..n]) {
                Ok(()) => {
                    self.complete_cycle();
                    return Ok(());
                }
                Err(cause) => {
                    self.retry_or_fail(attempt, cause)?;
                    delay.delay_ms(TRANSFER_RETRY_BACKOFF_MS);
                }
            }
        }
    }

    /// Cycle until a stop is requested or a cycle fails.
    pub fn run<D: DelayNs>(&mut self, delay: &mut D) -> Result<StreamSummary, StreamError> {
        self.check_live()?;
        while !self.signal.stop_requested() {
            self.cycle(delay)?;
        }
        Ok(self.summary())
    }
}

impl<'b, S: AsyncSerialAudio> Session<'b, S> {
    /// Run one cycle, awaiting transfer completion.
    pub async fn cycle_async<D>(&mut self, delay: &mut D) -> Result<(), StreamError>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.check_live()?;
        let n = self.cycle_len;
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let (tx, rx) = self.buffers.roles();
            match AsyncSerialAudio::transfer(&mut self.port, &tx[..n], &mut rx[..n]).await {
                Ok(()) => {
                    self.complete_cycle();
                    return Ok(());
                }
                Err(cause) => {
                    self.retry_or_fail(attempt, cause)?;
                    delay.delay_ms(TRANSFER_RETRY_BACKOFF_MS).await;
                }
            }
        }
    }

    /// Cycle until a stop is requested or a cycle fails.
    pub async fn run_async<D>(&mut self, delay: &mut D) -> Result<StreamSummary, StreamError>
    where
        D: embedded_hal_async::delay::DelayNs,
    {
        self.check_live()?;
        while !self.signal.stop_requested() {
            self.cycle_async(delay).await?;
        }
        Ok(self.summary())
    }
}
