/// Settle time after power-on before the chip ID registers are readable.
pub const POWER_ON_SETTLE_MS: u32 = 100;

/// Hold time for the reset-assert value before it is released.
pub const RESET_SETTLE_MS: u32 = 20;

/// Number of immediate retries for a failed serial-audio transfer.
///
/// A cycle makes at most `TRANSFER_RETRY_BUDGET + 1` attempts.
pub const TRANSFER_RETRY_BUDGET: u8 = 2;

/// Back-off between transfer attempts inside one cycle.
pub const TRANSFER_RETRY_BACKOFF_MS: u32 = 100;

/// Reference streaming buffer length in 16-bit samples.
pub const STREAM_BUFFER_SAMPLES: usize = 2048;

/// Default DAC and ADC volume applied during bring-up, in percent.
pub const DEFAULT_VOLUME_PERCENT: u8 = 50;

/// Default microphone PGA step applied during bring-up (15 dB).
pub const DEFAULT_MIC_GAIN_STEP: u8 = 5;
