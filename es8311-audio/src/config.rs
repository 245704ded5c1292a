//! Sample rates and runtime codec configuration.

use crate::constants::{DEFAULT_MIC_GAIN_STEP, DEFAULT_VOLUME_PERCENT};
use crate::gain::{MicGainStep, VolumePercent};

/// Sample rates the serial-audio clock tree can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    /// 8 kHz.
    Hz8000,
    /// 11.025 kHz.
    Hz11025,
    /// 16 kHz.
    Hz16000,
    /// 22.05 kHz.
    Hz22050,
}

impl SampleRate {
    /// Every supported rate, lowest first.
    pub const ALL: [SampleRate; 4] = [
        SampleRate::Hz8000,
        SampleRate::Hz11025,
        SampleRate::Hz16000,
        SampleRate::Hz22050,
    ];

    /// Look up a supported rate by its nominal frequency.
    pub const fn from_hz(hz: u32) -> Option<Self> {
        match hz {
            8_000 => Some(SampleRate::Hz8000),
            11_025 => Some(SampleRate::Hz11025),
            16_000 => Some(SampleRate::Hz16000),
            22_050 => Some(SampleRate::Hz22050),
            _ => None,
        }
    }

    /// Nominal frequency in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8_000,
            SampleRate::Hz11025 => 11_025,
            SampleRate::Hz16000 => 16_000,
            SampleRate::Hz22050 => 22_050,
        }
    }
}

/// Levels applied at the end of bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecConfig {
    /// Initial DAC volume.
    pub output_volume: VolumePercent,
    /// Initial ADC volume.
    pub input_volume: VolumePercent,
    /// Initial microphone PGA gain.
    pub mic_gain: MicGainStep,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            output_volume: VolumePercent::saturating(DEFAULT_VOLUME_PERCENT),
            input_volume: VolumePercent::saturating(DEFAULT_VOLUME_PERCENT),
            mic_gain: MicGainStep::saturating(DEFAULT_MIC_GAIN_STEP),
        }
    }
}
