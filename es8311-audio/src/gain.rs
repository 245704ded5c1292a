//! Gain and volume mapping.
//!
//! Pure conversions from caller-facing units to ES8311 register bytes. Inputs
//! outside the valid domain are rejected before any register access happens.

use crate::error::InvalidParameterError;

/// Highest accepted volume percentage.
pub const MAX_VOLUME_PERCENT: u8 = 100;

/// Highest microphone PGA step (30 dB).
pub const MAX_MIC_GAIN_STEP: u8 = 10;

/// Decibels per microphone PGA step.
pub const MIC_GAIN_STEP_DB: u8 = 3;

/// Map a volume percentage to a DAC/ADC volume register byte.
///
/// `byte = floor(255 * percent / 100)`, so 0 → `0x00`, 50 → `0x7F`,
/// 100 → `0xFF`.
pub fn percent_to_volume_byte(percent: u8) -> Result<u8, InvalidParameterError> {
    if percent > MAX_VOLUME_PERCENT {
        return Err(InvalidParameterError::VolumeOutOfRange(percent));
    }
    // 255 * 100 fits in u16; the quotient is at most 255.
    Ok((u16::from(percent) * 255 / 100) as u8)
}

/// Map a microphone gain step to the PGAGAIN field of the input-select
/// register. Step `n` is `3 * n` dB.
pub fn mic_gain_step_to_byte(step: u8) -> Result<u8, InvalidParameterError> {
    if step > MAX_MIC_GAIN_STEP {
        return Err(InvalidParameterError::MicGainOutOfRange(step));
    }
    Ok(step)
}

/// A validated volume percentage (0–100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct VolumePercent(u8);

impl VolumePercent {
    /// Mute level.
    pub const MIN: VolumePercent = VolumePercent(0);
    /// Full scale.
    pub const MAX: VolumePercent = VolumePercent(MAX_VOLUME_PERCENT);

    /// Validate a percentage.
    pub fn try_new(percent: u8) -> Result<Self, InvalidParameterError> {
        if percent > MAX_VOLUME_PERCENT {
            Err(InvalidParameterError::VolumeOutOfRange(percent))
        } else {
            Ok(Self(percent))
        }
    }

    /// Clamp a percentage into range.
    pub const fn saturating(percent: u8) -> Self {
        if percent > MAX_VOLUME_PERCENT {
            Self(MAX_VOLUME_PERCENT)
        } else {
            Self(percent)
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Volume register byte for this level.
    pub fn register_value(self) -> u8 {
        (u16::from(self.0) * 255 / 100) as u8
    }
}

/// A validated microphone PGA step (0–10, 3 dB each).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct MicGainStep(u8);

impl MicGainStep {
    /// Validate a step index.
    pub fn try_new(step: u8) -> Result<Self, InvalidParameterError> {
        if step > MAX_MIC_GAIN_STEP {
            Err(InvalidParameterError::MicGainOutOfRange(step))
        } else {
            Ok(Self(step))
        }
    }

    /// Clamp a step index into range.
    pub const fn saturating(step: u8) -> Self {
        if step > MAX_MIC_GAIN_STEP {
            Self(MAX_MIC_GAIN_STEP)
        } else {
            Self(step)
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Gain in dB.
    pub fn db(self) -> u8 {
        self.0 * MIC_GAIN_STEP_DB
    }

    /// PGAGAIN field value.
    pub fn register_value(self) -> u8 {
        self.0
    }
}
