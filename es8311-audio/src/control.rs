use crate::codec::Es8311;
use crate::error::ControlError;
use crate::transport::{RegisterBus, SerialAudioPort};

/// Runtime level control for codec chips.
pub trait AudioControl {
    /// Error type for control operations.
    type Error;

    /// Set the playback volume in percent (0 = silent, 100 = full scale).
    fn set_output_volume(&mut self, percent: u8) -> Result<(), Self::Error>;

    /// Set the capture volume in percent.
    fn set_input_volume(&mut self, percent: u8) -> Result<(), Self::Error>;

    /// Set the microphone preamp gain as a step index.
    fn set_microphone_gain(&mut self, step: u8) -> Result<(), Self::Error>;
}

impl<B, D, S> AudioControl for Es8311<B, D, S>
where
    B: RegisterBus,
    D: embedded_hal::delay::DelayNs,
    S: SerialAudioPort,
{
    type Error = ControlError;

    fn set_output_volume(&mut self, percent: u8) -> Result<(), Self::Error> {
        Es8311::set_output_volume(self, percent)
    }

    fn set_input_volume(&mut self, percent: u8) -> Result<(), Self::Error> {
        Es8311::set_input_volume(self, percent)
    }

    fn set_microphone_gain(&mut self, step: u8) -> Result<(), Self::Error> {
        Es8311::set_microphone_gain(self, step)
    }
}
