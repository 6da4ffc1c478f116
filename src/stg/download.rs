use log::{debug, warn};

use super::Stg;
use crate::device::{Session, StgInterface};
use crate::error::StgError;
use crate::journal::Command;
use crate::types::{ChannelIndex, ElectricalMode};
use crate::waveform::Waveform;

impl<D: StgInterface> Stg<D> {
    /// Download a current-mode stimulation signal to one channel.
    ///
    /// The signal is given compressed, as amplitudes in mA and how long each
    /// one is held in ms. Whatever was staged on the channel before is erased.
    ///
    /// # Errors
    /// - [`StgError::Validation`] if the two slices differ in length or hold
    ///   values the device cannot represent. Nothing is sent in that case.
    /// - [`StgError::Device`] as reported by the driver, unmodified.
    ///
    /// # Examples
    /// ```
    /// use rusty_stg::{SimulatedStg, Stg};
    ///
    /// let mut stg = Stg::new(SimulatedStg::default(), None)?;
    ///
    /// // Biphasic pulse, 100 µs per phase at 1 mA, on the first channel
    /// stg.download(0, &[1.0, -1.0, 0.0], &[0.1, 0.1, 0.488])?;
    /// # Ok::<(), rusty_stg::StgError>(())
    /// ```
    pub fn download(
        &mut self,
        channel: ChannelIndex,
        amplitudes_in_ma: &[f64],
        durations_in_ms: &[f64],
    ) -> Result<(), StgError> {
        let waveform = Waveform::new(amplitudes_in_ma.to_vec(), durations_in_ms.to_vec())?;
        self.download_to(&[channel], &waveform, ElectricalMode::Current)
    }

    /// Download a voltage-mode signal to one channel, amplitudes in mV
    pub fn download_voltage(
        &mut self,
        channel: ChannelIndex,
        amplitudes_in_mv: &[f64],
        durations_in_ms: &[f64],
    ) -> Result<(), StgError> {
        let waveform = Waveform::new(amplitudes_in_mv.to_vec(), durations_in_ms.to_vec())?;
        self.download_to(&[channel], &waveform, ElectricalMode::Voltage)
    }

    /// Download the same waveform to every listed channel.
    ///
    /// All channels are switched to `mode` in one session, then each channel
    /// receives its own transfer, in the order given. The transfers are
    /// separate commands; use [`Stg::start_stimulation`] to fire channels
    /// together.
    pub fn download_to(
        &mut self,
        channels: &[ChannelIndex],
        waveform: &Waveform,
        mode: ElectricalMode,
    ) -> Result<(), StgError> {
        if channels.is_empty() {
            return Err(StgError::Validation(
                "No channel given to download to".to_string(),
            ));
        }

        let data = waveform.to_device(mode)?;
        debug!(
            "Downloading {} segments ({:.3} ms, {mode} mode) to channels {channels:?}",
            data.amplitudes.len(),
            waveform.total_duration_ms()
        );

        // The device reads incoming data according to its current mode
        self.set_mode(channels, mode)?;

        for &channel in channels {
            self.record(Command::Download {
                channel,
                mode,
                amplitudes: data.amplitudes.clone(),
                durations_us: data.durations_us.clone(),
            })?;
        }

        let mut session = Session::open(&mut self.device, &self.info)?;
        for &channel in channels {
            session
                .prepare_and_send_data(channel, &data.amplitudes, &data.durations_us, mode)
                .inspect_err(|e| warn!("Download to channel {channel} failed: {e}"))?;
        }

        Ok(())
    }
}
