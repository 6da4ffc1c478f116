use log::info;

use super::Stg;
use crate::device::StgInterface;
use crate::error::StgError;
use crate::journal::Command;
use crate::trigger::TriggerMap;
use crate::types::{ChannelIndex, DeviceInfo, ElectricalMode, VersionInfo};
use crate::units::{na_to_ma, na_to_ua, uv_to_mv, TIME_RESOLUTION_US};

impl<D: StgInterface> Stg<D> {
    /// Model name, e.g. `STG4002`, `STG4004` or `STG4008`
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn serial_number(&self) -> u64 {
        self.info.serial_number
    }

    pub fn manufacturer(&self) -> &str {
        &self.info.manufacturer
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn version_info(&mut self) -> Result<VersionInfo, StgError> {
        self.session()?.version_info()
    }

    /// Hardware and software version, e.g.
    /// `Hardware - Revision A : Software - Version: 1.0.0`
    pub fn version(&mut self) -> Result<String, StgError> {
        Ok(self.version_info()?.to_string())
    }

    // The STG4000 series reports identical ranges on every channel, so the
    // getters below read channel 0.

    pub fn current_resolution_in_ua(&mut self) -> Result<f64, StgError> {
        Ok(na_to_ua(self.session()?.current_resolution_na(0)?))
    }

    pub fn current_resolution_in_ma(&mut self) -> Result<f64, StgError> {
        Ok(na_to_ma(self.session()?.current_resolution_na(0)?))
    }

    pub fn current_range_in_ma(&mut self) -> Result<f64, StgError> {
        Ok(na_to_ma(self.session()?.current_range_na(0)?))
    }

    pub fn current_range_in_ua(&mut self) -> Result<f64, StgError> {
        Ok(na_to_ua(self.session()?.current_range_na(0)?))
    }

    pub fn voltage_resolution_in_uv(&mut self) -> Result<f64, StgError> {
        Ok(self.session()?.voltage_resolution_uv(0)? as f64)
    }

    pub fn voltage_range_in_mv(&mut self) -> Result<f64, StgError> {
        Ok(uv_to_mv(self.session()?.voltage_range_uv(0)?))
    }

    pub fn time_resolution_in_us(&self) -> u64 {
        TIME_RESOLUTION_US
    }

    pub fn time_resolution_in_ms(&self) -> f64 {
        TIME_RESOLUTION_US as f64 / 1_000.0
    }

    pub fn dac_resolution(&mut self) -> Result<u32, StgError> {
        self.session()?.dac_resolution()
    }

    /// Number of stimulation channels, read from the device on every call
    pub fn channel_count(&mut self) -> Result<u32, StgError> {
        self.session()?.analog_channel_count()
    }

    /// Number of trigger inputs, read from the device on every call
    pub fn trigger_input_count(&mut self) -> Result<u32, StgError> {
        self.session()?.trigger_input_count()
    }

    /// Put channels into current mode; an empty slice switches the whole device
    pub fn set_current_mode(&mut self, channels: &[ChannelIndex]) -> Result<(), StgError> {
        self.set_mode(channels, ElectricalMode::Current)
    }

    /// Put channels into voltage mode; an empty slice switches the whole device
    pub fn set_voltage_mode(&mut self, channels: &[ChannelIndex]) -> Result<(), StgError> {
        self.set_mode(channels, ElectricalMode::Voltage)
    }

    /// Switch the listed channels to `mode` within a single session
    pub fn set_mode(
        &mut self,
        channels: &[ChannelIndex],
        mode: ElectricalMode,
    ) -> Result<(), StgError> {
        self.record(Command::SetMode {
            channels: channels.to_vec(),
            mode,
        })?;

        let mut session = self.session()?;
        if channels.is_empty() {
            session.set_mode(None, mode)
        } else {
            channels
                .iter()
                .try_for_each(|&channel| session.set_mode(Some(channel), mode))
        }
    }

    /// Route trigger `i` to channel `i` for every channel the device reports.
    ///
    /// Runs automatically when the controller is built; call again to undo a
    /// custom mapping.
    pub fn diagonalize_triggermap(&mut self) -> Result<(), StgError> {
        let channel_count = self.channel_count()?;
        let map = TriggerMap::diagonalize(channel_count)?;
        self.apply_trigger_map(&map)?;
        info!("Trigger map diagonalized over {channel_count} channels");
        Ok(())
    }

    /// Write a custom routing table to the device, starting at trigger 0
    pub fn apply_trigger_map(&mut self, map: &TriggerMap) -> Result<(), StgError> {
        self.record(Command::SetupTrigger {
            channel_masks: map.channel_masks().to_vec(),
            syncout_masks: map.syncout_masks().to_vec(),
            repeat_counts: map.repeat_counts().to_vec(),
        })?;

        let mut session = self.session()?;
        map.apply(&mut *session)
    }
}
