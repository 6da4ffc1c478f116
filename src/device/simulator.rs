//! In-memory stand-in for an STG4000-series stimulator.
//!
//! Useful for dry runs of a stimulation protocol and for tests. It enforces
//! the rules the real driver enforces: commands need an open session, channel
//! and amplitude ranges are checked, data must match the channel's mode, and
//! each download replaces what was staged before.

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::StgInterface;
use crate::error::StgError;
use crate::trigger::{TriggerEntry, TriggerMap};
use crate::types::{ChannelIndex, DeviceInfo, ElectricalMode, VersionInfo};
use crate::units::quantize_duration_us;

/// Properties reported by the simulated device
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulatorConfig {
    pub model: String,
    pub serial_number: u64,
    pub manufacturer: String,
    pub channel_count: u32,
    pub trigger_inputs: u32,
    pub current_range_na: u32,
    pub current_resolution_na: u32,
    pub voltage_range_uv: u32,
    pub voltage_resolution_uv: u32,
    pub dac_resolution: u32,
    pub software_version: String,
    pub hardware_version: String,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            model: "STG4008".to_string(),
            serial_number: 4008,
            manufacturer: "Multi Channel Systems".to_string(),
            channel_count: 8,
            trigger_inputs: 8,
            current_range_na: 16_000_000,
            current_resolution_na: 1_000,
            voltage_range_uv: 8_000_000,
            voltage_resolution_uv: 1_000,
            dac_resolution: 16,
            software_version: "1.0.0".to_string(),
            hardware_version: "Rev. A".to_string(),
        }
    }
}

impl SimulatorConfig {
    pub fn with_channels(channel_count: u32) -> Self {
        Self {
            model: format!("STG400{channel_count}"),
            channel_count,
            trigger_inputs: channel_count,
            ..Self::default()
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(&self.model, self.serial_number, &self.manufacturer)
    }
}

/// Data held by one simulated channel after a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedWaveform {
    pub mode: ElectricalMode,
    pub amplitudes: Vec<i32>,
    /// Durations after quantization to the 20 µs output grid
    pub durations_us: Vec<u64>,
}

#[derive(Debug)]
struct SimState {
    config: SimulatorConfig,
    connected: bool,
    sessions_opened: usize,
    modes: Vec<ElectricalMode>,
    staged: Vec<Option<StagedWaveform>>,
    trigger_map: TriggerMap,
    running_mask: u32,
    pending_fault: Option<String>,
}

impl SimState {
    fn new(config: SimulatorConfig) -> Self {
        let channels = config.channel_count as usize;
        // Unrouted until the first trigger setup
        let trigger_map = (0..config.trigger_inputs)
            .map(|_| TriggerEntry {
                channel_mask: 0,
                syncout_mask: 0,
                repeat_count: 1,
            })
            .collect();
        Self {
            config,
            connected: false,
            sessions_opened: 0,
            modes: vec![ElectricalMode::Voltage; channels],
            staged: vec![None; channels],
            trigger_map,
            running_mask: 0,
            pending_fault: None,
        }
    }

    /// Gate shared by every command issued inside a session
    fn command(&mut self, name: &str) -> Result<(), StgError> {
        if !self.connected {
            return Err(StgError::Device(format!(
                "{name}: no open connection to the device"
            )));
        }
        if let Some(fault) = self.pending_fault.take() {
            return Err(StgError::Device(format!("{name}: {fault}")));
        }
        debug!("[sim] {name}");
        Ok(())
    }

    fn check_channel(&self, channel: ChannelIndex) -> Result<usize, StgError> {
        if channel < self.config.channel_count {
            Ok(channel as usize)
        } else {
            Err(StgError::Device(format!(
                "Channel {channel} out of range, device has {} channels",
                self.config.channel_count
            )))
        }
    }

    fn check_trigger_mask(&self, mask: u32) -> Result<(), StgError> {
        let valid = 1u64
            .checked_shl(self.config.trigger_inputs)
            .map_or(u64::MAX, |bit| bit - 1);
        if u64::from(mask) & !valid != 0 {
            return Err(StgError::Device(format!(
                "Trigger mask {mask:#b} addresses inputs beyond the {} available",
                self.config.trigger_inputs
            )));
        }
        Ok(())
    }
}

/// Simulated stimulator.
///
/// Clones share the same device state, so a clone kept by the caller can
/// inspect what the controller did after the device itself was handed over.
///
/// ```
/// use rusty_stg::{SimulatedStg, Stg};
///
/// let sim = SimulatedStg::default();
/// let mut stg = Stg::new(sim.clone(), None)?;
/// stg.download(0, &[1.0, -1.0, 0.0], &[0.1, 0.1, 0.488])?;
///
/// let staged = sim.staged(0).expect("channel 0 holds data");
/// assert_eq!(staged.amplitudes, vec![1_000_000, -1_000_000, 0]);
/// # Ok::<(), rusty_stg::StgError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedStg {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedStg {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl SimulatedStg {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(config))),
        }
    }

    pub fn info(&self) -> DeviceInfo {
        self.state.lock().config.device_info()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of sessions opened so far
    pub fn sessions_opened(&self) -> usize {
        self.state.lock().sessions_opened
    }

    pub fn mode(&self, channel: ChannelIndex) -> Option<ElectricalMode> {
        self.state.lock().modes.get(channel as usize).copied()
    }

    pub fn staged(&self, channel: ChannelIndex) -> Option<StagedWaveform> {
        self.state
            .lock()
            .staged
            .get(channel as usize)
            .cloned()
            .flatten()
    }

    pub fn trigger_map(&self) -> TriggerMap {
        self.state.lock().trigger_map.clone()
    }

    /// Triggers currently started and not yet stopped
    pub fn running_mask(&self) -> u32 {
        self.state.lock().running_mask
    }

    /// Make the next session command fail with `message`
    pub fn inject_fault(&self, message: &str) {
        self.state.lock().pending_fault = Some(message.to_string());
    }
}

impl StgInterface for SimulatedStg {
    fn available(&mut self) -> Result<Vec<DeviceInfo>, StgError> {
        Ok(vec![self.info()])
    }

    fn connect(&mut self, info: &DeviceInfo) -> Result<(), StgError> {
        let mut state = self.state.lock();
        if info.serial_number != state.config.serial_number {
            return Err(StgError::Connection(format!(
                "Device SN {} is not attached",
                info.serial_number
            )));
        }
        if state.connected {
            return Err(StgError::Connection(
                "Device is already connected".to_string(),
            ));
        }
        state.connected = true;
        state.sessions_opened += 1;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().connected = false;
    }

    fn version_info(&mut self) -> Result<VersionInfo, StgError> {
        let mut state = self.state.lock();
        state.command("GetStgVersionInfo")?;
        Ok(VersionInfo {
            software: state.config.software_version.clone(),
            hardware: state.config.hardware_version.clone(),
        })
    }

    fn analog_channel_count(&mut self) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetNumberOfAnalogChannels")?;
        Ok(state.config.channel_count)
    }

    fn trigger_input_count(&mut self) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetNumberOfTriggerInputs")?;
        Ok(state.config.trigger_inputs)
    }

    fn current_resolution_na(&mut self, channel: ChannelIndex) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetCurrentResolutionInNanoAmp")?;
        state.check_channel(channel)?;
        Ok(state.config.current_resolution_na)
    }

    fn current_range_na(&mut self, channel: ChannelIndex) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetCurrentRangeInNanoAmp")?;
        state.check_channel(channel)?;
        Ok(state.config.current_range_na)
    }

    fn voltage_resolution_uv(&mut self, channel: ChannelIndex) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetVoltageResolutionInMicroVolt")?;
        state.check_channel(channel)?;
        Ok(state.config.voltage_resolution_uv)
    }

    fn voltage_range_uv(&mut self, channel: ChannelIndex) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetVoltageRangeInMicroVolt")?;
        state.check_channel(channel)?;
        Ok(state.config.voltage_range_uv)
    }

    fn dac_resolution(&mut self) -> Result<u32, StgError> {
        let mut state = self.state.lock();
        state.command("GetDACResolution")?;
        Ok(state.config.dac_resolution)
    }

    fn set_mode(
        &mut self,
        channel: Option<ChannelIndex>,
        mode: ElectricalMode,
    ) -> Result<(), StgError> {
        let mut state = self.state.lock();
        state.command("SetMode")?;
        match channel {
            Some(channel) => {
                let idx = state.check_channel(channel)?;
                state.modes[idx] = mode;
            }
            None => state.modes.iter_mut().for_each(|m| *m = mode),
        }
        Ok(())
    }

    fn setup_trigger(
        &mut self,
        first_trigger: u32,
        channel_map: &[u32],
        syncout_map: &[u32],
        repeat: &[u32],
    ) -> Result<(), StgError> {
        let mut state = self.state.lock();
        state.command("SetupTrigger")?;

        let map = TriggerMap::from_parts(channel_map.to_vec(), syncout_map.to_vec(), repeat.to_vec())
            .map_err(|e| StgError::Device(e.to_string()))?;

        let end = first_trigger as usize + map.len();
        if end > state.config.trigger_inputs as usize {
            return Err(StgError::Device(format!(
                "Trigger setup for inputs {first_trigger}..{end} exceeds the {} available",
                state.config.trigger_inputs
            )));
        }

        // Entries before `first_trigger` keep their routing
        let current = &state.trigger_map;
        let merged: TriggerMap = current
            .entries()
            .take(first_trigger as usize)
            .chain(map.entries())
            .chain(current.entries().skip(end))
            .collect();
        state.trigger_map = merged;
        Ok(())
    }

    fn send_start(&mut self, trigger_mask: u32) -> Result<(), StgError> {
        let mut state = self.state.lock();
        state.command("SendStart")?;
        state.check_trigger_mask(trigger_mask)?;
        state.running_mask |= trigger_mask;
        Ok(())
    }

    fn send_stop(&mut self, trigger_mask: u32) -> Result<(), StgError> {
        let mut state = self.state.lock();
        state.command("SendStop")?;
        state.check_trigger_mask(trigger_mask)?;
        state.running_mask &= !trigger_mask;
        Ok(())
    }

    fn prepare_and_send_data(
        &mut self,
        channel: ChannelIndex,
        amplitudes: &[i32],
        durations: &[u64],
        mode: ElectricalMode,
    ) -> Result<(), StgError> {
        let mut state = self.state.lock();
        state.command("PrepareAndSendData")?;
        let idx = state.check_channel(channel)?;

        if amplitudes.len() != durations.len() {
            return Err(StgError::Device(format!(
                "{} amplitudes but {} durations",
                amplitudes.len(),
                durations.len()
            )));
        }

        if state.modes[idx] != mode {
            return Err(StgError::Device(format!(
                "Channel {channel} is in {} mode, cannot accept {mode} data",
                state.modes[idx]
            )));
        }

        let range = match mode {
            ElectricalMode::Current => state.config.current_range_na,
            ElectricalMode::Voltage => state.config.voltage_range_uv,
        };
        if let Some(a) = amplitudes.iter().find(|a| a.unsigned_abs() > range) {
            return Err(StgError::Device(format!(
                "Amplitude {a} exceeds the channel range of {range}"
            )));
        }

        state.staged[idx] = Some(StagedWaveform {
            mode,
            amplitudes: amplitudes.to_vec(),
            durations_us: durations.iter().map(|&d| quantize_duration_us(d)).collect(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Session;

    #[test]
    fn test_commands_require_session() {
        let mut sim = SimulatedStg::default();
        let err = sim.analog_channel_count().unwrap_err();
        assert!(err.is_device());
    }

    #[test]
    fn test_session_connects_and_releases() {
        let mut sim = SimulatedStg::default();
        let handle = sim.clone();
        let info = sim.info();
        {
            let mut session = Session::open(&mut sim, &info).unwrap();
            assert!(handle.is_connected());
            assert_eq!(session.analog_channel_count().unwrap(), 8);
        }
        assert!(!handle.is_connected());
        assert_eq!(handle.sessions_opened(), 1);
    }

    #[test]
    fn test_wrong_serial_is_resource_error() {
        let mut sim = SimulatedStg::default();
        let info = DeviceInfo::new("STG4008", 1, "Multi Channel Systems");
        let err = Session::open(&mut sim, &info).err().unwrap();
        assert!(err.is_resource());
        assert!(!sim.is_connected());
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        let mut sim = SimulatedStg::default();
        let info = sim.info();
        let mut session = Session::open(&mut sim, &info).unwrap();
        session.set_mode(Some(0), ElectricalMode::Voltage).unwrap();
        let err = session
            .prepare_and_send_data(0, &[1_000], &[100], ElectricalMode::Current)
            .unwrap_err();
        assert!(err.is_device());
    }

    #[test]
    fn test_amplitude_range_and_channel_checked() {
        let mut sim = SimulatedStg::default();
        let info = sim.info();
        let mut session = Session::open(&mut sim, &info).unwrap();
        session.set_mode(None, ElectricalMode::Current).unwrap();

        assert!(session
            .prepare_and_send_data(0, &[17_000_000], &[100], ElectricalMode::Current)
            .is_err());
        assert!(session
            .prepare_and_send_data(8, &[1_000], &[100], ElectricalMode::Current)
            .is_err());
        assert!(session
            .prepare_and_send_data(7, &[-16_000_000], &[100], ElectricalMode::Current)
            .is_ok());
    }

    #[test]
    fn test_download_replaces_and_quantizes() {
        let mut sim = SimulatedStg::default();
        let handle = sim.clone();
        let info = sim.info();
        let mut session = Session::open(&mut sim, &info).unwrap();
        session.set_mode(Some(2), ElectricalMode::Current).unwrap();
        session
            .prepare_and_send_data(2, &[1, 2, 3], &[100, 100, 488], ElectricalMode::Current)
            .unwrap();
        session
            .prepare_and_send_data(2, &[5], &[30], ElectricalMode::Current)
            .unwrap();

        let staged = handle.staged(2).unwrap();
        assert_eq!(staged.amplitudes, vec![5]);
        assert_eq!(staged.durations_us, vec![40]);
    }

    #[test]
    fn test_partial_trigger_setup_keeps_other_entries() {
        let mut sim = SimulatedStg::new(SimulatorConfig::with_channels(4));
        let handle = sim.clone();
        let info = sim.info();
        let mut session = Session::open(&mut sim, &info).unwrap();
        TriggerMap::diagonalize(4).unwrap().apply(&mut *session).unwrap();
        session.setup_trigger(2, &[1], &[1], &[3]).unwrap();

        let map = handle.trigger_map();
        assert_eq!(map.channel_masks(), &[1, 2, 1, 8]);
        assert_eq!(map.repeat_counts(), &[1, 1, 3, 1]);
        assert!(session.setup_trigger(3, &[1, 1], &[1, 1], &[1, 1]).is_err());
    }

    #[test]
    fn test_start_stop_tracks_running_mask() {
        let mut sim = SimulatedStg::new(SimulatorConfig::with_channels(4));
        let handle = sim.clone();
        let info = sim.info();
        let mut session = Session::open(&mut sim, &info).unwrap();
        session.send_start(0b1011).unwrap();
        session.send_stop(0b0010).unwrap();
        assert_eq!(handle.running_mask(), 0b1001);
        assert!(session.send_start(0b10000).is_err());
    }

    #[test]
    fn test_injected_fault_fires_once() {
        let mut sim = SimulatedStg::default();
        let info = sim.info();
        sim.inject_fault("hardware fault");
        let mut session = Session::open(&mut sim, &info).unwrap();
        let err = session.send_start(1).unwrap_err();
        assert!(err.to_string().contains("hardware fault"));
        assert!(session.send_start(1).is_ok());
    }
}
