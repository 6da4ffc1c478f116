use log::{debug, info, warn};
use std::ops::{Deref, DerefMut};

use crate::error::StgError;
use crate::types::{ChannelIndex, DeviceInfo, ElectricalMode, VersionInfo};

/// Operations a stimulator driver must offer to be controlled by [`crate::Stg`].
///
/// The trait mirrors the vendor download interface one call for one call. It
/// carries no policy of its own: unit conversion, defaults, and the ordering
/// of mode changes before data transfer all live in [`crate::Stg`].
///
/// Every method except [`available`](StgInterface::available),
/// [`connect`](StgInterface::connect) and
/// [`disconnect`](StgInterface::disconnect) is only valid while a session is
/// open. Use [`Session`] rather than calling `connect`/`disconnect` by hand.
///
/// Implementations must report command failures verbatim as
/// [`StgError::Device`] and must never retry a command on their own. A failed
/// [`connect`](StgInterface::connect) is a resource failure:
/// [`StgError::Connection`] or [`StgError::DeviceNotFound`].
pub trait StgInterface: Send {
    // === Enumeration and session ===

    /// List all stimulators currently attached
    fn available(&mut self) -> Result<Vec<DeviceInfo>, StgError>;

    /// Open the communication channel to the given device.
    ///
    /// Fails with [`StgError::Connection`] or [`StgError::DeviceNotFound`].
    fn connect(&mut self, info: &DeviceInfo) -> Result<(), StgError>;

    /// Release the communication channel. Must be safe to call on any path.
    fn disconnect(&mut self);

    // === Properties ===

    fn version_info(&mut self) -> Result<VersionInfo, StgError>;

    fn analog_channel_count(&mut self) -> Result<u32, StgError>;

    fn trigger_input_count(&mut self) -> Result<u32, StgError>;

    fn current_resolution_na(&mut self, channel: ChannelIndex) -> Result<u32, StgError>;

    fn current_range_na(&mut self, channel: ChannelIndex) -> Result<u32, StgError>;

    fn voltage_resolution_uv(&mut self, channel: ChannelIndex) -> Result<u32, StgError>;

    fn voltage_range_uv(&mut self, channel: ChannelIndex) -> Result<u32, StgError>;

    fn dac_resolution(&mut self) -> Result<u32, StgError>;

    // === Mode and routing ===

    /// Switch one channel, or every channel when `channel` is `None`
    fn set_mode(
        &mut self,
        channel: Option<ChannelIndex>,
        mode: ElectricalMode,
    ) -> Result<(), StgError>;

    /// Write the trigger routing table starting at trigger `first_trigger`
    ///
    /// The three slices are parallel: entry `i` configures trigger
    /// `first_trigger + i`.
    fn setup_trigger(
        &mut self,
        first_trigger: u32,
        channel_map: &[u32],
        syncout_map: &[u32],
        repeat: &[u32],
    ) -> Result<(), StgError>;

    // === Stimulation ===

    fn send_start(&mut self, trigger_mask: u32) -> Result<(), StgError>;

    fn send_stop(&mut self, trigger_mask: u32) -> Result<(), StgError>;

    /// Erase the channel's staged data and replace it with the given segments
    ///
    /// Amplitudes are in nA for [`ElectricalMode::Current`] and µV for
    /// [`ElectricalMode::Voltage`]. Durations are in µs.
    fn prepare_and_send_data(
        &mut self,
        channel: ChannelIndex,
        amplitudes: &[i32],
        durations: &[u64],
        mode: ElectricalMode,
    ) -> Result<(), StgError>;
}

/// Scoped connection to a stimulator.
///
/// Connects on [`Session::open`] and disconnects when dropped, so the link is
/// released on success, early return and error alike. Any failure to connect
/// surfaces as a resource error; a driver-level message is kept as
/// [`StgError::Connection`].
pub struct Session<'a, D: StgInterface + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: StgInterface + ?Sized> Session<'a, D> {
    pub fn open(device: &'a mut D, info: &DeviceInfo) -> Result<Self, StgError> {
        debug!("Opening session to {info}");
        if let Err(e) = device.connect(info) {
            warn!("Failed to connect to {info}: {e}");
            return Err(match e {
                StgError::Device(msg) => StgError::Connection(msg),
                other => other,
            });
        }
        Ok(Self { device })
    }
}

impl<D: StgInterface + ?Sized> Deref for Session<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: StgInterface + ?Sized> DerefMut for Session<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: StgInterface + ?Sized> Drop for Session<'_, D> {
    fn drop(&mut self) {
        self.device.disconnect();
        debug!("Session closed");
    }
}

/// Pick a stimulator: the first one attached, or the one with `serial`.
pub fn select<D: StgInterface + ?Sized>(
    device: &mut D,
    serial: Option<u64>,
) -> Result<DeviceInfo, StgError> {
    let devices = device.available()?;

    let info = match serial {
        None => devices.into_iter().next().ok_or_else(|| {
            StgError::DeviceNotFound("no stimulator attached".to_string())
        })?,
        Some(serial) => devices
            .into_iter()
            .find(|d| d.serial_number == serial)
            .ok_or_else(|| {
                StgError::DeviceNotFound(format!("no stimulator with serial number {serial}"))
            })?,
    };

    info!("Selecting {}:SN {}", info.name, info.serial_number);
    Ok(info)
}
