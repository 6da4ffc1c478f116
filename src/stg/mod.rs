use log::debug;
use std::fmt;

use crate::config::StgConfig;
use crate::device::{select, Session, StgInterface};
use crate::error::StgError;
use crate::journal::{Command, Journal};
use crate::types::DeviceInfo;

pub mod download;
pub mod properties;
pub mod stimulation;


/// Builder for [`Stg`] controllers.
///
/// # Examples
///
/// ```
/// use rusty_stg::{SimulatedStg, StgBuilder};
///
/// let stg = StgBuilder::new()
///     .serial(4008)
///     .diagonalize(true)
///     .build(SimulatedStg::default())?;
/// assert_eq!(stg.name(), "STG4008");
/// # Ok::<(), rusty_stg::StgError>(())
/// ```
pub struct StgBuilder {
    serial: Option<u64>,
    diagonalize: bool,
    journal: Option<Journal>,
}

impl Default for StgBuilder {
    fn default() -> Self {
        Self {
            serial: None,
            diagonalize: true,
            journal: None,
        }
    }
}

impl StgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the device with this serial number instead of the first one
    pub fn serial(mut self, serial: u64) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Reset the trigger map to diagonal form while building (default: on)
    pub fn diagonalize(mut self, diagonalize: bool) -> Self {
        self.diagonalize = diagonalize;
        self
    }

    /// Record every state-changing command to `journal`
    pub fn journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Take device selection, trigger setup and journaling from a loaded config
    pub fn from_config(config: &StgConfig) -> Self {
        Self {
            serial: config.device.serial_number,
            diagonalize: config.device.diagonalize_on_connect,
            journal: config.logging.journal(),
        }
    }

    pub fn build<D: StgInterface>(self, mut device: D) -> Result<Stg<D>, StgError> {
        let info = select(&mut device, self.serial)?;

        let mut stg = Stg {
            device,
            info,
            journal: self.journal,
        };

        if self.diagonalize {
            stg.diagonalize_triggermap()?;
        }

        Ok(stg)
    }
}

/// Controller for one STG4000-series stimulator.
///
/// Every call opens a fresh [`Session`] to the device and releases it before
/// returning, on error paths too. Nothing is cached: defaults such as "all
/// channels" are read from the device at call time.
///
/// The methods are split by concern across submodules:
/// - [`properties`]: identity, version, ranges, modes, trigger map
/// - [`download`]: staging waveforms on channels
/// - [`stimulation`]: starting and stopping triggers
pub struct Stg<D: StgInterface> {
    device: D,
    info: DeviceInfo,
    journal: Option<Journal>,
}

impl Stg<crate::device::SimulatedStg> {
    /// Controller over a simulated device built from `config`
    pub fn simulated(config: &StgConfig) -> Result<Self, StgError> {
        let device = crate::device::SimulatedStg::new(config.simulator.clone());
        StgBuilder::from_config(config).build(device)
    }
}

impl<D: StgInterface> Stg<D> {
    /// Select a device (first attached, or by serial) and diagonalize its trigger map
    pub fn new(device: D, serial: Option<u64>) -> Result<Self, StgError> {
        let builder = StgBuilder::new();
        match serial {
            Some(serial) => builder.serial(serial).build(device),
            None => builder.build(device),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn journal_mut(&mut self) -> Option<&mut Journal> {
        self.journal.as_mut()
    }

    pub fn into_device(self) -> D {
        self.device
    }

    fn session(&mut self) -> Result<Session<'_, D>, StgError> {
        Session::open(&mut self.device, &self.info)
    }

    /// Journal a command before it is sent, so nothing reaches the device unrecorded
    fn record(&mut self, command: Command) -> Result<(), StgError> {
        if let Some(journal) = self.journal.as_mut() {
            debug!("Journaling {command:?}");
            journal.record(self.info.serial_number, command)?;
        }
        Ok(())
    }
}

impl<D: StgInterface> fmt::Display for Stg<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl<D: StgInterface> fmt::Debug for Stg<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stg")
            .field("info", &self.info)
            .field("journal", &self.journal.as_ref().map(|j| j.file_path()))
            .finish()
    }
}
