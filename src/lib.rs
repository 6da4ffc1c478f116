//! Control of Multi Channel Systems STG4000-series stimulators.
//!
//! [`Stg`] turns calls in physical units ("1 mA for 100 µs on channel 0")
//! into the device's own sequence of mode changes, unit conversions, data
//! transfers and trigger commands. The driver sits behind the
//! [`StgInterface`] trait; [`SimulatedStg`] implements it in memory.

pub mod config;
pub mod device;
pub mod error;
pub mod journal;
pub mod stg;
pub mod trigger;
pub mod types;
pub mod units;
pub mod waveform;

pub use crate::config::{initialize_logging, load_config, load_config_or_default, StgConfig};
pub use crate::device::{select, Session, SimulatedStg, SimulatorConfig, StagedWaveform, StgInterface};
pub use crate::error::StgError;
pub use crate::journal::{Command, Journal, JournalEntry};
pub use crate::stg::{Stg, StgBuilder};
pub use crate::trigger::{to_bitmask, TriggerEntry, TriggerMap};
pub use crate::types::{ChannelIndex, DeviceInfo, ElectricalMode, TriggerIndex, VersionInfo};
pub use crate::waveform::{DeviceWaveform, Waveform};
