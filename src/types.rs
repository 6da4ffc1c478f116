use serde::{Deserialize, Serialize};
use std::fmt;

/// 0-based index of a physical stimulation output
pub type ChannelIndex = u32;

/// 0-based index of a logical trigger line
pub type TriggerIndex = u32;

/// How a channel drives its output: as a current source or a voltage source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectricalMode {
    Current,
    Voltage,
}

impl ElectricalMode {
    /// Unit of the amplitudes a caller hands in for this mode
    pub fn amplitude_unit(&self) -> &'static str {
        match self {
            ElectricalMode::Current => "mA",
            ElectricalMode::Voltage => "mV",
        }
    }
}

impl fmt::Display for ElectricalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectricalMode::Current => write!(f, "current"),
            ElectricalMode::Voltage => write!(f, "voltage"),
        }
    }
}

/// Descriptor of one attached stimulator as reported by device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Model name, e.g. `STG4008`
    pub name: String,
    pub serial_number: u64,
    pub manufacturer: String,
}

impl DeviceInfo {
    pub fn new(name: &str, serial_number: u64, manufacturer: &str) -> Self {
        Self {
            name: name.to_string(),
            serial_number,
            manufacturer: manufacturer.to_string(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (SN {})",
            self.manufacturer, self.name, self.serial_number
        )
    }
}

/// Firmware and hardware revision strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub software: String,
    pub hardware: String,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hardware - {} : Software - Version: {}",
            self.hardware.replace("Rev.", "Revision"),
            self.software
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display_expands_revision() {
        let version = VersionInfo {
            software: "1.2.3".to_string(),
            hardware: "Rev. B".to_string(),
        };
        assert_eq!(
            version.to_string(),
            "Hardware - Revision B : Software - Version: 1.2.3"
        );
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo::new("STG4008", 1234, "Multi Channel Systems");
        assert_eq!(info.to_string(), "Multi Channel Systems STG4008 (SN 1234)");
    }

    #[test]
    fn test_mode_units() {
        assert_eq!(ElectricalMode::Current.amplitude_unit(), "mA");
        assert_eq!(ElectricalMode::Voltage.amplitude_unit(), "mV");
        assert_eq!(ElectricalMode::Voltage.to_string(), "voltage");
    }
}
