use serde::Serialize;

use crate::error::StgError;
use crate::types::ElectricalMode;
use crate::units::{to_device_amplitude, to_device_duration, to_device_voltage};

/// Piecewise-constant stimulation signal in physical units.
///
/// Segment `i` holds `amplitudes[i]` (mA in current mode, mV in voltage mode)
/// for `durations_ms[i]` milliseconds, and the next segment follows without a
/// gap.
///
/// # Examples
///
/// ```
/// use rusty_stg::Waveform;
///
/// // Biphasic pulse: 100 µs at +1 mA, 100 µs at -1 mA, then rest
/// let pulse = Waveform::new(vec![1.0, -1.0, 0.0], vec![0.1, 0.1, 0.488])?;
/// assert_eq!(pulse.len(), 3);
/// # Ok::<(), rusty_stg::StgError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    amplitudes: Vec<f64>,
    durations_ms: Vec<f64>,
}

impl Waveform {
    pub fn new(amplitudes: Vec<f64>, durations_ms: Vec<f64>) -> Result<Self, StgError> {
        if amplitudes.len() != durations_ms.len() {
            return Err(StgError::Validation(format!(
                "Every amplitude needs a duration and vice versa: got {} amplitudes and {} durations",
                amplitudes.len(),
                durations_ms.len()
            )));
        }

        if let Some(a) = amplitudes.iter().find(|a| !a.is_finite()) {
            return Err(StgError::Validation(format!(
                "Amplitude {a} is not a finite number"
            )));
        }

        if let Some(d) = durations_ms.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(StgError::Validation(format!(
                "Duration {d} ms is not a finite, non-negative number"
            )));
        }

        Ok(Self {
            amplitudes,
            durations_ms,
        })
    }

    /// Build from `(amplitude, duration_ms)` pairs
    pub fn from_segments<I>(segments: I) -> Result<Self, StgError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (amplitudes, durations_ms): (Vec<f64>, Vec<f64>) = segments.into_iter().unzip();
        Self::new(amplitudes, durations_ms)
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn durations_ms(&self) -> &[f64] {
        &self.durations_ms
    }

    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.durations_ms.iter().sum()
    }

    /// Convert to the integer units the device expects for `mode`.
    ///
    /// Fails if a converted amplitude does not fit the device's 32-bit sample.
    pub fn to_device(&self, mode: ElectricalMode) -> Result<DeviceWaveform, StgError> {
        let convert: fn(f64) -> i64 = match mode {
            ElectricalMode::Current => to_device_amplitude,
            ElectricalMode::Voltage => to_device_voltage,
        };

        let amplitudes = self
            .amplitudes
            .iter()
            .map(|&a| {
                i32::try_from(convert(a)).map_err(|_| {
                    StgError::Validation(format!(
                        "Amplitude {a} {} is outside the device's sample range",
                        mode.amplitude_unit()
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Durations were checked non-negative on construction
        let durations_us = self
            .durations_ms
            .iter()
            .map(|&d| to_device_duration(d).max(0) as u64)
            .collect();

        Ok(DeviceWaveform {
            mode,
            amplitudes,
            durations_us,
        })
    }
}

/// Waveform in device units: nA or µV amplitudes and µs durations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceWaveform {
    pub mode: ElectricalMode,
    pub amplitudes: Vec<i32>,
    pub durations_us: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Waveform::new(vec![1.0, -1.0], vec![0.1]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_negative_or_nan_duration_rejected() {
        assert!(Waveform::new(vec![1.0], vec![-0.1]).is_err());
        assert!(Waveform::new(vec![1.0], vec![f64::NAN]).is_err());
        assert!(Waveform::new(vec![f64::INFINITY], vec![0.1]).is_err());
    }

    #[test]
    fn test_biphasic_pulse_conversion() {
        let pulse = Waveform::new(vec![1.0, -1.0, 0.0], vec![0.1, 0.1, 0.488]).unwrap();
        let device = pulse.to_device(ElectricalMode::Current).unwrap();

        assert_eq!(device.amplitudes, vec![1_000_000, -1_000_000, 0]);
        assert_eq!(device.durations_us, vec![100, 100, 488]);
        assert_eq!(device.mode, ElectricalMode::Current);
    }

    #[test]
    fn test_voltage_conversion_uses_microvolts() {
        let pulse = Waveform::new(vec![500.0, -500.0], vec![1.0, 1.0]).unwrap();
        let device = pulse.to_device(ElectricalMode::Voltage).unwrap();
        assert_eq!(device.amplitudes, vec![500_000, -500_000]);
        assert_eq!(device.durations_us, vec![1_000, 1_000]);
    }

    #[test]
    fn test_amplitude_beyond_sample_range() {
        // 3000 mA is 3e9 nA, more than i32 can carry
        let pulse = Waveform::new(vec![3_000.0], vec![0.1]).unwrap();
        assert!(pulse.to_device(ElectricalMode::Current).unwrap_err().is_validation());
    }

    #[test]
    fn test_from_segments() {
        let pulse = Waveform::from_segments([(1.0, 0.2), (0.0, 0.8)]).unwrap();
        assert_eq!(pulse.amplitudes(), &[1.0, 0.0]);
        assert_eq!(pulse.durations_ms(), &[0.2, 0.8]);
        assert!((pulse.total_duration_ms() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_waveform_allowed() {
        let empty = Waveform::new(vec![], vec![]).unwrap();
        assert!(empty.is_empty());
        assert!(empty.to_device(ElectricalMode::Current).unwrap().amplitudes.is_empty());
    }
}
