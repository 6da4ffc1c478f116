//! Conversions between physical units and the stimulator's integer units.
//!
//! The device takes current in nanoamps, voltage in microvolts and time in
//! microseconds. Converting once at the boundary keeps everything downstream
//! integral.

/// Fixed output time grid of the STG4000 series
pub const TIME_RESOLUTION_US: u64 = 20;

const NANOAMPS_PER_MILLIAMP: f64 = 1_000_000.0;
const MICROVOLTS_PER_MILLIVOLT: f64 = 1_000.0;
const MICROSECONDS_PER_MILLISECOND: f64 = 1_000.0;

/// Milliamps to device current units (nA), rounded to nearest. No clamping.
///
/// ```
/// use rusty_stg::units::to_device_amplitude;
///
/// assert_eq!(to_device_amplitude(1.0), 1_000_000);
/// assert_eq!(to_device_amplitude(-0.5), -500_000);
/// ```
pub fn to_device_amplitude(ma: f64) -> i64 {
    (ma * NANOAMPS_PER_MILLIAMP).round() as i64
}

/// Millivolts to device voltage units (µV), rounded to nearest. No clamping.
pub fn to_device_voltage(mv: f64) -> i64 {
    (mv * MICROVOLTS_PER_MILLIVOLT).round() as i64
}

/// Milliseconds to device time units (µs), rounded to nearest.
///
/// ```
/// use rusty_stg::units::to_device_duration;
///
/// assert_eq!(to_device_duration(0.488), 488);
/// ```
pub fn to_device_duration(ms: f64) -> i64 {
    (ms * MICROSECONDS_PER_MILLISECOND).round() as i64
}

/// Snap a duration onto the device's 20 µs output grid
pub fn quantize_duration_us(us: u64) -> u64 {
    (us.saturating_add(TIME_RESOLUTION_US / 2) / TIME_RESOLUTION_US) * TIME_RESOLUTION_US
}

pub fn na_to_ua(na: u32) -> f64 {
    na as f64 / 1_000.0
}

pub fn na_to_ma(na: u32) -> f64 {
    na as f64 / NANOAMPS_PER_MILLIAMP
}

pub fn uv_to_mv(uv: u32) -> f64 {
    uv as f64 / MICROVOLTS_PER_MILLIVOLT
}
