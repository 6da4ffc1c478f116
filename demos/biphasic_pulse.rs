//! Stage a biphasic pulse on two channels of a simulated STG4008 and fire it.
//!
//! Usage:
//!   cargo run --example biphasic_pulse
//!   cargo run --example biphasic_pulse -- path/to/stg.toml

use log::info;
use rusty_stg::{load_config_or_default, initialize_logging, ElectricalMode, Stg, Waveform};
use std::path::PathBuf;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config_or_default(config_path.as_deref());
    initialize_logging(&config.logging.log_level)?;

    let mut stg = Stg::simulated(&config)?;
    info!("Connected to {stg}");
    info!("{}", stg.version()?);
    info!(
        "Current range {} mA at {} µA resolution, time grid {} µs",
        stg.current_range_in_ma()?,
        stg.current_resolution_in_ua()?,
        stg.time_resolution_in_us()
    );

    // 100 µs cathodic-first biphasic pulse at 1 mA, padded to a 688 µs period
    let pulse = Waveform::new(vec![-1.0, 1.0, 0.0], vec![0.1, 0.1, 0.488])?;
    stg.download_to(&[0, 1], &pulse, ElectricalMode::Current)?;

    stg.start_stimulation(&[0, 1])?;
    stg.sleep(Duration::from_millis(500));
    stg.stop_stimulation(&[])?;

    let staged = stg.device().staged(0);
    info!("Channel 0 holds {staged:?}");
    Ok(())
}
