use log::{debug, warn};
use std::time::Duration;

use super::Stg;
use crate::device::StgInterface;
use crate::error::StgError;
use crate::journal::Command;
use crate::trigger::{all_indices, to_bitmask};
use crate::types::TriggerIndex;

impl<D: StgInterface> Stg<D> {
    /// Start the given trigger inputs, or all of them for an empty slice.
    ///
    /// Triggers map to channels through the trigger map. After construction,
    /// or after [`Stg::diagonalize_triggermap`], trigger `i` fires channel `i`.
    /// All named triggers go out in a single command, so they start together.
    ///
    /// Electrical modes are left alone; download waveforms first.
    ///
    /// # Examples
    /// ```
    /// use rusty_stg::{SimulatedStg, Stg};
    ///
    /// let sim = SimulatedStg::default();
    /// let mut stg = Stg::new(sim.clone(), None)?;
    /// stg.start_stimulation(&[0, 1])?;
    /// assert_eq!(sim.running_mask(), 0b11);
    /// stg.stop_stimulation(&[])?;
    /// assert_eq!(sim.running_mask(), 0);
    /// # Ok::<(), rusty_stg::StgError>(())
    /// ```
    pub fn start_stimulation(&mut self, triggers: &[TriggerIndex]) -> Result<(), StgError> {
        let mask = self.trigger_mask(triggers)?;
        self.record(Command::Start { trigger_mask: mask })?;

        debug!("Starting triggers {mask:#b}");
        self.session()?
            .send_start(mask)
            .inspect_err(|e| warn!("Start of triggers {mask:#b} failed: {e}"))
    }

    /// Stop the given trigger inputs, or all of them for an empty slice
    pub fn stop_stimulation(&mut self, triggers: &[TriggerIndex]) -> Result<(), StgError> {
        let mask = self.trigger_mask(triggers)?;
        self.record(Command::Stop { trigger_mask: mask })?;

        debug!("Stopping triggers {mask:#b}");
        self.session()?
            .send_stop(mask)
            .inspect_err(|e| warn!("Stop of triggers {mask:#b} failed: {e}"))
    }

    /// Block the calling thread, e.g. between stimulation bursts
    pub fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn trigger_mask(&mut self, triggers: &[TriggerIndex]) -> Result<u32, StgError> {
        if triggers.is_empty() {
            let all = all_indices(self.channel_count()?);
            to_bitmask(&all)
        } else {
            to_bitmask(triggers)
        }
    }
}
