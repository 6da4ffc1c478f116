//! Trigger-to-channel routing.
//!
//! Every trigger input carries a channel mask (which outputs it fires), a
//! sync-out mask (which sync lines follow it) and a repeat count. The
//! canonical layout is the diagonal one:
//!
//! | Trigger | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 |
//! |---------|---|---|---|---|---|---|---|---|
//! | Channel | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 |

use log::debug;
use serde::{Deserialize, Serialize};

use crate::device::StgInterface;
use crate::error::StgError;
use crate::types::TriggerIndex;

/// Highest index representable in the device's 32-bit trigger/channel masks
pub const MAX_MASK_BITS: u32 = u32::BITS;

/// Routing of a single trigger input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEntry {
    pub channel_mask: u32,
    pub syncout_mask: u32,
    pub repeat_count: u32,
}

/// Routing table for consecutive trigger inputs, starting at trigger 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMap {
    channel_masks: Vec<u32>,
    syncout_masks: Vec<u32>,
    repeat_counts: Vec<u32>,
}

impl TriggerMap {
    /// Trigger `i` drives channel `i` and sync-out `i`, once.
    ///
    /// ```
    /// use rusty_stg::TriggerMap;
    ///
    /// let map = TriggerMap::diagonalize(4)?;
    /// assert_eq!(map.channel_masks(), &[1, 2, 4, 8]);
    /// assert_eq!(map.repeat_counts(), &[1, 1, 1, 1]);
    /// # Ok::<(), rusty_stg::StgError>(())
    /// ```
    pub fn diagonalize(channel_count: u32) -> Result<Self, StgError> {
        if channel_count > MAX_MASK_BITS {
            return Err(StgError::Validation(format!(
                "Cannot map {channel_count} channels into a {MAX_MASK_BITS}-bit mask"
            )));
        }

        Ok((0..channel_count)
            .map(|i| TriggerEntry {
                channel_mask: 1 << i,
                syncout_mask: 1 << i,
                repeat_count: 1,
            })
            .collect())
    }

    /// Rebuild a map from the three parallel arrays the device uses
    pub fn from_parts(
        channel_masks: Vec<u32>,
        syncout_masks: Vec<u32>,
        repeat_counts: Vec<u32>,
    ) -> Result<Self, StgError> {
        if channel_masks.len() != syncout_masks.len()
            || channel_masks.len() != repeat_counts.len()
        {
            return Err(StgError::Validation(format!(
                "Trigger map arrays differ in length: {} channel masks, {} sync-out masks, {} repeat counts",
                channel_masks.len(),
                syncout_masks.len(),
                repeat_counts.len()
            )));
        }

        Ok(Self {
            channel_masks,
            syncout_masks,
            repeat_counts,
        })
    }

    pub fn len(&self) -> usize {
        self.channel_masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel_masks.is_empty()
    }

    pub fn channel_masks(&self) -> &[u32] {
        &self.channel_masks
    }

    pub fn syncout_masks(&self) -> &[u32] {
        &self.syncout_masks
    }

    pub fn repeat_counts(&self) -> &[u32] {
        &self.repeat_counts
    }

    pub fn entry(&self, trigger: TriggerIndex) -> Option<TriggerEntry> {
        let i = trigger as usize;
        Some(TriggerEntry {
            channel_mask: *self.channel_masks.get(i)?,
            syncout_mask: *self.syncout_masks.get(i)?,
            repeat_count: *self.repeat_counts.get(i)?,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = TriggerEntry> + '_ {
        self.channel_masks
            .iter()
            .zip(&self.syncout_masks)
            .zip(&self.repeat_counts)
            .map(|((&channel_mask, &syncout_mask), &repeat_count)| TriggerEntry {
                channel_mask,
                syncout_mask,
                repeat_count,
            })
    }

    /// True if every trigger fires exactly its own channel once
    pub fn is_diagonal(&self) -> bool {
        self.entries().enumerate().all(|(i, entry)| {
            let own = 1u32.checked_shl(i as u32);
            own == Some(entry.channel_mask)
                && own == Some(entry.syncout_mask)
                && entry.repeat_count == 1
        })
    }

    /// Write this map to the device, starting at trigger 0.
    ///
    /// The device must be inside an open [`crate::device::Session`].
    pub fn apply<D: StgInterface + ?Sized>(&self, device: &mut D) -> Result<(), StgError> {
        debug!(
            "Setting up {} triggers: channels {:?}, sync-out {:?}, repeat {:?}",
            self.len(),
            self.channel_masks,
            self.syncout_masks,
            self.repeat_counts
        );
        device.setup_trigger(
            0,
            &self.channel_masks,
            &self.syncout_masks,
            &self.repeat_counts,
        )
    }
}

impl FromIterator<TriggerEntry> for TriggerMap {
    fn from_iter<I: IntoIterator<Item = TriggerEntry>>(iter: I) -> Self {
        let mut map = TriggerMap::default();
        for entry in iter {
            map.channel_masks.push(entry.channel_mask);
            map.syncout_masks.push(entry.syncout_mask);
            map.repeat_counts.push(entry.repeat_count);
        }
        map
    }
}

/// Set bit `i` for every index `i`. Order and duplicates do not matter.
///
/// ```
/// use rusty_stg::trigger::to_bitmask;
///
/// assert_eq!(to_bitmask(&[0, 2, 5])?, 0b100101);
/// assert_eq!(to_bitmask(&[])?, 0);
/// # Ok::<(), rusty_stg::StgError>(())
/// ```
pub fn to_bitmask(indices: &[u32]) -> Result<u32, StgError> {
    indices.iter().try_fold(0u32, |mask, &index| {
        1u32.checked_shl(index)
            .map(|bit| mask | bit)
            .ok_or_else(|| {
                StgError::Validation(format!(
                    "Index {index} does not fit in a {MAX_MASK_BITS}-bit trigger mask"
                ))
            })
    })
}

/// `0..count`, the selection used when a caller names no channels
pub fn all_indices(count: u32) -> Vec<u32> {
    (0..count).collect()
}
