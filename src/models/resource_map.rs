//! Per-TTI resource grid.
//!
//! One `ResourceMap` is built for each trigger call and thrown away with
//! the emitted indication. Slots are resource-block groups on the downlink
//! and single resource blocks on the uplink; either way the invariant is
//! the same: a slot belongs to at most one owner per TTI, and signaling
//! reservations (broadcast, RAR, paging) are placed before data
//! allocation runs.

use serde::{Deserialize, Serialize};

use crate::Rnti;

/// Non-data purpose a slot can be reserved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservedFor {
    /// Control signaling region.
    Control,
    /// Random-access response.
    RandomAccessResponse,
    /// Paging message.
    Paging,
    /// System/master information broadcast.
    Broadcast,
}

/// Occupancy of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotUse {
    /// Reserved for signaling before data allocation.
    Reserved(ReservedFor),
    /// Carrying data for a UE.
    Data(Rnti),
}

/// Attempted double allocation of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotConflict {
    /// Index of the already-occupied slot.
    pub index: usize,
}

/// The per-TTI occupancy grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMap {
    slots: Vec<Option<SlotUse>>,
}

impl ResourceMap {
    /// Creates a grid of `len` free slots.
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Total slot count.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the grid has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of unoccupied slots.
    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Occupancy of one slot.
    pub fn slot(&self, index: usize) -> Option<SlotUse> {
        self.slots.get(index).copied().flatten()
    }

    /// Reserves a slot for signaling. Fails if the slot is occupied.
    pub fn reserve(&mut self, index: usize, purpose: ReservedFor) -> Result<(), SlotConflict> {
        self.occupy(index, SlotUse::Reserved(purpose))
    }

    /// Assigns a slot to a UE's data. Fails if the slot is occupied.
    pub fn assign(&mut self, index: usize, rnti: Rnti) -> Result<(), SlotConflict> {
        self.occupy(index, SlotUse::Data(rnti))
    }

    fn occupy(&mut self, index: usize, usage: SlotUse) -> Result<(), SlotConflict> {
        match self.slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(usage);
                Ok(())
            }
            _ => Err(SlotConflict { index }),
        }
    }

    /// First free slot at or after `from`.
    pub fn next_free(&self, from: usize) -> Option<usize> {
        (from..self.slots.len()).find(|&i| self.slots[i].is_none())
    }

    /// First run of `len` contiguous free slots, for single-carrier uplink
    /// grants.
    pub fn first_free_run(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let mut run_start = None;
        let mut run_len = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_none() {
                if run_start.is_none() {
                    run_start = Some(i);
                }
                run_len += 1;
                if run_len == len {
                    return run_start;
                }
            } else {
                run_start = None;
                run_len = 0;
            }
        }
        None
    }

    /// Bitmap of the slots carrying data for `rnti`.
    pub fn data_mask(&self, rnti: Rnti) -> u32 {
        let mut mask = 0u32;
        for (i, slot) in self.slots.iter().enumerate() {
            if *slot == Some(SlotUse::Data(rnti)) && i < 32 {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// Indices of the slots carrying data for `rnti`.
    pub fn data_slots(&self, rnti: Rnti) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Some(SlotUse::Data(rnti)))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_double_allocation() {
        let mut map = ResourceMap::new(4);
        assert!(map.assign(0, 10).is_ok());
        assert_eq!(map.assign(0, 11), Err(SlotConflict { index: 0 }));
        assert_eq!(
            map.reserve(0, ReservedFor::Paging),
            Err(SlotConflict { index: 0 })
        );
        // Out of range is a conflict too
        assert!(map.assign(9, 10).is_err());
        assert_eq!(map.free_count(), 3);
    }

    #[test]
    fn test_reservation_precedes_data() {
        let mut map = ResourceMap::new(3);
        map.reserve(0, ReservedFor::Broadcast).unwrap();
        assert_eq!(map.next_free(0), Some(1));
        assert!(map.assign(0, 5).is_err());
        assert_eq!(map.slot(0), Some(SlotUse::Reserved(ReservedFor::Broadcast)));
    }

    #[test]
    fn test_data_mask_and_slots() {
        let mut map = ResourceMap::new(6);
        map.assign(1, 7).unwrap();
        map.assign(4, 7).unwrap();
        map.assign(2, 9).unwrap();
        assert_eq!(map.data_mask(7), 0b010010);
        assert_eq!(map.data_slots(7), vec![1, 4]);
        assert_eq!(map.data_slots(9), vec![2]);
    }

    #[test]
    fn test_first_free_run() {
        let mut map = ResourceMap::new(8);
        map.assign(2, 1).unwrap();
        map.assign(5, 1).unwrap();
        // Runs: [0,1], [3,4], [6,7]
        assert_eq!(map.first_free_run(2), Some(0));
        assert_eq!(map.first_free_run(3), None);
        map.assign(0, 2).unwrap();
        assert_eq!(map.first_free_run(2), Some(3));
        assert_eq!(map.first_free_run(0), None);
    }
}
