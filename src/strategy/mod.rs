//! Pluggable allocation strategies.
//!
//! The orchestrator prepares the per-TTI snapshot (`StrategyContext`) and
//! the resource grid, handles signaling reservations and HARQ
//! retransmissions, then hands the remaining free resources to the bound
//! `AllocationStrategy`. Strategies decide only who gets which free
//! resources at which MCS; DCI assembly, HARQ bookkeeping, and buffer
//! decrements stay in the orchestrator.
//!
//! Built-in strategies: `RoundRobin` and `ProportionalFair`, selected by
//! identifier through `StrategyRegistry`.

mod proportional_fair;
mod registry;
mod round_robin;

pub use proportional_fair::{FlowPerformance, ProportionalFair};
pub use registry::StrategyRegistry;
pub use round_robin::RoundRobin;

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::amc::AmcTables;
use crate::config::SchedulerConfig;
use crate::models::{ResourceMap, UeContext};
use crate::Rnti;

/// Read-only snapshot handed to a strategy at trigger time.
///
/// All reports received before the trigger are already merged into the
/// UE table, so a strategy reads one consistent view of the TTI.
pub struct StrategyContext<'a> {
    /// Attached UEs, keyed by RNTI. `BTreeMap` iteration order doubles as
    /// the lower-RNTI-first tie-break.
    pub ues: &'a BTreeMap<Rnti, UeContext>,
    /// CQI/MCS/TBS tables.
    pub amc: &'a AmcTables,
    /// Tunable scheduler constants.
    pub config: &'a SchedulerConfig,
    /// PRBs per downlink resource-block group.
    pub rbg_size_prb: u8,
}

impl<'a> StrategyContext<'a> {
    /// Effective wideband downlink CQI: fresh report value, or the
    /// configured fallback when the report is stale or absent.
    ///
    /// Returns `None` when the UE reported CQI 0 (out of range).
    pub fn effective_dl_cqi(&self, ue: &UeContext) -> Option<u8> {
        let cqi = match &ue.dl_cqi {
            Some(rec) => {
                rec.effective_wideband(self.config.cqi_validity_ttis, self.config.fallback_cqi)
            }
            None => self.config.fallback_cqi,
        };
        if cqi == 0 {
            None
        } else {
            Some(cqi)
        }
    }

    /// Effective downlink CQI for one RBG (subband detail when fresh).
    pub fn effective_dl_cqi_for_rbg(&self, ue: &UeContext, rbg: usize) -> Option<u8> {
        let cqi = match &ue.dl_cqi {
            Some(rec) => {
                rec.effective_for_rbg(rbg, self.config.cqi_validity_ttis, self.config.fallback_cqi)
            }
            None => self.config.fallback_cqi,
        };
        if cqi == 0 {
            None
        } else {
            Some(cqi)
        }
    }

    /// Downlink MCS from the effective wideband CQI.
    pub fn dl_mcs(&self, ue: &UeContext) -> Option<u8> {
        self.effective_dl_cqi(ue).and_then(|c| self.amc.mcs_from_cqi(c))
    }

    /// Transport-block bytes one RBG carries at `mcs`, across all of the
    /// UE's spatial layers.
    pub fn dl_bytes_per_rbg(&self, ue: &UeContext, mcs: u8) -> u32 {
        let layers = u32::from(ue.capabilities.layer_count().unwrap_or(1));
        self.amc.tb_size_bytes(mcs, u32::from(self.rbg_size_prb)) * layers
    }

    /// UEs eligible for new downlink data this TTI: queued data, a free
    /// HARQ process, and a channel that is not out of range. Ascending
    /// RNTI order.
    pub fn dl_eligible(&self) -> Vec<Rnti> {
        self.ues
            .values()
            .filter(|ue| {
                ue.has_dl_data() && !ue.dl_harq.is_full() && self.effective_dl_cqi(ue).is_some()
            })
            .map(|ue| ue.rnti)
            .collect()
    }

    /// UEs needing an uplink grant this TTI, ascending RNTI order.
    pub fn ul_eligible(&self) -> Vec<Rnti> {
        self.ues
            .values()
            .filter(|ue| ue.needs_ul_grant())
            .map(|ue| ue.rnti)
            .collect()
    }

    /// Uplink MCS for a prospective grant, from the worst SINR across the
    /// granted RBs. Falls back to the configured conservative CQI when no
    /// fresh measurement exists; `None` when the channel is out of range.
    pub fn ul_mcs(&self, ue: &UeContext, rb_start: usize, rb_len: usize) -> Option<u8> {
        let cqi = match &ue.ul_cqi {
            Some(rec) if !rec.is_stale(self.config.cqi_validity_ttis) => rec
                .min_sinr_db(rb_start, rb_len)
                .map(|sinr| self.amc.cqi_from_sinr_db(sinr))
                .unwrap_or(self.config.fallback_cqi),
            _ => self.config.fallback_cqi,
        };
        if cqi == 0 {
            return None;
        }
        self.amc.mcs_from_cqi(cqi)
    }
}

/// A strategy's downlink pick: free RBGs it claimed for one UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlDataRequest {
    /// Served UE.
    pub rnti: Rnti,
    /// Claimed RBG indices, already marked in the resource map.
    pub rbg_indices: Vec<usize>,
    /// Selected MCS (applied to every spatial layer).
    pub mcs: u8,
}

/// A strategy's uplink pick: a contiguous RB run for one UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlGrantRequest {
    /// Served UE.
    pub rnti: Rnti,
    /// First claimed RB.
    pub rb_start: usize,
    /// Claimed RB count.
    pub rb_len: usize,
    /// Selected MCS.
    pub mcs: u8,
}

/// A per-TTI allocation decision algorithm.
///
/// Implementations own whatever cross-TTI state they need (round-robin
/// pointers, throughput averages) and must be deterministic: identical
/// snapshots and internal state produce identical picks.
pub trait AllocationStrategy: Send + Debug {
    /// Strategy identifier (e.g. "round-robin").
    fn name(&self) -> &'static str;

    /// Claims free downlink RBGs for new-data transmissions.
    ///
    /// `map` already contains the TTI's signaling reservations and HARQ
    /// retransmissions; the strategy must only claim free slots.
    fn allocate_downlink(
        &mut self,
        ctx: &StrategyContext<'_>,
        map: &mut ResourceMap,
    ) -> Vec<DlDataRequest>;

    /// Claims free uplink RBs as contiguous single-carrier grants.
    fn allocate_uplink(
        &mut self,
        ctx: &StrategyContext<'_>,
        map: &mut ResourceMap,
    ) -> Vec<UlGrantRequest>;
}

/// Rotates an ascending RNTI list so it starts at `pointer` (or the first
/// entry above it, wrapping). The rotating-pointer idiom shared by both
/// built-in strategies.
pub(crate) fn rotate_from(eligible: &[Rnti], pointer: Option<Rnti>) -> Vec<Rnti> {
    let Some(p) = pointer else {
        return eligible.to_vec();
    };
    let split = eligible.iter().position(|&r| r >= p).unwrap_or(0);
    let mut out = Vec::with_capacity(eligible.len());
    out.extend_from_slice(&eligible[split..]);
    out.extend_from_slice(&eligible[..split]);
    out
}

/// The eligible RNTI immediately after `last` in ascending order,
/// wrapping to the first. The next round starts here.
pub(crate) fn successor_of(eligible: &[Rnti], last: Rnti) -> Option<Rnti> {
    if eligible.is_empty() {
        return None;
    }
    eligible
        .iter()
        .find(|&&r| r > last)
        .or_else(|| eligible.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_from() {
        let list = [2, 5, 9];
        assert_eq!(rotate_from(&list, None), vec![2, 5, 9]);
        assert_eq!(rotate_from(&list, Some(5)), vec![5, 9, 2]);
        // Pointer between entries starts at the next one up
        assert_eq!(rotate_from(&list, Some(6)), vec![9, 2, 5]);
        // Pointer past the end wraps
        assert_eq!(rotate_from(&list, Some(10)), vec![2, 5, 9]);
    }

    #[test]
    fn test_successor_of() {
        let list = [2, 5, 9];
        assert_eq!(successor_of(&list, 2), Some(5));
        assert_eq!(successor_of(&list, 9), Some(2));
        // A released RNTI between entries still finds its successor
        assert_eq!(successor_of(&list, 4), Some(5));
        assert_eq!(successor_of(&[], 1), None);
    }
}
