//! Round-robin allocation.
//!
//! Serves eligible UEs in ascending RNTI order from a rotating pointer.
//! Downlink gives each UE enough RBGs to cover its whole queue at the
//! current MCS before moving on; uplink splits the band into equal
//! contiguous shares. Separate pointers keep the two directions fair
//! independently.

use crate::models::ResourceMap;
use crate::Rnti;

use super::{
    rotate_from, successor_of, AllocationStrategy, DlDataRequest, StrategyContext, UlGrantRequest,
};

/// The round-robin strategy. Cross-TTI state is just the two pointers.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next_rnti_dl: Option<Rnti>,
    next_rnti_ul: Option<Rnti>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AllocationStrategy for RoundRobin {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn allocate_downlink(
        &mut self,
        ctx: &StrategyContext<'_>,
        map: &mut ResourceMap,
    ) -> Vec<DlDataRequest> {
        let eligible = ctx.dl_eligible();
        if eligible.is_empty() {
            return Vec::new();
        }

        let mut requests = Vec::new();
        let mut last_served = None;
        for rnti in rotate_from(&eligible, self.next_rnti_dl) {
            if map.free_count() == 0 {
                break;
            }
            let Some(ue) = ctx.ues.get(&rnti) else {
                continue;
            };
            let Some(mcs) = ctx.dl_mcs(ue) else {
                continue;
            };
            let bytes_per_rbg = ctx.dl_bytes_per_rbg(ue, mcs);
            if bytes_per_rbg == 0 {
                continue;
            }
            let needed = ue.dl_queued_bytes().div_ceil(bytes_per_rbg) as usize;

            let mut taken = Vec::new();
            let mut cursor = 0;
            while taken.len() < needed {
                let Some(i) = map.next_free(cursor) else {
                    break;
                };
                if map.assign(i, rnti).is_ok() {
                    taken.push(i);
                }
                cursor = i + 1;
            }
            if !taken.is_empty() {
                requests.push(DlDataRequest {
                    rnti,
                    rbg_indices: taken,
                    mcs,
                });
                last_served = Some(rnti);
            }
        }

        if let Some(last) = last_served {
            self.next_rnti_dl = successor_of(&eligible, last);
        }
        requests
    }

    fn allocate_uplink(
        &mut self,
        ctx: &StrategyContext<'_>,
        map: &mut ResourceMap,
    ) -> Vec<UlGrantRequest> {
        let eligible = ctx.ul_eligible();
        if eligible.is_empty() {
            return Vec::new();
        }
        let share = (map.free_count() / eligible.len()).max(1);

        let mut requests = Vec::new();
        let mut last_served = None;
        for rnti in rotate_from(&eligible, self.next_rnti_ul) {
            let rb_len = share.min(map.free_count());
            if rb_len == 0 {
                break;
            }
            let Some(rb_start) = map.first_free_run(rb_len) else {
                break;
            };
            let Some(ue) = ctx.ues.get(&rnti) else {
                continue;
            };
            let Some(mcs) = ctx.ul_mcs(ue, rb_start, rb_len) else {
                continue;
            };
            for i in rb_start..rb_start + rb_len {
                // The run was free; a conflict here is unreachable
                let _ = map.assign(i, rnti);
            }
            requests.push(UlGrantRequest {
                rnti,
                rb_start,
                rb_len,
                mcs,
            });
            last_served = Some(rnti);
        }

        if let Some(last) = last_served {
            self.next_rnti_ul = successor_of(&eligible, last);
        }
        requests
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::amc::AmcTables;
    use crate::config::SchedulerConfig;
    use crate::models::{
        BufferStatus, DlCqiRecord, LogicalChannelContext, QosProfile, UeCapabilities, UeContext,
    };

    fn ue_with_dl_queue(rnti: Rnti, bytes: u32) -> UeContext {
        let mut ue = UeContext::new(rnti, UeCapabilities::default(), 8, 3);
        let mut ch = LogicalChannelContext::new(3, QosProfile::best_effort());
        ch.buffer = BufferStatus {
            tx_queue_bytes: bytes,
            ..Default::default()
        };
        ue.channels.insert(3, ch);
        ue.dl_cqi = Some(DlCqiRecord::wideband(15));
        ue
    }

    fn ctx<'a>(
        ues: &'a BTreeMap<Rnti, UeContext>,
        amc: &'a AmcTables,
        config: &'a SchedulerConfig,
    ) -> StrategyContext<'a> {
        StrategyContext {
            ues,
            amc,
            config,
            rbg_size_prb: 1,
        }
    }

    #[test]
    fn test_queue_covered_before_moving_on() {
        // Two UEs, six RBGs of 200 bytes each. The 1000-byte queue takes
        // five; the second UE gets the remaining one.
        let amc = AmcTables::flat_rate(200);
        let config = SchedulerConfig::default();
        let mut ues = BTreeMap::new();
        ues.insert(1, ue_with_dl_queue(1, 1000));
        ues.insert(2, ue_with_dl_queue(2, 1000));

        let mut rr = RoundRobin::new();
        let mut map = ResourceMap::new(6);
        let reqs = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);

        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].rnti, 1);
        assert_eq!(reqs[0].rbg_indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(reqs[1].rnti, 2);
        assert_eq!(reqs[1].rbg_indices, vec![5]);
        assert_eq!(map.free_count(), 0);
    }

    #[test]
    fn test_pointer_rotates_across_ttis() {
        let amc = AmcTables::flat_rate(200);
        let config = SchedulerConfig::default();
        let mut ues = BTreeMap::new();
        for rnti in [1, 2, 3] {
            ues.insert(rnti, ue_with_dl_queue(rnti, 10_000));
        }

        let mut rr = RoundRobin::new();
        let mut map = ResourceMap::new(4);
        let first = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].rnti, 1);

        // UE 1 exhausted the grid, so the next TTI starts at UE 2
        let mut map = ResourceMap::new(4);
        let second = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(second[0].rnti, 2);

        let mut map = ResourceMap::new(4);
        let third = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(third[0].rnti, 3);

        // And wraps
        let mut map = ResourceMap::new(4);
        let fourth = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(fourth[0].rnti, 1);
    }

    #[test]
    fn test_fairness_over_window() {
        // Equal backlogged queues, grid smaller than the UE count. Over
        // n TTIs each of the n UEs is served the same number of times.
        let amc = AmcTables::flat_rate(200);
        let config = SchedulerConfig::default();
        let mut ues = BTreeMap::new();
        for rnti in 1..=5 {
            ues.insert(rnti, ue_with_dl_queue(rnti, 100_000));
        }

        let mut rr = RoundRobin::new();
        let mut served: BTreeMap<Rnti, u32> = BTreeMap::new();
        for _ in 0..5 {
            let mut map = ResourceMap::new(3);
            for req in rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map) {
                *served.entry(req.rnti).or_default() += req.rbg_indices.len() as u32;
            }
        }
        // 15 RBGs over 5 UEs
        for rnti in 1..=5 {
            assert_eq!(served[&rnti], 3, "ue {rnti} under- or over-served");
        }
    }

    #[test]
    fn test_skips_reserved_slots() {
        let amc = AmcTables::flat_rate(200);
        let config = SchedulerConfig::default();
        let mut ues = BTreeMap::new();
        ues.insert(7, ue_with_dl_queue(7, 400));

        let mut rr = RoundRobin::new();
        let mut map = ResourceMap::new(4);
        map.reserve(0, crate::models::ReservedFor::Broadcast).unwrap();
        map.reserve(2, crate::models::ReservedFor::Paging).unwrap();
        let reqs = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(reqs[0].rbg_indices, vec![1, 3]);
    }

    #[test]
    fn test_out_of_range_ue_not_scheduled() {
        let amc = AmcTables::flat_rate(200);
        let config = SchedulerConfig::default();
        let mut ues = BTreeMap::new();
        let mut bad = ue_with_dl_queue(1, 500);
        bad.dl_cqi = Some(DlCqiRecord::wideband(0));
        ues.insert(1, bad);
        ues.insert(2, ue_with_dl_queue(2, 500));

        let mut rr = RoundRobin::new();
        let mut map = ResourceMap::new(6);
        let reqs = rr.allocate_downlink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].rnti, 2);
    }

    #[test]
    fn test_ul_equal_split() {
        let amc = AmcTables::flat_rate(50);
        let config = SchedulerConfig::default();
        let mut ues = BTreeMap::new();
        for rnti in [1, 2, 3] {
            let mut ue = UeContext::new(rnti, UeCapabilities::default(), 8, 3);
            ue.ul_buffer_bytes = 900;
            ues.insert(rnti, ue);
        }

        let mut rr = RoundRobin::new();
        let mut map = ResourceMap::new(12);
        let grants = rr.allocate_uplink(&ctx(&ues, &amc, &config), &mut map);
        assert_eq!(grants.len(), 3);
        for (i, grant) in grants.iter().enumerate() {
            assert_eq!(grant.rb_len, 4);
            assert_eq!(grant.rb_start, i * 4);
        }
        // Contiguity: each grant is one unbroken run
        assert_eq!(map.free_count(), 0);
    }
}
