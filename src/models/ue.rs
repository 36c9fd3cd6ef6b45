//! Per-UE scheduler state.
//!
//! `UeContext` is the unit of ownership inside the scheduler: created
//! atomically when the RRC configures a UE, destroyed atomically on
//! release. It aggregates capabilities, logical channels, channel-quality
//! history, HARQ tables, and the uplink buffer estimate from buffer-status
//! reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::channel::LogicalChannelContext;
use super::cqi::{DlCqiRecord, UlCqiRecord};
use super::harq::HarqProcessTable;
use crate::{Lcid, Rnti};

/// Layer count per transmission mode. Modes 3..=5 are the spatial
/// multiplexing / MU-MIMO modes carrying two codewords; mode 7 style
/// beamforming is single layer.
const TX_MODE_LAYERS: [u8; 7] = [1, 1, 2, 2, 2, 2, 1];

/// Static UE capabilities established by (re)configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeCapabilities {
    /// Transmission mode (0..=6). Must map to a valid layer count.
    pub transmission_mode: u8,
    /// Antenna ports at the UE.
    pub antenna_ports: u8,
    /// Measurement-gap repetition period in TTIs, if configured.
    pub meas_gap_period_ttis: Option<u16>,
    /// Discontinuous-reception cycle in TTIs, if configured.
    pub drx_cycle_ttis: Option<u16>,
    /// Aggregate maximum downlink bit rate (bit/s).
    pub ambr_dl_bps: u64,
    /// Aggregate maximum uplink bit rate (bit/s).
    pub ambr_ul_bps: u64,
}

impl Default for UeCapabilities {
    fn default() -> Self {
        Self {
            transmission_mode: 0,
            antenna_ports: 1,
            meas_gap_period_ttis: None,
            drx_cycle_ttis: None,
            ambr_dl_bps: u64::MAX,
            ambr_ul_bps: u64::MAX,
        }
    }
}

impl UeCapabilities {
    /// Capabilities for a given transmission mode.
    pub fn with_transmission_mode(mut self, mode: u8) -> Self {
        self.transmission_mode = mode;
        self
    }

    /// Spatial layers implied by the transmission mode, `None` when the
    /// mode is outside the supported range (an invalid capability
    /// combination, rejected at configuration time).
    pub fn layer_count(&self) -> Option<u8> {
        TX_MODE_LAYERS.get(self.transmission_mode as usize).copied()
    }
}

/// All scheduler-owned state for one attached UE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeContext {
    /// Radio network temporary identifier, the scheduling key.
    pub rnti: Rnti,
    /// Static capabilities.
    pub capabilities: UeCapabilities,
    /// Logical channels keyed by LCID.
    pub channels: BTreeMap<Lcid, LogicalChannelContext>,
    /// Latest downlink CQI feedback.
    pub dl_cqi: Option<DlCqiRecord>,
    /// Latest uplink SINR estimate.
    pub ul_cqi: Option<UlCqiRecord>,
    /// Downlink HARQ process table.
    pub dl_harq: HarqProcessTable,
    /// Uplink buffer estimate from the last buffer-status report (bytes).
    pub ul_buffer_bytes: u32,
    /// Pending scheduling request: the UE has no grant and wants one.
    pub scheduling_request: bool,
}

impl UeContext {
    /// Creates a fresh UE entry.
    pub fn new(
        rnti: Rnti,
        capabilities: UeCapabilities,
        harq_process_count: u8,
        max_harq_retx: u8,
    ) -> Self {
        Self {
            rnti,
            capabilities,
            channels: BTreeMap::new(),
            dl_cqi: None,
            ul_cqi: None,
            dl_harq: HarqProcessTable::new(harq_process_count, max_harq_retx),
            ul_buffer_bytes: 0,
            scheduling_request: false,
        }
    }

    /// Total downlink bytes queued across all logical channels.
    pub fn dl_queued_bytes(&self) -> u32 {
        self.channels.values().map(|c| c.buffer.total_bytes()).sum()
    }

    /// Downlink bytes queued on GBR channels only.
    pub fn gbr_queued_bytes(&self) -> u32 {
        self.channels
            .values()
            .filter(|c| c.qos.is_gbr)
            .map(|c| c.buffer.total_bytes())
            .sum()
    }

    /// Total per-TTI byte reservation owed to GBR channels with data.
    pub fn gbr_bytes_per_tti(&self) -> u32 {
        self.channels
            .values()
            .filter(|c| c.qos.is_gbr && !c.buffer.is_empty())
            .map(|c| c.qos.gbr_bytes_per_tti())
            .sum()
    }

    /// Logical channels with a non-empty queue, in LCID order.
    pub fn active_channels(&self) -> Vec<Lcid> {
        self.channels
            .values()
            .filter(|c| !c.buffer.is_empty())
            .map(|c| c.lcid)
            .collect()
    }

    /// Whether any downlink data is queued.
    pub fn has_dl_data(&self) -> bool {
        self.channels.values().any(|c| !c.buffer.is_empty())
    }

    /// Whether the UE needs an uplink grant.
    pub fn needs_ul_grant(&self) -> bool {
        self.ul_buffer_bytes > 0 || self.scheduling_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::channel::QosProfile;
    use crate::models::BufferStatus;

    fn ue_with_channels() -> UeContext {
        let mut ue = UeContext::new(1, UeCapabilities::default(), 8, 3);
        let mut gbr = LogicalChannelContext::new(1, QosProfile::gbr(800_000));
        gbr.buffer = BufferStatus {
            tx_queue_bytes: 300,
            ..Default::default()
        };
        let mut be = LogicalChannelContext::new(2, QosProfile::best_effort());
        be.buffer = BufferStatus {
            tx_queue_bytes: 500,
            ..Default::default()
        };
        ue.channels.insert(1, gbr);
        ue.channels.insert(2, be);
        ue
    }

    #[test]
    fn test_layer_count_mapping() {
        assert_eq!(UeCapabilities::default().layer_count(), Some(1));
        let mimo = UeCapabilities::default().with_transmission_mode(3);
        assert_eq!(mimo.layer_count(), Some(2));
        let invalid = UeCapabilities::default().with_transmission_mode(9);
        assert_eq!(invalid.layer_count(), None);
    }

    #[test]
    fn test_queue_aggregation() {
        let ue = ue_with_channels();
        assert_eq!(ue.dl_queued_bytes(), 800);
        assert_eq!(ue.gbr_queued_bytes(), 300);
        // 800 kbit/s = 100 bytes per TTI
        assert_eq!(ue.gbr_bytes_per_tti(), 100);
        assert_eq!(ue.active_channels(), vec![1, 2]);
        assert!(ue.has_dl_data());
    }

    #[test]
    fn test_empty_gbr_channel_reserves_nothing() {
        let mut ue = ue_with_channels();
        ue.channels.get_mut(&1).unwrap().buffer = BufferStatus::default();
        assert_eq!(ue.gbr_bytes_per_tti(), 0);
        assert_eq!(ue.active_channels(), vec![2]);
    }

    #[test]
    fn test_ul_grant_need() {
        let mut ue = UeContext::new(5, UeCapabilities::default(), 8, 3);
        assert!(!ue.needs_ul_grant());
        ue.scheduling_request = true;
        assert!(ue.needs_ul_grant());
        ue.scheduling_request = false;
        ue.ul_buffer_bytes = 42;
        assert!(ue.needs_ul_grant());
    }
}
