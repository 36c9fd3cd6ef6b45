//! Per-TTI allocation decisions.
//!
//! These are the records emitted on the scheduling port user side: one
//! `DlConfigIndication` and one `UlConfigIndication` per trigger call,
//! carrying the data DCIs, uplink grants, and the mandatory signaling
//! allocations (broadcast, paging, random-access responses, PHICH).
//! Empty indications are valid outputs: "nothing scheduled this TTI" is
//! observable, never suppressed.

use serde::{Deserialize, Serialize};

use super::vendor::VendorExtensions;
use crate::{Lcid, Rnti, SfnSf};

/// One downlink data DCI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlAllocation {
    /// Addressed UE.
    pub rnti: Rnti,
    /// Allocation type 0 RBG bitmap.
    pub rbg_mask: u32,
    /// MCS per spatial layer.
    pub mcs: Vec<u8>,
    /// Transport-block size in bytes per spatial layer.
    pub tb_size_bytes: Vec<u32>,
    /// New-data indicator per layer (`false` = HARQ retransmission).
    pub new_data: Vec<bool>,
    /// Redundancy version per layer.
    pub redundancy_version: Vec<u8>,
    /// HARQ process carrying this transport block.
    pub harq_process_id: u8,
    /// RLC PDU split: bytes granted to each logical channel.
    pub per_channel_bytes: Vec<(Lcid, u32)>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

impl DlAllocation {
    /// RBG count in this allocation.
    pub fn rbg_count(&self) -> u32 {
        self.rbg_mask.count_ones()
    }

    /// Total bytes across all layers.
    pub fn total_bytes(&self) -> u32 {
        self.tb_size_bytes.iter().sum()
    }

    /// Whether every layer carries a retransmission.
    pub fn is_retransmission(&self) -> bool {
        !self.new_data.is_empty() && self.new_data.iter().all(|n| !n)
    }
}

/// One uplink grant (contiguous single-carrier allocation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UlGrant {
    /// Addressed UE.
    pub rnti: Rnti,
    /// First granted resource block.
    pub rb_start: u8,
    /// Number of granted resource blocks.
    pub rb_len: u8,
    /// Modulation and coding scheme.
    pub mcs: u8,
    /// Transport-block size in bytes.
    pub tb_size_bytes: u32,
    /// New-data indicator.
    pub new_data: bool,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Random-access response allocation answering one preamble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarAllocation {
    /// Temporary RNTI assigned to the acceding UE.
    pub temp_rnti: Rnti,
    /// Preamble being answered.
    pub preamble_id: u8,
    /// Downlink RBG carrying the response.
    pub rbg_index: usize,
    /// Initial uplink grant for the connection-request message (bytes).
    pub ul_grant_bytes: u32,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Paging message allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingAllocation {
    /// Paged UE.
    pub rnti: Rnti,
    /// Downlink RBG carrying the paging record.
    pub rbg_index: usize,
    /// Paging payload size in bytes.
    pub payload_bytes: u32,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Kind of broadcast payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastKind {
    /// Master information block (subframe 0).
    MasterInformation,
    /// System information block (subframe 5).
    SystemInformation,
}

/// Broadcast allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastAllocation {
    /// Payload kind.
    pub kind: BroadcastKind,
    /// Downlink RBG carrying the broadcast.
    pub rbg_index: usize,
}

/// HARQ acknowledgment indication on the PHICH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhichIndication {
    /// Addressed UE.
    pub rnti: Rnti,
    /// `true` = ACK, `false` = NACK (UE retransmits non-adaptively).
    pub ack: bool,
}

/// The complete downlink decision for one TTI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlConfigIndication {
    /// Frame/subframe this decision applies to.
    pub sfn_sf: SfnSf,
    /// Data allocations in decision order.
    pub data: Vec<DlAllocation>,
    /// Random-access responses.
    pub rar: Vec<RarAllocation>,
    /// Paging allocations.
    pub paging: Vec<PagingAllocation>,
    /// Broadcast allocations.
    pub broadcast: Vec<BroadcastAllocation>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

impl DlConfigIndication {
    /// Whether nothing was scheduled this TTI.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
            && self.rar.is_empty()
            && self.paging.is_empty()
            && self.broadcast.is_empty()
    }

    /// The data allocation addressed to `rnti`, if any.
    pub fn allocation_for(&self, rnti: Rnti) -> Option<&DlAllocation> {
        self.data.iter().find(|a| a.rnti == rnti)
    }

    /// All (RBG index, RNTI) data assignments, for occupancy checks.
    pub fn rbg_assignments(&self) -> Vec<(u32, Rnti)> {
        let mut out = Vec::new();
        for alloc in &self.data {
            for bit in 0..32 {
                if alloc.rbg_mask & (1 << bit) != 0 {
                    out.push((bit, alloc.rnti));
                }
            }
        }
        out
    }
}

/// The complete uplink decision for one TTI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlConfigIndication {
    /// Frame/subframe this decision applies to.
    pub sfn_sf: SfnSf,
    /// Uplink grants in decision order.
    pub grants: Vec<UlGrant>,
    /// HARQ acknowledgments to deliver on the PHICH.
    pub phich: Vec<PhichIndication>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

impl UlConfigIndication {
    /// Whether nothing was granted this TTI.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.phich.is_empty()
    }

    /// The grant addressed to `rnti`, if any.
    pub fn grant_for(&self, rnti: Rnti) -> Option<&UlGrant> {
        self.grants.iter().find(|g| g.rnti == rnti)
    }
}
