//! Scheduling port (data plane).
//!
//! The real-time contract invoked once per TTI and on asynchronous radio
//! events: buffer-status, CQI, random-access, and scheduling-request
//! reports flow in; one downlink and one uplink configuration indication
//! flow out per trigger. Report calls for a TTI logically precede the
//! matching trigger; within a TTI the strategy reads a consistent
//! snapshot at trigger time, so report order among kinds is free.

use serde::{Deserialize, Serialize};

use crate::models::{
    BufferStatus, DlConfigIndication, HarqFeedback, UlConfigIndication, VendorExtensions,
};
use crate::{Lcid, Rnti, SfnSf};

/// Downlink CQI feedback report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlCqiReport {
    /// Reporting UE.
    pub rnti: Rnti,
    /// Wideband CQI (0 = out of range).
    pub wideband_cqi: u8,
    /// Optional per-RBG subband CQI.
    pub subband_cqi: Vec<u8>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// RLC buffer occupancy report for one logical channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlBufferReport {
    /// Owning UE.
    pub rnti: Rnti,
    /// Reported channel.
    pub lcid: Lcid,
    /// Queue summary; within a TTI the last report wins.
    pub status: BufferStatus,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Pending paging message for an idle UE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingReport {
    /// Paged UE.
    pub rnti: Rnti,
    /// Paging record size in bytes.
    pub payload_bytes: u32,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Detected random-access attempt awaiting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RachReport {
    /// Preamble index the UE transmitted.
    pub preamble_id: u8,
    /// Temporary RNTI the MAC assigned for the response.
    pub temp_rnti: Rnti,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Scheduling request: a UE without a grant needs one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingRequestReport {
    /// Requesting UE.
    pub rnti: Rnti,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// MAC control element payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacCeKind {
    /// Buffer status report (index into the BSR size table).
    BufferStatus { index: u8 },
    /// Power headroom report.
    PowerHeadroom { level: u8 },
}

/// Uplink MAC control element report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacControlElementReport {
    /// Originating UE.
    pub rnti: Rnti,
    /// Element payload.
    pub element: MacCeKind,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Uplink channel-quality report: per-RB SINR measured on a previous
/// uplink subframe. Anonymous, attributed through the allocation the
/// scheduler stored for that subframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UlCqiReport {
    /// Subframe the measurement belongs to.
    pub sfn_sf: SfnSf,
    /// SINR in dB per uplink resource block.
    pub sinr_db: Vec<f64>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Uplink noise and interference report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseInterferenceReport {
    /// Received interference power in dBm.
    pub interference_dbm: f64,
    /// Thermal noise power in dBm.
    pub thermal_noise_dbm: f64,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Per-TTI downlink scheduling trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlTriggerRequest {
    /// Frame/subframe being scheduled.
    pub sfn_sf: SfnSf,
    /// Downlink HARQ feedback collected since the last trigger.
    pub harq_feedback: Vec<HarqFeedback>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Per-TTI uplink scheduling trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UlTriggerRequest {
    /// Frame/subframe being scheduled.
    pub sfn_sf: SfnSf,
    /// Uplink HARQ feedback to convert into PHICH indications.
    pub harq_feedback: Vec<HarqFeedback>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Protocol or ordering violation, reported on the indication channel
/// rather than dropped or escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// A report referenced an RNTI with no UE context.
    UnknownRnti { rnti: Rnti, operation: String },
    /// A report referenced an unconfigured logical channel.
    UnknownLogicalChannel { rnti: Rnti, lcid: Lcid },
    /// A trigger arrived before the cell was configured.
    TriggerWhileUnconfigured { sfn_sf: SfnSf },
    /// An uplink CQI report referenced a subframe with no stored
    /// allocation to attribute it to.
    UnknownUlAllocation { sfn_sf: SfnSf },
}

/// User side of the scheduling port: the PHY/MAC-facing callbacks.
///
/// Exactly one `downlink_config_indicated` per downlink trigger and one
/// `uplink_config_indicated` per uplink trigger, empty or not.
pub trait SchedulingUser: Send + Sync {
    /// Downlink decision for the triggered TTI.
    fn downlink_config_indicated(&self, ind: DlConfigIndication);
    /// Uplink decision for the triggered TTI.
    fn uplink_config_indicated(&self, ind: UlConfigIndication);
    /// Protocol-class error local to one request.
    fn protocol_error_indicated(&self, err: ProtocolError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_serde_round_trip() {
        let req = DlTriggerRequest {
            sfn_sf: (3 << 4) | 7,
            harq_feedback: vec![HarqFeedback {
                rnti: 2,
                process_id: 1,
                ack: false,
            }],
            vendor: VendorExtensions::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: DlTriggerRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn test_protocol_error_variants() {
        let err = ProtocolError::UnknownRnti {
            rnti: 9,
            operation: "report_dl_cqi".into(),
        };
        assert_ne!(
            err,
            ProtocolError::TriggerWhileUnconfigured { sfn_sf: 0 }
        );
    }
}
