//! Configuration-scheduling port (control plane).
//!
//! The contract the RRC uses to create and destroy cell, UE, and
//! logical-channel state inside the scheduler. Every request produces
//! exactly one confirmation on the paired user side, carrying a result
//! code rather than an exception: configuration failures are reported,
//! never thrown, and leave unrelated state untouched.

use serde::{Deserialize, Serialize};

use crate::config::CellConfig;
use crate::models::{QosProfile, UeCapabilities, VendorExtensions};
use crate::{Lcid, Rnti};

/// Why a configuration request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigFailure {
    /// The cell was already configured; reconfiguration is not supported.
    CellAlreadyConfigured,
    /// A per-UE operation arrived before the cell was configured.
    CellNotConfigured,
    /// Bandwidth outside the supported PRB range.
    InvalidBandwidth { dl_rb: u8, ul_rb: u8 },
    /// The RNTI is not attached.
    UnknownRnti(Rnti),
    /// The RNTI is already attached and the request was not a
    /// reconfiguration.
    DuplicateRnti(Rnti),
    /// The logical channel already exists and the request was not a
    /// reconfiguration.
    DuplicateLogicalChannel { rnti: Rnti, lcid: Lcid },
    /// The transmission mode does not map to a valid layer count.
    InvalidTransmissionMode(u8),
}

/// Result code carried on every confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigResult {
    /// The request was applied in full.
    Success,
    /// The request was rejected; no state changed.
    Failure(ConfigFailure),
}

impl ConfigResult {
    /// Whether the request was applied.
    pub fn is_success(&self) -> bool {
        matches!(self, ConfigResult::Success)
    }
}

/// Cell configuration request, valid at most once per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfigRequest {
    /// Radio parameters of the cell.
    pub cell: CellConfig,
    /// Opaque vendor extensions, echoed on the confirmation.
    pub vendor: VendorExtensions,
}

/// UE configuration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeConfigRequest {
    /// UE identity.
    pub rnti: Rnti,
    /// Capabilities to apply.
    pub capabilities: UeCapabilities,
    /// `true` to update an attached UE, `false` to attach a new one.
    pub reconfigure: bool,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Logical channel configuration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalChannelConfigRequest {
    /// Owning UE.
    pub rnti: Rnti,
    /// Channel identity within the UE.
    pub lcid: Lcid,
    /// Bearer QoS class.
    pub qos: QosProfile,
    /// `true` to update an existing channel.
    pub reconfigure: bool,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Logical channel release request. Idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalChannelReleaseRequest {
    /// Owning UE.
    pub rnti: Rnti,
    /// Channels to release.
    pub lcids: Vec<Lcid>,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// UE release request. Idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeReleaseRequest {
    /// UE to release.
    pub rnti: Rnti,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Confirmation of a cell configuration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfigConfirmation {
    /// Result code.
    pub result: ConfigResult,
    /// Vendor extensions echoed from the request.
    pub vendor: VendorExtensions,
}

/// Confirmation of a UE configuration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeConfigConfirmation {
    /// UE the request addressed.
    pub rnti: Rnti,
    /// Result code.
    pub result: ConfigResult,
    /// Vendor extensions echoed from the request.
    pub vendor: VendorExtensions,
}

/// Unsolicited indication that a UE's configuration changed
/// (e.g. transmission-mode adaptation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeConfigUpdateIndication {
    /// Affected UE.
    pub rnti: Rnti,
    /// New transmission mode.
    pub transmission_mode: u8,
    /// Opaque vendor extensions.
    pub vendor: VendorExtensions,
}

/// Confirmation of a UE release request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeReleaseConfirmation {
    /// Released UE.
    pub rnti: Rnti,
    /// Result code.
    pub result: ConfigResult,
    /// Vendor extensions echoed from the request.
    pub vendor: VendorExtensions,
}

/// Confirmation of a logical channel configuration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalChannelConfigConfirmation {
    /// Owning UE.
    pub rnti: Rnti,
    /// Addressed channel.
    pub lcid: Lcid,
    /// Result code.
    pub result: ConfigResult,
    /// Vendor extensions echoed from the request.
    pub vendor: VendorExtensions,
}

/// Confirmation of a logical channel release request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalChannelReleaseConfirmation {
    /// Owning UE.
    pub rnti: Rnti,
    /// Released channels.
    pub lcids: Vec<Lcid>,
    /// Result code.
    pub result: ConfigResult,
    /// Vendor extensions echoed from the request.
    pub vendor: VendorExtensions,
}

/// User side of the configuration port: the RRC-facing callbacks the
/// scheduler invokes, exactly once per request, success or failure.
pub trait ConfigurationUser: Send + Sync {
    /// Answer to `configure_cell`.
    fn cell_config_confirmed(&self, cnf: CellConfigConfirmation);
    /// Answer to `configure_ue`.
    fn ue_config_confirmed(&self, cnf: UeConfigConfirmation);
    /// Unsolicited configuration change notice.
    fn ue_config_update_indicated(&self, ind: UeConfigUpdateIndication);
    /// Answer to `release_ue`.
    fn ue_release_confirmed(&self, cnf: UeReleaseConfirmation);
    /// Answer to `configure_logical_channel`.
    fn logical_channel_config_confirmed(&self, cnf: LogicalChannelConfigConfirmation);
    /// Answer to `release_logical_channel`.
    fn logical_channel_release_confirmed(&self, cnf: LogicalChannelReleaseConfirmation);
}
