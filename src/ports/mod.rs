//! Port contracts between the scheduler and its collaborators.
//!
//! Two provider/user pairs, both pure message-passing boundaries that own
//! no state:
//!
//! - **Configuration port** (`config_port`): RRC-driven control plane.
//!   Each request is answered by exactly one confirmation on the user
//!   side, success or failure.
//! - **Scheduling port** (`sched_port`): per-TTI data plane. Reports feed
//!   the scheduler's snapshot; each trigger emits exactly one downlink or
//!   uplink configuration indication.
//!
//! `EventCollector` is the stock user-side implementation for event-loop
//! integration and tests.

mod collector;
mod config_port;
mod sched_port;

pub use collector::{EventCollector, PortEvent};
pub use config_port::{
    CellConfigConfirmation, CellConfigRequest, ConfigFailure, ConfigResult, ConfigurationUser,
    LogicalChannelConfigConfirmation, LogicalChannelConfigRequest,
    LogicalChannelReleaseConfirmation, LogicalChannelReleaseRequest, UeConfigConfirmation,
    UeConfigRequest, UeConfigUpdateIndication, UeReleaseConfirmation, UeReleaseRequest,
};
pub use sched_port::{
    DlBufferReport, DlCqiReport, DlTriggerRequest, MacCeKind, MacControlElementReport,
    NoiseInterferenceReport, PagingReport, ProtocolError, RachReport, SchedulingRequestReport,
    SchedulingUser, UlCqiReport, UlTriggerRequest,
};
