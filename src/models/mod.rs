//! Scheduler domain models.
//!
//! Leaf data holders owned exclusively by the scheduler: per-UE state,
//! logical channels with QoS, channel-quality records, HARQ tables, the
//! per-TTI resource grid, and the allocation-decision records emitted on
//! the scheduling port.

mod allocation;
mod channel;
mod cqi;
mod harq;
mod resource_map;
mod ue;
mod vendor;

pub use allocation::{
    BroadcastAllocation, BroadcastKind, DlAllocation, DlConfigIndication, PagingAllocation,
    PhichIndication, RarAllocation, UlConfigIndication, UlGrant,
};
pub use channel::{BufferStatus, LogicalChannelContext, QosProfile};
pub use cqi::{DlCqiRecord, UlCqiRecord};
pub use harq::{HarqFeedback, HarqProcess, HarqProcessTable, NackOutcome};
pub use resource_map::{ReservedFor, ResourceMap, SlotConflict, SlotUse};
pub use ue::{UeCapabilities, UeContext};
pub use vendor::{VendorExtension, VendorExtensions};
