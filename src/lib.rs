//! Deterministic per-TTI MAC scheduler for an LTE-style cell.
//!
//! Implements the provider side of the two FAPI-style scheduler ports:
//! a configuration port the RRC drives (cell, UE, and logical-channel
//! lifecycle) and a scheduling port the MAC drives once per 1 ms TTI
//! (reports in, one downlink and one uplink configuration indication
//! out). Allocation policy is pluggable behind `AllocationStrategy`;
//! round-robin and proportional fair ship built in.
//!
//! # Modules
//!
//! - **`config`**: cell radio parameters and scheduler tunables
//! - **`amc`**: CQI/MCS/transport-block-size and BSR lookup tables
//! - **`models`**: UE, logical channel, CQI, HARQ, resource-grid, and
//!   allocation records
//! - **`ports`**: the two port contracts plus `EventCollector`, the
//!   stock user-side sink
//! - **`strategy`**: `AllocationStrategy`, the built-in strategies, and
//!   the identifier registry
//! - **`scheduler`**: `MacScheduler`, the per-TTI orchestrator
//!
//! # Determinism
//!
//! The scheduler reads no clock and no randomness; all keyed state is in
//! `BTreeMap`s and metric ties break toward the lower RNTI. Feeding the
//! same request sequence twice yields byte-identical indication
//! sequences, which is what makes simulation runs reproducible.
//!
//! # References
//!
//! - 3GPP TS 36.213, "Physical layer procedures" (AMC, RBG tables)
//! - 3GPP TS 36.321, "MAC protocol specification" (BSR, HARQ)
//! - FemtoForum, "LTE MAC Scheduler Interface Specification v1.11"

pub mod amc;
pub mod config;
pub mod models;
pub mod ports;
pub mod scheduler;
pub mod strategy;

pub use amc::AmcTables;
pub use config::{CellConfig, SchedulerConfig};
pub use ports::EventCollector;
pub use scheduler::MacScheduler;
pub use strategy::{AllocationStrategy, StrategyRegistry};

/// Radio network temporary identifier: the per-cell UE scheduling key.
pub type Rnti = u16;

/// Logical channel identifier, unique within a UE.
pub type Lcid = u8;

/// Packed frame/subframe timestamp: `frame << 4 | subframe`.
pub type SfnSf = u32;

/// Packs a frame number and subframe (0..=9) into an [`SfnSf`].
pub fn sfn_sf(frame: u16, subframe: u8) -> SfnSf {
    (u32::from(frame) << 4) | u32::from(subframe & 0xF)
}

/// Subframe component of a packed [`SfnSf`].
pub fn subframe_of(sfn_sf: SfnSf) -> u8 {
    (sfn_sf & 0xF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sfn_sf_packing() {
        assert_eq!(sfn_sf(0, 0), 0);
        assert_eq!(sfn_sf(1, 5), 0x15);
        assert_eq!(subframe_of(sfn_sf(512, 9)), 9);
        assert_eq!(sfn_sf(512, 9) >> 4, 512);
    }
}
