//! Cell and scheduler configuration records.
//!
//! `CellConfig` carries the per-cell radio parameters established once by
//! the RRC before any UE is attached. `SchedulerConfig` bounds the tunable
//! constants of the scheduling algorithms (CQI validity, HARQ limits, the
//! proportional-fair smoothing window) so that no magic number lives in
//! algorithm code.
//!
//! # Reference
//! 3GPP TS 36.213, TS 36.321 (parameter ranges)

use serde::{Deserialize, Serialize};

/// Frequency- or time-division duplexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    /// Paired spectrum, separate DL/UL carriers.
    Fdd,
    /// Shared carrier, subframes split between DL and UL.
    Tdd,
}

/// Cyclic prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclicPrefix {
    /// 14 OFDM symbols per subframe.
    Normal,
    /// 12 OFDM symbols per subframe, for high-delay-spread channels.
    Extended,
}

/// PHICH resource dimensioning (Ng factor of 36.211 Sec 6.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhichResource {
    OneSixth,
    Half,
    One,
    Two,
}

/// PRACH configuration subset consumed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrachConfig {
    /// Configuration index (36.211 Table 5.7.1-2), selects preamble format
    /// and which subframes carry PRACH opportunities.
    pub configuration_index: u8,
    /// First PRB of the PRACH region.
    pub frequency_offset: u8,
}

/// PHICH configuration subset consumed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhichConfig {
    /// Extended (3-subframe) PHICH duration.
    pub extended_duration: bool,
    /// PHICH group dimensioning factor.
    pub resource: PhichResource,
}

/// Per-cell radio configuration, established once before any UE is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    /// Cell identifier.
    pub cell_id: u16,
    /// Downlink bandwidth in physical resource blocks (6..=110).
    pub dl_bandwidth_rb: u8,
    /// Uplink bandwidth in physical resource blocks (6..=110).
    pub ul_bandwidth_rb: u8,
    /// Duplexing mode.
    pub duplex_mode: DuplexMode,
    /// Cyclic prefix length.
    pub cyclic_prefix: CyclicPrefix,
    /// Random access channel configuration.
    pub prach: PrachConfig,
    /// HARQ indicator channel configuration.
    pub phich: PhichConfig,
}

impl CellConfig {
    /// Creates a cell configuration with the given bandwidths and
    /// conventional defaults for the remaining parameters.
    pub fn new(cell_id: u16, dl_bandwidth_rb: u8, ul_bandwidth_rb: u8) -> Self {
        Self {
            cell_id,
            dl_bandwidth_rb,
            ul_bandwidth_rb,
            duplex_mode: DuplexMode::Fdd,
            cyclic_prefix: CyclicPrefix::Normal,
            prach: PrachConfig {
                configuration_index: 0,
                frequency_offset: 0,
            },
            phich: PhichConfig {
                extended_duration: false,
                resource: PhichResource::One,
            },
        }
    }

    /// Sets the duplex mode.
    pub fn with_duplex_mode(mut self, mode: DuplexMode) -> Self {
        self.duplex_mode = mode;
        self
    }

    /// Sets the cyclic prefix.
    pub fn with_cyclic_prefix(mut self, cp: CyclicPrefix) -> Self {
        self.cyclic_prefix = cp;
        self
    }

    /// Sets the PRACH configuration.
    pub fn with_prach(mut self, prach: PrachConfig) -> Self {
        self.prach = prach;
        self
    }

    /// Sets the PHICH configuration.
    pub fn with_phich(mut self, phich: PhichConfig) -> Self {
        self.phich = phich;
        self
    }

    /// Whether both bandwidths fall in the valid PRB range.
    pub fn bandwidth_valid(&self) -> bool {
        let ok = |bw: u8| (6..=110).contains(&bw);
        ok(self.dl_bandwidth_rb) && ok(self.ul_bandwidth_rb)
    }
}

/// Tunable scheduler constants.
///
/// Every algorithmic constant the strategies or the orchestrator consume
/// is bound here rather than hard-coded, so tests can pin their own values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// TTIs a CQI report stays at full confidence. Older reports are kept
    /// but treated as degraded: strategies fall back to `fallback_cqi`.
    pub cqi_validity_ttis: u32,
    /// HARQ processes per UE per link direction.
    pub harq_process_count: u8,
    /// Retransmissions allowed before a HARQ process is declared failed.
    pub max_harq_retx: u8,
    /// Half-life window (in TTIs) of the proportional-fair throughput
    /// average.
    pub pf_window_ttis: u32,
    /// CQI assumed for a UE with absent or degraded channel feedback.
    pub fallback_cqi: u8,
    /// Bytes granted on the uplink to answer a random-access preamble.
    pub rar_ul_grant_bytes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cqi_validity_ttis: 1000,
            harq_process_count: 8,
            max_harq_retx: 3,
            pf_window_ttis: 100,
            fallback_cqi: 1,
            rar_ul_grant_bytes: 56,
        }
    }
}

impl SchedulerConfig {
    /// Sets the CQI validity window.
    pub fn with_cqi_validity(mut self, ttis: u32) -> Self {
        self.cqi_validity_ttis = ttis;
        self
    }

    /// Sets the HARQ process count.
    pub fn with_harq_processes(mut self, count: u8) -> Self {
        self.harq_process_count = count;
        self
    }

    /// Sets the maximum HARQ retransmission count.
    pub fn with_max_harq_retx(mut self, max: u8) -> Self {
        self.max_harq_retx = max;
        self
    }

    /// Sets the proportional-fair smoothing window.
    pub fn with_pf_window(mut self, ttis: u32) -> Self {
        self.pf_window_ttis = ttis;
        self
    }

    /// Sets the fallback CQI.
    pub fn with_fallback_cqi(mut self, cqi: u8) -> Self {
        self.fallback_cqi = cqi;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_config_defaults() {
        let cell = CellConfig::new(1, 25, 25);
        assert_eq!(cell.duplex_mode, DuplexMode::Fdd);
        assert_eq!(cell.cyclic_prefix, CyclicPrefix::Normal);
        assert!(cell.bandwidth_valid());
    }

    #[test]
    fn test_bandwidth_bounds() {
        assert!(!CellConfig::new(1, 5, 25).bandwidth_valid());
        assert!(!CellConfig::new(1, 25, 111).bandwidth_valid());
        assert!(CellConfig::new(1, 6, 110).bandwidth_valid());
    }

    #[test]
    fn test_scheduler_config_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.cqi_validity_ttis, 1000);
        assert_eq!(cfg.harq_process_count, 8);
        assert_eq!(cfg.max_harq_retx, 3);
        assert_eq!(cfg.pf_window_ttis, 100);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let cell = CellConfig::new(7, 50, 50).with_duplex_mode(DuplexMode::Tdd);
        let json = serde_json::to_string(&cell).unwrap();
        let back: CellConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cell);
    }
}
