//! Channel-quality records.
//!
//! Downlink CQI arrives as wideband (optionally per-RBG subband) indices;
//! uplink quality arrives as per-RB SINR attributed through the stored
//! allocation map. Both carry an age counter advanced once per trigger:
//! reports past the validity window are kept but treated as degraded, so
//! strategies fall back to the configured conservative CQI rather than
//! trusting stale feedback.

use serde::{Deserialize, Serialize};

/// Most recent downlink CQI feedback for one UE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlCqiRecord {
    /// Wideband CQI (1..=15; 0 means out of range).
    pub wideband: u8,
    /// Per-RBG subband CQI, empty for wideband-only reporting.
    pub subband: Vec<u8>,
    /// TTIs elapsed since the report was received.
    pub age_ttis: u32,
}

impl DlCqiRecord {
    /// Creates a fresh wideband record.
    pub fn wideband(cqi: u8) -> Self {
        Self {
            wideband: cqi,
            subband: Vec::new(),
            age_ttis: 0,
        }
    }

    /// Creates a fresh record with subband detail.
    pub fn with_subband(mut self, subband: Vec<u8>) -> Self {
        self.subband = subband;
        self
    }

    /// Whether the report is past the validity window.
    pub fn is_stale(&self, validity_ttis: u32) -> bool {
        self.age_ttis > validity_ttis
    }

    /// Wideband CQI, degraded to `fallback` when stale.
    pub fn effective_wideband(&self, validity_ttis: u32, fallback: u8) -> u8 {
        if self.is_stale(validity_ttis) {
            fallback
        } else {
            self.wideband
        }
    }

    /// Subband CQI for one RBG, falling back to the wideband value when no
    /// subband detail covers it; degraded to `fallback` when stale.
    pub fn effective_for_rbg(&self, rbg: usize, validity_ttis: u32, fallback: u8) -> u8 {
        if self.is_stale(validity_ttis) {
            return fallback;
        }
        self.subband.get(rbg).copied().unwrap_or(self.wideband)
    }
}

/// Most recent uplink SINR estimate for one UE, one entry per uplink RB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UlCqiRecord {
    /// SINR in dB per uplink resource block.
    pub sinr_db: Vec<f64>,
    /// TTIs elapsed since the last attribution.
    pub age_ttis: u32,
}

impl UlCqiRecord {
    /// Sounding default assumed before any measurement arrives for an RB.
    pub const UNMEASURED_SINR_DB: f64 = 30.0;

    /// Creates a record with every RB at the unmeasured default.
    pub fn unmeasured(ul_bandwidth_rb: usize) -> Self {
        Self {
            sinr_db: vec![Self::UNMEASURED_SINR_DB; ul_bandwidth_rb],
            age_ttis: 0,
        }
    }

    /// Whether the record is past the validity window.
    pub fn is_stale(&self, validity_ttis: u32) -> bool {
        self.age_ttis > validity_ttis
    }

    /// The worst SINR across an RB range, or `None` when the range falls
    /// outside the measured band.
    pub fn min_sinr_db(&self, rb_start: usize, rb_len: usize) -> Option<f64> {
        let slice = self.sinr_db.get(rb_start..rb_start + rb_len)?;
        slice.iter().copied().reduce(f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_window() {
        let mut rec = DlCqiRecord::wideband(12);
        assert!(!rec.is_stale(10));
        rec.age_ttis = 10;
        assert!(!rec.is_stale(10)); // at the boundary, still valid
        rec.age_ttis = 11;
        assert!(rec.is_stale(10));
        assert_eq!(rec.effective_wideband(10, 1), 1);
    }

    #[test]
    fn test_subband_falls_back_to_wideband() {
        let rec = DlCqiRecord::wideband(9).with_subband(vec![11, 7]);
        assert_eq!(rec.effective_for_rbg(0, 100, 1), 11);
        assert_eq!(rec.effective_for_rbg(1, 100, 1), 7);
        // Beyond subband detail: wideband
        assert_eq!(rec.effective_for_rbg(5, 100, 1), 9);
    }

    #[test]
    fn test_ul_min_sinr() {
        let mut rec = UlCqiRecord::unmeasured(6);
        rec.sinr_db[2] = 3.0;
        rec.sinr_db[3] = -1.5;
        assert_eq!(rec.min_sinr_db(2, 2), Some(-1.5));
        assert_eq!(rec.min_sinr_db(0, 2), Some(UlCqiRecord::UNMEASURED_SINR_DB));
        assert_eq!(rec.min_sinr_db(4, 5), None);
    }
}
