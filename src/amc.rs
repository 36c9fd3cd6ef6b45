//! Adaptive modulation and coding tables.
//!
//! Maps the channel feedback the scheduler receives (CQI, uplink SINR,
//! buffer-status indices) to the quantities the allocation strategies
//! consume (MCS, transport-block size, queue size in bytes).
//!
//! All tables are configuration, not constants baked into algorithm code:
//! the defaults approximate the 36.213 efficiency ladder, and tests pin
//! their own tables where exact byte counts matter.
//!
//! # Reference
//! 3GPP TS 36.213 Tables 7.1.6.1-1, 7.1.7.1-1, 7.2.3-1;
//! TS 36.321 Table 6.1.3.1-1

use serde::{Deserialize, Serialize};

/// Resource-block-group sizes by downlink bandwidth
/// (36.213 Table 7.1.6.1-1, allocation type 0).
const TYPE0_RBG_THRESHOLDS: [(u8, u8); 4] = [(10, 1), (26, 2), (63, 3), (110, 4)];

/// Default CQI (1..=15) to MCS (0..=28) mapping.
const DEFAULT_CQI_TO_MCS: [u8; 15] = [0, 2, 4, 6, 8, 11, 13, 15, 17, 19, 21, 23, 25, 27, 28];

/// Default transport-block capacity per PRB per TTI, in bytes, indexed by
/// MCS 0..=28. Approximates spectral efficiency x 12 subcarriers x 14
/// symbols / 8 bits.
const DEFAULT_BYTES_PER_PRB: [u32; 29] = [
    3, 4, 5, 6, 8, 9, 11, 13, 15, 17, 19, 22, 25, 28, 31, 34, 37, 40, 44, 48, 53, 58, 63, 69, 75,
    82, 89, 97, 103,
];

/// Spectral-efficiency thresholds (bit/s/Hz) separating CQI 1..=15.
/// A measured efficiency below the first threshold maps to CQI 0
/// ("out of range").
const DEFAULT_CQI_THRESHOLDS: [f64; 15] = [
    0.15, 0.23, 0.38, 0.60, 0.88, 1.18, 1.48, 1.91, 2.41, 2.73, 3.32, 3.90, 4.52, 5.12, 5.55,
];

/// Buffer-status-report index to buffer size in bytes
/// (36.321 Table 6.1.3.1-1, upper bounds).
const DEFAULT_BSR_TABLE: [u32; 64] = [
    0, 10, 12, 14, 17, 19, 22, 26, 31, 36, 42, 49, 57, 67, 78, 91, 107, 125, 146, 171, 200, 234,
    274, 321, 376, 440, 515, 603, 706, 826, 967, 1132, 1326, 1552, 1817, 2127, 2490, 2915, 3413,
    3995, 4677, 5476, 6411, 7505, 8787, 10287, 12043, 14099, 16507, 19325, 22624, 26487, 31009,
    36304, 42502, 49759, 58255, 68201, 79846, 93479, 109439, 128125, 150000, 150000,
];

/// Highest MCS index in the downlink tables.
pub const MAX_MCS: u8 = 28;

/// CQI/MCS/TBS lookup tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmcTables {
    cqi_to_mcs: Vec<u8>,
    bytes_per_prb: Vec<u32>,
    cqi_thresholds: Vec<f64>,
    bsr_table: Vec<u32>,
}

impl Default for AmcTables {
    fn default() -> Self {
        Self {
            cqi_to_mcs: DEFAULT_CQI_TO_MCS.to_vec(),
            bytes_per_prb: DEFAULT_BYTES_PER_PRB.to_vec(),
            cqi_thresholds: DEFAULT_CQI_THRESHOLDS.to_vec(),
            bsr_table: DEFAULT_BSR_TABLE.to_vec(),
        }
    }
}

impl AmcTables {
    /// Tables with the documented 36.213-derived defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the CQI-to-MCS map (index 0 corresponds to CQI 1).
    pub fn with_cqi_to_mcs(mut self, map: Vec<u8>) -> Self {
        self.cqi_to_mcs = map;
        self
    }

    /// Replaces the per-PRB capacity table (indexed by MCS).
    pub fn with_bytes_per_prb(mut self, table: Vec<u32>) -> Self {
        self.bytes_per_prb = table;
        self
    }

    /// Builds tables where every MCS carries a flat `bytes` per PRB.
    ///
    /// Convenient for tests that need exact transport-block arithmetic.
    pub fn flat_rate(bytes: u32) -> Self {
        Self::default().with_bytes_per_prb(vec![bytes; MAX_MCS as usize + 1])
    }

    /// MCS for a reported CQI. `None` for CQI 0 ("out of range",
    /// 36.213 Table 7.2.3-1) and for CQIs beyond the table.
    pub fn mcs_from_cqi(&self, cqi: u8) -> Option<u8> {
        if cqi == 0 {
            return None;
        }
        self.cqi_to_mcs.get(cqi as usize - 1).copied()
    }

    /// Transport-block size in bytes for `n_prb` resource blocks at `mcs`.
    ///
    /// Unknown MCS indices degrade to the most conservative entry.
    pub fn tb_size_bytes(&self, mcs: u8, n_prb: u32) -> u32 {
        let per_prb = self
            .bytes_per_prb
            .get(mcs as usize)
            .or_else(|| self.bytes_per_prb.first())
            .copied()
            .unwrap_or(0);
        per_prb * n_prb
    }

    /// CQI (0..=15) for a measured uplink SINR in dB.
    ///
    /// Converts SINR to spectral efficiency with the standard BLER-target
    /// mapping, then quantizes against the CQI thresholds. Returns 0 when
    /// the channel is out of range.
    pub fn cqi_from_sinr_db(&self, sinr_db: f64) -> u8 {
        // BLER target 5e-5, as in the downlink error model
        let gamma = (-((5.0 * 0.00005_f64).ln())) / 1.5;
        let efficiency = (1.0 + 10.0_f64.powf(sinr_db / 10.0) / gamma).log2();
        let mut cqi = 0u8;
        for (i, threshold) in self.cqi_thresholds.iter().enumerate() {
            if efficiency >= *threshold {
                cqi = i as u8 + 1;
            } else {
                break;
            }
        }
        cqi
    }

    /// Decodes a buffer-status-report index into a queue size in bytes.
    ///
    /// Indices beyond the table saturate at the last entry.
    pub fn bsr_index_to_bytes(&self, index: u8) -> u32 {
        self.bsr_table
            .get(index as usize)
            .or_else(|| self.bsr_table.last())
            .copied()
            .unwrap_or(0)
    }

    /// Resource-block-group size for a downlink bandwidth in PRBs
    /// (36.213 Table 7.1.6.1-1). `None` for bandwidths above 110 PRBs.
    pub fn rbg_size(dl_bandwidth_rb: u8) -> Option<u8> {
        for (limit, size) in TYPE0_RBG_THRESHOLDS {
            if dl_bandwidth_rb <= limit {
                return Some(size);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rbg_size_table() {
        assert_eq!(AmcTables::rbg_size(6), Some(1));
        assert_eq!(AmcTables::rbg_size(10), Some(1));
        assert_eq!(AmcTables::rbg_size(15), Some(2));
        assert_eq!(AmcTables::rbg_size(25), Some(2));
        assert_eq!(AmcTables::rbg_size(50), Some(3));
        assert_eq!(AmcTables::rbg_size(100), Some(4));
        assert_eq!(AmcTables::rbg_size(111), None);
    }

    #[test]
    fn test_cqi_zero_is_out_of_range() {
        let amc = AmcTables::new();
        assert_eq!(amc.mcs_from_cqi(0), None);
        assert_eq!(amc.mcs_from_cqi(1), Some(0));
        assert_eq!(amc.mcs_from_cqi(15), Some(28));
        assert_eq!(amc.mcs_from_cqi(16), None);
    }

    #[test]
    fn test_tb_size_scales_with_prbs() {
        let amc = AmcTables::new();
        let one = amc.tb_size_bytes(10, 1);
        assert_eq!(amc.tb_size_bytes(10, 4), one * 4);
        // Higher MCS carries more bytes
        assert!(amc.tb_size_bytes(28, 1) > amc.tb_size_bytes(0, 1));
    }

    #[test]
    fn test_flat_rate_table() {
        let amc = AmcTables::flat_rate(200);
        assert_eq!(amc.tb_size_bytes(0, 1), 200);
        assert_eq!(amc.tb_size_bytes(28, 3), 600);
    }

    #[test]
    fn test_sinr_to_cqi_monotone() {
        let amc = AmcTables::new();
        let low = amc.cqi_from_sinr_db(-10.0);
        let mid = amc.cqi_from_sinr_db(10.0);
        let high = amc.cqi_from_sinr_db(30.0);
        assert!(low <= mid && mid <= high);
        assert_eq!(high, 15);
        assert_eq!(amc.cqi_from_sinr_db(-30.0), 0); // out of range
    }

    #[test]
    fn test_bsr_decode() {
        let amc = AmcTables::new();
        assert_eq!(amc.bsr_index_to_bytes(0), 0);
        assert_eq!(amc.bsr_index_to_bytes(1), 10);
        assert_eq!(amc.bsr_index_to_bytes(63), 150000);
        // Saturates past the table
        assert_eq!(amc.bsr_index_to_bytes(200), 150000);
    }
}
