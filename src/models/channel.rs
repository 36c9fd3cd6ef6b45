//! Logical channel model.
//!
//! A logical channel is the scheduling unit below the UE: each carries its
//! own QoS class and its own transmission/retransmission queue summary as
//! reported by the RLC layer. The scheduler only ever sees queue sizes and
//! head-of-line delays, never the queued payloads themselves.

use serde::{Deserialize, Serialize};

use crate::Lcid;

/// QoS class of a bearer mapped onto a logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosProfile {
    /// Guaranteed-bit-rate bearer. GBR bearers receive priority resource
    /// reservation before best-effort fairness applies.
    pub is_gbr: bool,
    /// Guaranteed bit rate in bit/s (meaningful when `is_gbr`).
    pub guaranteed_bit_rate_bps: u64,
    /// Maximum bit rate in bit/s.
    pub maximum_bit_rate_bps: u64,
    /// Bearer priority, lower value = more important (QCI priority level).
    pub priority: u8,
}

impl QosProfile {
    /// Best-effort bearer with no rate bounds.
    pub fn best_effort() -> Self {
        Self {
            is_gbr: false,
            guaranteed_bit_rate_bps: 0,
            maximum_bit_rate_bps: u64::MAX,
            priority: 9,
        }
    }

    /// Guaranteed-bit-rate bearer.
    pub fn gbr(guaranteed_bit_rate_bps: u64) -> Self {
        Self {
            is_gbr: true,
            guaranteed_bit_rate_bps,
            maximum_bit_rate_bps: guaranteed_bit_rate_bps,
            priority: 2,
        }
    }

    /// Sets the maximum bit rate.
    pub fn with_maximum_bit_rate(mut self, bps: u64) -> Self {
        self.maximum_bit_rate_bps = bps;
        self
    }

    /// Sets the bearer priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Bytes per TTI needed to sustain the guaranteed rate.
    ///
    /// One TTI is 1 ms, so this is `gbr / 8000`, rounded up so that a
    /// non-zero guarantee is never starved to zero by truncation.
    pub fn gbr_bytes_per_tti(&self) -> u32 {
        if !self.is_gbr || self.guaranteed_bit_rate_bps == 0 {
            return 0;
        }
        self.guaranteed_bit_rate_bps.div_ceil(8000) as u32
    }
}

/// RLC queue summary for one logical channel, refreshed by buffer-status
/// reports. Within a TTI the last report wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStatus {
    /// Bytes waiting for first transmission.
    pub tx_queue_bytes: u32,
    /// Head-of-line delay of the transmission queue (ms).
    pub tx_head_of_line_delay_ms: u16,
    /// Bytes waiting for retransmission.
    pub retx_queue_bytes: u32,
    /// Head-of-line delay of the retransmission queue (ms).
    pub retx_head_of_line_delay_ms: u16,
    /// Pending RLC status PDU size.
    pub status_pdu_bytes: u16,
}

impl BufferStatus {
    /// Total bytes awaiting downlink resources. Saturates rather than
    /// overflowing on implausible reported queue sizes.
    pub fn total_bytes(&self) -> u32 {
        self.tx_queue_bytes
            .saturating_add(self.retx_queue_bytes)
            .saturating_add(u32::from(self.status_pdu_bytes))
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.total_bytes() == 0
    }
}

/// Scheduler-side state for one logical channel of one UE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalChannelContext {
    /// Logical channel identity, unique within the UE.
    pub lcid: Lcid,
    /// Bearer QoS class.
    pub qos: QosProfile,
    /// Latest reported queue summary.
    pub buffer: BufferStatus,
}

impl LogicalChannelContext {
    /// Creates a channel with empty queues.
    pub fn new(lcid: Lcid, qos: QosProfile) -> Self {
        Self {
            lcid,
            qos,
            buffer: BufferStatus::default(),
        }
    }

    /// Consumes `granted` bytes from the queues in RLC transmission order:
    /// status PDU first, then the retransmission queue, then the
    /// transmission queue.
    pub fn grant_bytes(&mut self, granted: u32) {
        let mut remaining = granted;

        let status = u32::from(self.buffer.status_pdu_bytes);
        if status <= remaining {
            remaining -= status;
            self.buffer.status_pdu_bytes = 0;
        } else {
            self.buffer.status_pdu_bytes -= remaining as u16;
            return;
        }

        if self.buffer.retx_queue_bytes <= remaining {
            remaining -= self.buffer.retx_queue_bytes;
            self.buffer.retx_queue_bytes = 0;
        } else {
            self.buffer.retx_queue_bytes -= remaining;
            return;
        }

        if self.buffer.tx_queue_bytes <= remaining {
            self.buffer.tx_queue_bytes = 0;
        } else {
            self.buffer.tx_queue_bytes -= remaining;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_bytes_saturates() {
        let status = BufferStatus {
            tx_queue_bytes: u32::MAX,
            retx_queue_bytes: 512,
            ..Default::default()
        };
        assert_eq!(status.total_bytes(), u32::MAX);
        assert!(!status.is_empty());
    }

    #[test]
    fn test_gbr_bytes_per_tti() {
        // 1 Mbit/s = 125 bytes per 1 ms TTI
        assert_eq!(QosProfile::gbr(1_000_000).gbr_bytes_per_tti(), 125);
        // Rounds up: 1 kbit/s still reserves a byte
        assert_eq!(QosProfile::gbr(1_000).gbr_bytes_per_tti(), 1);
        assert_eq!(QosProfile::best_effort().gbr_bytes_per_tti(), 0);
    }

    #[test]
    fn test_buffer_totals() {
        let b = BufferStatus {
            tx_queue_bytes: 100,
            retx_queue_bytes: 50,
            status_pdu_bytes: 4,
            ..Default::default()
        };
        assert_eq!(b.total_bytes(), 154);
        assert!(!b.is_empty());
        assert!(BufferStatus::default().is_empty());
    }

    #[test]
    fn test_grant_drains_in_rlc_order() {
        let mut lc = LogicalChannelContext::new(3, QosProfile::best_effort());
        lc.buffer = BufferStatus {
            tx_queue_bytes: 100,
            retx_queue_bytes: 50,
            status_pdu_bytes: 4,
            ..Default::default()
        };

        // Status PDU drains first
        lc.grant_bytes(4);
        assert_eq!(lc.buffer.status_pdu_bytes, 0);
        assert_eq!(lc.buffer.retx_queue_bytes, 50);

        // Then the retransmission queue, then tx
        lc.grant_bytes(60);
        assert_eq!(lc.buffer.retx_queue_bytes, 0);
        assert_eq!(lc.buffer.tx_queue_bytes, 90);

        // Over-grant clamps at zero
        lc.grant_bytes(1000);
        assert!(lc.buffer.is_empty());
    }

    #[test]
    fn test_partial_grant_stops_mid_queue() {
        let mut lc = LogicalChannelContext::new(1, QosProfile::best_effort());
        lc.buffer.status_pdu_bytes = 10;
        lc.buffer.tx_queue_bytes = 100;

        lc.grant_bytes(6);
        assert_eq!(lc.buffer.status_pdu_bytes, 4);
        assert_eq!(lc.buffer.tx_queue_bytes, 100);
    }
}
