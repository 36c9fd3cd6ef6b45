//! HARQ process bookkeeping.
//!
//! Each UE owns a fixed table of stop-and-wait HARQ processes per link
//! direction. A process holds the parameters of one outstanding transport
//! block so a NACK can re-issue the same transmission; the retransmission
//! count is bounded by configuration, after which the process is released
//! and the transport block abandoned.

use serde::{Deserialize, Serialize};

use crate::Rnti;

/// Parameters of one outstanding transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarqProcess {
    /// Modulation and coding scheme of the original transmission.
    pub mcs: u8,
    /// RBG bitmap of the original downlink allocation.
    pub rbg_mask: u32,
    /// Number of RBGs in the original allocation.
    pub rbg_count: u8,
    /// Transport-block size in bytes.
    pub tb_size_bytes: u32,
    /// Retransmissions already performed.
    pub retx_count: u8,
}

/// Outcome of a negative acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum NackOutcome {
    /// The process should be retransmitted with these parameters.
    Retransmit(HarqProcess),
    /// The retransmission budget is exhausted; the process was released.
    Dropped,
}

/// Fixed-size table of HARQ processes for one UE, one link direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarqProcessTable {
    processes: Vec<Option<HarqProcess>>,
    max_retx: u8,
}

impl HarqProcessTable {
    /// Creates a table with `count` idle processes.
    pub fn new(count: u8, max_retx: u8) -> Self {
        Self {
            processes: vec![None; count as usize],
            max_retx,
        }
    }

    /// First idle process id, or `None` when all are outstanding.
    pub fn free_process(&self) -> Option<u8> {
        self.processes
            .iter()
            .position(|p| p.is_none())
            .map(|i| i as u8)
    }

    /// Whether every process has an outstanding transmission.
    pub fn is_full(&self) -> bool {
        self.processes.iter().all(|p| p.is_some())
    }

    /// Number of outstanding transmissions.
    pub fn outstanding(&self) -> usize {
        self.processes.iter().filter(|p| p.is_some()).count()
    }

    /// Marks a process as outstanding with the given parameters.
    ///
    /// Ignored when the id is out of range (the caller picked the id from
    /// `free_process`, so a mismatch means the table was reconfigured).
    pub fn start(&mut self, process_id: u8, process: HarqProcess) {
        if let Some(slot) = self.processes.get_mut(process_id as usize) {
            *slot = Some(process);
        }
    }

    /// Positive acknowledgment: releases the process.
    pub fn ack(&mut self, process_id: u8) {
        if let Some(slot) = self.processes.get_mut(process_id as usize) {
            *slot = None;
        }
    }

    /// Negative acknowledgment: bumps the retransmission count and either
    /// hands back the stored parameters or, past the budget, releases the
    /// process.
    pub fn nack(&mut self, process_id: u8) -> Option<NackOutcome> {
        let slot = self.processes.get_mut(process_id as usize)?;
        let process = slot.as_mut()?;
        if process.retx_count >= self.max_retx {
            *slot = None;
            return Some(NackOutcome::Dropped);
        }
        process.retx_count += 1;
        Some(NackOutcome::Retransmit(process.clone()))
    }

    /// The stored parameters of an outstanding process.
    pub fn get(&self, process_id: u8) -> Option<&HarqProcess> {
        self.processes.get(process_id as usize)?.as_ref()
    }
}

/// HARQ acknowledgment delivered with a scheduling trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarqFeedback {
    /// Acknowledging UE.
    pub rnti: Rnti,
    /// Process the acknowledgment refers to.
    pub process_id: u8,
    /// `true` for ACK, `false` for NACK.
    pub ack: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_process() -> HarqProcess {
        HarqProcess {
            mcs: 10,
            rbg_mask: 0b11,
            rbg_count: 2,
            tb_size_bytes: 400,
            retx_count: 0,
        }
    }

    #[test]
    fn test_fill_and_release() {
        let mut table = HarqProcessTable::new(2, 3);
        assert_eq!(table.free_process(), Some(0));

        table.start(0, sample_process());
        table.start(1, sample_process());
        assert!(table.is_full());
        assert_eq!(table.free_process(), None);
        assert_eq!(table.outstanding(), 2);

        table.ack(0);
        assert!(!table.is_full());
        assert_eq!(table.free_process(), Some(0));
    }

    #[test]
    fn test_nack_returns_stored_parameters() {
        let mut table = HarqProcessTable::new(8, 3);
        table.start(2, sample_process());

        match table.nack(2) {
            Some(NackOutcome::Retransmit(p)) => {
                assert_eq!(p.mcs, 10);
                assert_eq!(p.tb_size_bytes, 400);
                assert_eq!(p.retx_count, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(table.get(2).unwrap().retx_count, 1);
    }

    #[test]
    fn test_retx_budget_exhaustion() {
        let mut table = HarqProcessTable::new(8, 2);
        table.start(0, sample_process());

        assert!(matches!(table.nack(0), Some(NackOutcome::Retransmit(_))));
        assert!(matches!(table.nack(0), Some(NackOutcome::Retransmit(_))));
        // Third NACK exceeds max_retx = 2: process dropped
        assert!(matches!(table.nack(0), Some(NackOutcome::Dropped)));
        assert!(table.get(0).is_none());
        // Further feedback on the released process is a no-op
        assert_eq!(table.nack(0), None);
    }

    #[test]
    fn test_feedback_on_idle_process() {
        let mut table = HarqProcessTable::new(4, 3);
        assert_eq!(table.nack(1), None);
        table.ack(1); // no-op, no panic
        assert_eq!(table.outstanding(), 0);
    }
}
