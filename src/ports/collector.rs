//! In-memory implementation of both port user sides.
//!
//! The surrounding discrete-event simulation (and the test suite) injects
//! an `EventCollector` into the scheduler and drains the confirmations
//! and indications it accumulated after each event. Everything runs on a
//! single thread of control; the mutex only satisfies the `Send + Sync`
//! bounds of the user traits.

use std::sync::Mutex;

use super::config_port::{
    CellConfigConfirmation, ConfigurationUser, LogicalChannelConfigConfirmation,
    LogicalChannelReleaseConfirmation, UeConfigConfirmation, UeConfigUpdateIndication,
    UeReleaseConfirmation,
};
use super::sched_port::{ProtocolError, SchedulingUser};
use crate::models::{DlConfigIndication, UlConfigIndication};

/// Everything a scheduler can emit through its two user-side ports.
#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    CellConfigConfirmed(CellConfigConfirmation),
    UeConfigConfirmed(UeConfigConfirmation),
    UeConfigUpdateIndicated(UeConfigUpdateIndication),
    UeReleaseConfirmed(UeReleaseConfirmation),
    LogicalChannelConfigConfirmed(LogicalChannelConfigConfirmation),
    LogicalChannelReleaseConfirmed(LogicalChannelReleaseConfirmation),
    DownlinkConfigIndicated(DlConfigIndication),
    UplinkConfigIndicated(UlConfigIndication),
    ProtocolErrorIndicated(ProtocolError),
}

/// Accumulates port events in emission order.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<PortEvent>>,
}

impl EventCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: PortEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Takes all accumulated events, oldest first.
    pub fn drain(&self) -> Vec<PortEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }

    /// Number of accumulated events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether no events are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Downlink indications among the pending events (without draining).
    pub fn dl_indications(&self) -> Vec<DlConfigIndication> {
        self.filtered(|e| match e {
            PortEvent::DownlinkConfigIndicated(ind) => Some(ind.clone()),
            _ => None,
        })
    }

    /// Uplink indications among the pending events (without draining).
    pub fn ul_indications(&self) -> Vec<UlConfigIndication> {
        self.filtered(|e| match e {
            PortEvent::UplinkConfigIndicated(ind) => Some(ind.clone()),
            _ => None,
        })
    }

    /// Protocol errors among the pending events (without draining).
    pub fn protocol_errors(&self) -> Vec<ProtocolError> {
        self.filtered(|e| match e {
            PortEvent::ProtocolErrorIndicated(err) => Some(err.clone()),
            _ => None,
        })
    }

    fn filtered<T>(&self, f: impl Fn(&PortEvent) -> Option<T>) -> Vec<T> {
        match self.events.lock() {
            Ok(events) => events.iter().filter_map(f).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl ConfigurationUser for EventCollector {
    fn cell_config_confirmed(&self, cnf: CellConfigConfirmation) {
        self.record(PortEvent::CellConfigConfirmed(cnf));
    }

    fn ue_config_confirmed(&self, cnf: UeConfigConfirmation) {
        self.record(PortEvent::UeConfigConfirmed(cnf));
    }

    fn ue_config_update_indicated(&self, ind: UeConfigUpdateIndication) {
        self.record(PortEvent::UeConfigUpdateIndicated(ind));
    }

    fn ue_release_confirmed(&self, cnf: UeReleaseConfirmation) {
        self.record(PortEvent::UeReleaseConfirmed(cnf));
    }

    fn logical_channel_config_confirmed(&self, cnf: LogicalChannelConfigConfirmation) {
        self.record(PortEvent::LogicalChannelConfigConfirmed(cnf));
    }

    fn logical_channel_release_confirmed(&self, cnf: LogicalChannelReleaseConfirmation) {
        self.record(PortEvent::LogicalChannelReleaseConfirmed(cnf));
    }
}

impl SchedulingUser for EventCollector {
    fn downlink_config_indicated(&self, ind: DlConfigIndication) {
        self.record(PortEvent::DownlinkConfigIndicated(ind));
    }

    fn uplink_config_indicated(&self, ind: UlConfigIndication) {
        self.record(PortEvent::UplinkConfigIndicated(ind));
    }

    fn protocol_error_indicated(&self, err: ProtocolError) {
        self.record(PortEvent::ProtocolErrorIndicated(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VendorExtensions;
    use crate::ports::config_port::ConfigResult;

    #[test]
    fn test_events_kept_in_emission_order() {
        let collector = EventCollector::new();
        collector.cell_config_confirmed(CellConfigConfirmation {
            result: ConfigResult::Success,
            vendor: VendorExtensions::new(),
        });
        collector.downlink_config_indicated(DlConfigIndication::default());

        let events = collector.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], PortEvent::CellConfigConfirmed(_)));
        assert!(matches!(events[1], PortEvent::DownlinkConfigIndicated(_)));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_filtered_views() {
        let collector = EventCollector::new();
        collector.downlink_config_indicated(DlConfigIndication::default());
        collector.uplink_config_indicated(UlConfigIndication::default());
        collector.protocol_error_indicated(ProtocolError::TriggerWhileUnconfigured { sfn_sf: 1 });

        assert_eq!(collector.dl_indications().len(), 1);
        assert_eq!(collector.ul_indications().len(), 1);
        assert_eq!(collector.protocol_errors().len(), 1);
        // Views do not drain
        assert_eq!(collector.len(), 3);
    }
}
