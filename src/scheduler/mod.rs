//! The per-TTI MAC scheduler.
//!
//! `MacScheduler` is the provider side of both ports: configuration
//! requests mutate the UE table and answer with confirmations; scheduling
//! reports update the snapshot; each trigger builds a fresh resource map,
//! places mandatory signaling (broadcast, random-access responses,
//! paging) and HARQ retransmissions, hands the remaining resources to the
//! bound allocation strategy, and emits exactly one configuration
//! indication.
//!
//! Determinism is a contract: all keyed state lives in `BTreeMap`s, ties
//! break toward the lower RNTI, and no wall clock or randomness is read.
//! Identical request sequences produce identical indication sequences.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::amc::AmcTables;
use crate::config::{CellConfig, SchedulerConfig};
use crate::models::{
    BroadcastAllocation, BroadcastKind, DlAllocation, DlConfigIndication, DlCqiRecord,
    HarqFeedback, HarqProcess, LogicalChannelContext, NackOutcome, PagingAllocation,
    PhichIndication, RarAllocation, ReservedFor, ResourceMap, UeContext, UlConfigIndication,
    UlCqiRecord, UlGrant, VendorExtensions,
};
use crate::ports::{
    CellConfigConfirmation, CellConfigRequest, ConfigFailure, ConfigResult, ConfigurationUser,
    DlBufferReport, DlCqiReport, DlTriggerRequest, LogicalChannelConfigConfirmation,
    LogicalChannelConfigRequest, LogicalChannelReleaseConfirmation,
    LogicalChannelReleaseRequest, MacCeKind, MacControlElementReport, NoiseInterferenceReport,
    PagingReport, ProtocolError, RachReport, SchedulingRequestReport, SchedulingUser,
    UeConfigConfirmation, UeConfigRequest, UeConfigUpdateIndication, UeReleaseConfirmation,
    UeReleaseRequest, UlCqiReport, UlTriggerRequest,
};
use crate::strategy::{AllocationStrategy, StrategyContext};
use crate::{Rnti, SfnSf};

/// Uplink allocation history retained for deferred CQI attribution, in
/// subframes. Reports referencing older subframes are rejected.
const UL_ALLOCATION_HISTORY: usize = 16;

/// Highest redundancy version index.
const MAX_RV: u8 = 3;

/// A NACKed downlink transport block waiting for resources.
#[derive(Debug, Clone)]
struct PendingRetx {
    rnti: Rnti,
    process_id: u8,
    process: HarqProcess,
}

/// One stored uplink allocation, for attributing a later anonymous CQI
/// measurement back to the transmitting UE.
#[derive(Debug, Clone, Copy)]
struct StoredUlAllocation {
    rnti: Rnti,
    rb_start: usize,
    rb_len: usize,
}

/// Provider side of the configuration and scheduling ports.
pub struct MacScheduler {
    config: SchedulerConfig,
    amc: AmcTables,
    strategy: Box<dyn AllocationStrategy>,
    config_user: Arc<dyn ConfigurationUser>,
    sched_user: Arc<dyn SchedulingUser>,

    cell: Option<CellConfig>,
    rbg_size_prb: u8,
    ues: BTreeMap<Rnti, UeContext>,

    pending_rach: Vec<RachReport>,
    pending_paging: Vec<PagingReport>,
    pending_dl_retx: Vec<PendingRetx>,

    ul_allocations: BTreeMap<SfnSf, Vec<StoredUlAllocation>>,
    last_ul_grant: BTreeMap<Rnti, StoredUlAllocation>,
    noise_interference_dbm: Option<(f64, f64)>,
}

impl MacScheduler {
    /// Creates a scheduler bound to a strategy and its two user sides.
    pub fn new(
        config: SchedulerConfig,
        amc: AmcTables,
        strategy: Box<dyn AllocationStrategy>,
        config_user: Arc<dyn ConfigurationUser>,
        sched_user: Arc<dyn SchedulingUser>,
    ) -> Self {
        Self {
            config,
            amc,
            strategy,
            config_user,
            sched_user,
            cell: None,
            rbg_size_prb: 1,
            ues: BTreeMap::new(),
            pending_rach: Vec::new(),
            pending_paging: Vec::new(),
            pending_dl_retx: Vec::new(),
            ul_allocations: BTreeMap::new(),
            last_ul_grant: BTreeMap::new(),
            noise_interference_dbm: None,
        }
    }

    /// The configured cell, once `configure_cell` has succeeded.
    pub fn cell(&self) -> Option<&CellConfig> {
        self.cell.as_ref()
    }

    /// Attached UE state, for inspection.
    pub fn ue(&self, rnti: Rnti) -> Option<&UeContext> {
        self.ues.get(&rnti)
    }

    /// Number of attached UEs.
    pub fn ue_count(&self) -> usize {
        self.ues.len()
    }

    /// Identifier of the bound strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    // ---- configuration port (provider side) ----

    /// Configures the cell. Valid at most once; reconfiguration requires
    /// tearing the scheduler down.
    pub fn configure_cell(&mut self, req: CellConfigRequest) {
        let result = self.apply_cell_config(&req);
        self.config_user.cell_config_confirmed(CellConfigConfirmation {
            result,
            vendor: req.vendor,
        });
    }

    fn apply_cell_config(&mut self, req: &CellConfigRequest) -> ConfigResult {
        if self.cell.is_some() {
            return ConfigResult::Failure(ConfigFailure::CellAlreadyConfigured);
        }
        let Some(rbg_size) = AmcTables::rbg_size(req.cell.dl_bandwidth_rb) else {
            return ConfigResult::Failure(ConfigFailure::InvalidBandwidth {
                dl_rb: req.cell.dl_bandwidth_rb,
                ul_rb: req.cell.ul_bandwidth_rb,
            });
        };
        if !req.cell.bandwidth_valid() {
            return ConfigResult::Failure(ConfigFailure::InvalidBandwidth {
                dl_rb: req.cell.dl_bandwidth_rb,
                ul_rb: req.cell.ul_bandwidth_rb,
            });
        }
        self.rbg_size_prb = rbg_size;
        self.cell = Some(req.cell.clone());
        ConfigResult::Success
    }

    /// Attaches a new UE, or updates an attached one when `reconfigure`
    /// is set.
    pub fn configure_ue(&mut self, req: UeConfigRequest) {
        let result = self.apply_ue_config(&req);
        if result.is_success() && req.reconfigure {
            self.config_user
                .ue_config_update_indicated(UeConfigUpdateIndication {
                    rnti: req.rnti,
                    transmission_mode: req.capabilities.transmission_mode,
                    vendor: VendorExtensions::new(),
                });
        }
        self.config_user.ue_config_confirmed(UeConfigConfirmation {
            rnti: req.rnti,
            result,
            vendor: req.vendor,
        });
    }

    fn apply_ue_config(&mut self, req: &UeConfigRequest) -> ConfigResult {
        if self.cell.is_none() {
            return ConfigResult::Failure(ConfigFailure::CellNotConfigured);
        }
        if req.capabilities.layer_count().is_none() {
            return ConfigResult::Failure(ConfigFailure::InvalidTransmissionMode(
                req.capabilities.transmission_mode,
            ));
        }
        match (self.ues.get_mut(&req.rnti), req.reconfigure) {
            (Some(ue), true) => {
                ue.capabilities = req.capabilities.clone();
                ConfigResult::Success
            }
            (Some(_), false) => ConfigResult::Failure(ConfigFailure::DuplicateRnti(req.rnti)),
            (None, true) => ConfigResult::Failure(ConfigFailure::UnknownRnti(req.rnti)),
            (None, false) => {
                self.ues.insert(
                    req.rnti,
                    UeContext::new(
                        req.rnti,
                        req.capabilities.clone(),
                        self.config.harq_process_count,
                        self.config.max_harq_retx,
                    ),
                );
                ConfigResult::Success
            }
        }
    }

    /// Adds a logical channel to an attached UE, or updates its QoS when
    /// `reconfigure` is set (queue state survives reconfiguration).
    pub fn configure_logical_channel(&mut self, req: LogicalChannelConfigRequest) {
        let result = self.apply_channel_config(&req);
        self.config_user
            .logical_channel_config_confirmed(LogicalChannelConfigConfirmation {
                rnti: req.rnti,
                lcid: req.lcid,
                result,
                vendor: req.vendor,
            });
    }

    fn apply_channel_config(&mut self, req: &LogicalChannelConfigRequest) -> ConfigResult {
        if self.cell.is_none() {
            return ConfigResult::Failure(ConfigFailure::CellNotConfigured);
        }
        let Some(ue) = self.ues.get_mut(&req.rnti) else {
            return ConfigResult::Failure(ConfigFailure::UnknownRnti(req.rnti));
        };
        match (ue.channels.get_mut(&req.lcid), req.reconfigure) {
            (Some(channel), true) => {
                channel.qos = req.qos;
                ConfigResult::Success
            }
            (Some(_), false) => ConfigResult::Failure(ConfigFailure::DuplicateLogicalChannel {
                rnti: req.rnti,
                lcid: req.lcid,
            }),
            (None, _) => {
                ue.channels
                    .insert(req.lcid, LogicalChannelContext::new(req.lcid, req.qos));
                ConfigResult::Success
            }
        }
    }

    /// Releases logical channels. Idempotent: releasing an absent channel
    /// or an absent UE confirms success and changes nothing.
    pub fn release_logical_channel(&mut self, req: LogicalChannelReleaseRequest) {
        if let Some(ue) = self.ues.get_mut(&req.rnti) {
            for lcid in &req.lcids {
                ue.channels.remove(lcid);
            }
        }
        self.config_user
            .logical_channel_release_confirmed(LogicalChannelReleaseConfirmation {
                rnti: req.rnti,
                lcids: req.lcids,
                result: ConfigResult::Success,
                vendor: req.vendor,
            });
    }

    /// Releases a UE and every trace of it. Idempotent.
    pub fn release_ue(&mut self, req: UeReleaseRequest) {
        self.ues.remove(&req.rnti);
        self.pending_dl_retx.retain(|r| r.rnti != req.rnti);
        self.last_ul_grant.remove(&req.rnti);
        for allocations in self.ul_allocations.values_mut() {
            allocations.retain(|a| a.rnti != req.rnti);
        }
        self.config_user.ue_release_confirmed(UeReleaseConfirmation {
            rnti: req.rnti,
            result: ConfigResult::Success,
            vendor: req.vendor,
        });
    }

    // ---- scheduling port, reports (provider side) ----

    /// Records downlink CQI feedback. Replaces the previous record.
    pub fn report_dl_cqi(&mut self, report: DlCqiReport) {
        let Some(ue) = self.ues.get_mut(&report.rnti) else {
            self.unknown_rnti(report.rnti, "report_dl_cqi");
            return;
        };
        ue.dl_cqi =
            Some(DlCqiRecord::wideband(report.wideband_cqi).with_subband(report.subband_cqi));
    }

    /// Records an RLC buffer report for one logical channel. Within a TTI
    /// the last report wins.
    pub fn report_dl_buffer(&mut self, report: DlBufferReport) {
        let Some(ue) = self.ues.get_mut(&report.rnti) else {
            self.unknown_rnti(report.rnti, "report_dl_buffer");
            return;
        };
        let Some(channel) = ue.channels.get_mut(&report.lcid) else {
            self.sched_user
                .protocol_error_indicated(ProtocolError::UnknownLogicalChannel {
                    rnti: report.rnti,
                    lcid: report.lcid,
                });
            return;
        };
        channel.buffer = report.status;
    }

    /// Queues a paging message for the next downlink trigger.
    pub fn report_paging(&mut self, report: PagingReport) {
        self.pending_paging.push(report);
    }

    /// Queues a detected random-access preamble for a response.
    pub fn report_rach(&mut self, report: RachReport) {
        self.pending_rach.push(report);
    }

    /// Latches a scheduling request; cleared when a grant is issued.
    pub fn report_scheduling_request(&mut self, report: SchedulingRequestReport) {
        let Some(ue) = self.ues.get_mut(&report.rnti) else {
            self.unknown_rnti(report.rnti, "report_scheduling_request");
            return;
        };
        ue.scheduling_request = true;
    }

    /// Applies an uplink MAC control element. Buffer-status elements
    /// refresh the uplink queue estimate through the BSR size table.
    pub fn report_mac_control_element(&mut self, report: MacControlElementReport) {
        let Some(ue) = self.ues.get_mut(&report.rnti) else {
            self.unknown_rnti(report.rnti, "report_mac_control_element");
            return;
        };
        match report.element {
            MacCeKind::BufferStatus { index } => {
                ue.ul_buffer_bytes = self.amc.bsr_index_to_bytes(index);
            }
            // Power headroom is accepted but does not steer allocation
            MacCeKind::PowerHeadroom { .. } => {}
        }
    }

    /// Attributes an anonymous per-RB SINR measurement to the UEs that
    /// transmitted on the referenced subframe, using the stored uplink
    /// allocation.
    pub fn report_ul_cqi(&mut self, report: UlCqiReport) {
        let Some(allocations) = self.ul_allocations.remove(&report.sfn_sf) else {
            self.sched_user
                .protocol_error_indicated(ProtocolError::UnknownUlAllocation {
                    sfn_sf: report.sfn_sf,
                });
            return;
        };
        let ul_bandwidth = self
            .cell
            .as_ref()
            .map(|c| usize::from(c.ul_bandwidth_rb))
            .unwrap_or(report.sinr_db.len());
        for alloc in allocations {
            let Some(ue) = self.ues.get_mut(&alloc.rnti) else {
                continue;
            };
            let record = ue
                .ul_cqi
                .get_or_insert_with(|| UlCqiRecord::unmeasured(ul_bandwidth));
            for rb in alloc.rb_start..alloc.rb_start + alloc.rb_len {
                if let (Some(slot), Some(&sinr)) =
                    (record.sinr_db.get_mut(rb), report.sinr_db.get(rb))
                {
                    *slot = sinr;
                }
            }
            record.age_ttis = 0;
        }
    }

    /// Records the latest uplink noise and interference measurement.
    pub fn report_noise_interference(&mut self, report: NoiseInterferenceReport) {
        self.noise_interference_dbm =
            Some((report.interference_dbm, report.thermal_noise_dbm));
    }

    /// Latest noise/interference measurement, if any.
    pub fn noise_interference(&self) -> Option<(f64, f64)> {
        self.noise_interference_dbm
    }

    // ---- scheduling port, triggers (provider side) ----

    /// Runs the downlink scheduler for one TTI. Always emits exactly one
    /// downlink configuration indication.
    pub fn trigger_downlink(&mut self, req: DlTriggerRequest) {
        let Some(cell) = self.cell.clone() else {
            self.sched_user
                .protocol_error_indicated(ProtocolError::TriggerWhileUnconfigured {
                    sfn_sf: req.sfn_sf,
                });
            self.sched_user.downlink_config_indicated(DlConfigIndication {
                sfn_sf: req.sfn_sf,
                vendor: req.vendor,
                ..Default::default()
            });
            return;
        };

        for ue in self.ues.values_mut() {
            if let Some(cqi) = &mut ue.dl_cqi {
                cqi.age_ttis += 1;
            }
        }

        let rbg_count =
            usize::from(cell.dl_bandwidth_rb).div_ceil(usize::from(self.rbg_size_prb));
        let mut map = ResourceMap::new(rbg_count);
        let mut indication = DlConfigIndication {
            sfn_sf: req.sfn_sf,
            vendor: req.vendor,
            ..Default::default()
        };

        self.place_broadcast(req.sfn_sf, &mut map, &mut indication);
        self.place_rar(&mut map, &mut indication);
        self.place_paging(&mut map, &mut indication);
        self.apply_dl_harq_feedback(&req.harq_feedback);
        self.place_retransmissions(&mut map, &mut indication);

        let requests = {
            let ctx = StrategyContext {
                ues: &self.ues,
                amc: &self.amc,
                config: &self.config,
                rbg_size_prb: self.rbg_size_prb,
            };
            self.strategy.allocate_downlink(&ctx, &mut map)
        };
        for request in requests {
            if let Some(alloc) = self.build_dl_allocation(&request) {
                indication.data.push(alloc);
            }
        }

        self.sched_user.downlink_config_indicated(indication);
    }

    /// Runs the uplink scheduler for one TTI. Always emits exactly one
    /// uplink configuration indication.
    pub fn trigger_uplink(&mut self, req: UlTriggerRequest) {
        let Some(cell) = self.cell.clone() else {
            self.sched_user
                .protocol_error_indicated(ProtocolError::TriggerWhileUnconfigured {
                    sfn_sf: req.sfn_sf,
                });
            self.sched_user.uplink_config_indicated(UlConfigIndication {
                sfn_sf: req.sfn_sf,
                vendor: req.vendor,
                ..Default::default()
            });
            return;
        };

        for ue in self.ues.values_mut() {
            if let Some(cqi) = &mut ue.ul_cqi {
                cqi.age_ttis += 1;
            }
        }

        let mut indication = UlConfigIndication {
            sfn_sf: req.sfn_sf,
            vendor: req.vendor,
            ..Default::default()
        };
        let mut stored = Vec::new();
        let mut map = ResourceMap::new(usize::from(cell.ul_bandwidth_rb));
        let mut retransmitting = BTreeSet::new();

        // PHICH feedback. On a NACK the UE retransmits non-adaptively on
        // its previous allocation, so those resource blocks are claimed in
        // the map before new grants are placed, and the allocation is
        // re-stored under this subframe for later CQI attribution.
        for feedback in &req.harq_feedback {
            if !self.ues.contains_key(&feedback.rnti) {
                self.unknown_rnti(feedback.rnti, "trigger_uplink");
                continue;
            }
            indication.phich.push(PhichIndication {
                rnti: feedback.rnti,
                ack: feedback.ack,
            });
            if !feedback.ack {
                if let Some(&prev) = self.last_ul_grant.get(&feedback.rnti) {
                    for rb in prev.rb_start..prev.rb_start + prev.rb_len {
                        let _ = map.assign(rb, feedback.rnti);
                    }
                    retransmitting.insert(feedback.rnti);
                    stored.push(prev);
                }
            }
        }

        let requests = {
            let ctx = StrategyContext {
                ues: &self.ues,
                amc: &self.amc,
                config: &self.config,
                rbg_size_prb: self.rbg_size_prb,
            };
            self.strategy.allocate_uplink(&ctx, &mut map)
        };
        for request in requests {
            // A UE retransmitting non-adaptively this subframe transmits
            // on its previous blocks only; no fresh grant alongside it.
            if retransmitting.contains(&request.rnti) {
                continue;
            }
            let tb_size = self.amc.tb_size_bytes(request.mcs, request.rb_len as u32);
            if let Some(ue) = self.ues.get_mut(&request.rnti) {
                ue.ul_buffer_bytes = ue.ul_buffer_bytes.saturating_sub(tb_size);
                ue.scheduling_request = false;
            }
            let allocation = StoredUlAllocation {
                rnti: request.rnti,
                rb_start: request.rb_start,
                rb_len: request.rb_len,
            };
            stored.push(allocation);
            self.last_ul_grant.insert(request.rnti, allocation);
            indication.grants.push(UlGrant {
                rnti: request.rnti,
                rb_start: request.rb_start as u8,
                rb_len: request.rb_len as u8,
                mcs: request.mcs,
                tb_size_bytes: tb_size,
                new_data: true,
                vendor: VendorExtensions::new(),
            });
        }

        if !stored.is_empty() {
            self.ul_allocations.insert(req.sfn_sf, stored);
        }
        while self.ul_allocations.len() > UL_ALLOCATION_HISTORY {
            self.ul_allocations.pop_first();
        }

        self.sched_user.uplink_config_indicated(indication);
    }

    // ---- downlink trigger internals ----

    fn place_broadcast(
        &mut self,
        sfn_sf: SfnSf,
        map: &mut ResourceMap,
        indication: &mut DlConfigIndication,
    ) {
        let kind = match crate::subframe_of(sfn_sf) {
            0 => BroadcastKind::MasterInformation,
            5 => BroadcastKind::SystemInformation,
            _ => return,
        };
        if map.reserve(0, ReservedFor::Broadcast).is_ok() {
            indication
                .broadcast
                .push(BroadcastAllocation { kind, rbg_index: 0 });
        }
    }

    fn place_rar(&mut self, map: &mut ResourceMap, indication: &mut DlConfigIndication) {
        let mut deferred = Vec::new();
        for report in self.pending_rach.drain(..) {
            let Some(index) = map.next_free(0) else {
                deferred.push(report);
                continue;
            };
            if map.reserve(index, ReservedFor::RandomAccessResponse).is_err() {
                deferred.push(report);
                continue;
            }
            indication.rar.push(RarAllocation {
                temp_rnti: report.temp_rnti,
                preamble_id: report.preamble_id,
                rbg_index: index,
                ul_grant_bytes: self.config.rar_ul_grant_bytes,
                vendor: report.vendor,
            });
        }
        self.pending_rach = deferred;
    }

    fn place_paging(&mut self, map: &mut ResourceMap, indication: &mut DlConfigIndication) {
        let mut deferred = Vec::new();
        for report in self.pending_paging.drain(..) {
            let Some(index) = map.next_free(0) else {
                deferred.push(report);
                continue;
            };
            if map.reserve(index, ReservedFor::Paging).is_err() {
                deferred.push(report);
                continue;
            }
            indication.paging.push(PagingAllocation {
                rnti: report.rnti,
                rbg_index: index,
                payload_bytes: report.payload_bytes,
                vendor: report.vendor,
            });
        }
        self.pending_paging = deferred;
    }

    fn apply_dl_harq_feedback(&mut self, feedback: &[HarqFeedback]) {
        for fb in feedback {
            let Some(ue) = self.ues.get_mut(&fb.rnti) else {
                self.unknown_rnti(fb.rnti, "trigger_downlink");
                continue;
            };
            if fb.ack {
                ue.dl_harq.ack(fb.process_id);
                continue;
            }
            match ue.dl_harq.nack(fb.process_id) {
                Some(NackOutcome::Retransmit(process)) => {
                    self.pending_dl_retx.push(PendingRetx {
                        rnti: fb.rnti,
                        process_id: fb.process_id,
                        process,
                    });
                }
                // Budget exhausted or unknown process: nothing to place
                Some(NackOutcome::Dropped) | None => {}
            }
        }
    }

    /// Places pending retransmissions before new data runs, preferring
    /// the original RBGs and falling back to any free set of the same
    /// size. Retransmissions that do not fit stay queued for the next
    /// TTI.
    fn place_retransmissions(
        &mut self,
        map: &mut ResourceMap,
        indication: &mut DlConfigIndication,
    ) {
        let mut deferred = Vec::new();
        for retx in std::mem::take(&mut self.pending_dl_retx) {
            if !self.ues.contains_key(&retx.rnti) {
                continue;
            }
            let Some(mask) = place_rbg_set(map, retx.rnti, &retx.process) else {
                deferred.push(retx);
                continue;
            };
            let layers = self
                .ues
                .get(&retx.rnti)
                .and_then(|ue| ue.capabilities.layer_count())
                .unwrap_or(1) as usize;
            // Spread the stored block over the current layer count; the
            // division remainder rides on the first layer so the layers
            // still sum to the original block size.
            let mut tb_size = vec![retx.process.tb_size_bytes / layers as u32; layers];
            if let Some(first) = tb_size.first_mut() {
                *first += retx.process.tb_size_bytes % layers as u32;
            }
            indication.data.push(DlAllocation {
                rnti: retx.rnti,
                rbg_mask: mask,
                mcs: vec![retx.process.mcs; layers],
                tb_size_bytes: tb_size,
                new_data: vec![false; layers],
                redundancy_version: vec![retx.process.retx_count.min(MAX_RV); layers],
                harq_process_id: retx.process_id,
                per_channel_bytes: Vec::new(),
                vendor: VendorExtensions::new(),
            });
        }
        self.pending_dl_retx = deferred;
    }

    /// Turns a strategy pick into a DCI: sizes the transport block,
    /// splits it over the UE's logical channels, decrements their queues,
    /// and claims a HARQ process.
    fn build_dl_allocation(&mut self, request: &crate::strategy::DlDataRequest) -> Option<DlAllocation> {
        let layers = usize::from(
            self.ues
                .get(&request.rnti)?
                .capabilities
                .layer_count()
                .unwrap_or(1),
        );
        let n_prb = request.rbg_indices.len() as u32 * u32::from(self.rbg_size_prb);
        let tb_per_layer = self.amc.tb_size_bytes(request.mcs, n_prb);
        let total = tb_per_layer * layers as u32;
        let mask = mask_of(&request.rbg_indices);
        let ue = self.ues.get_mut(&request.rnti)?;

        // RLC split: GBR channels first, then best effort, LCID order
        // within each class.
        let mut per_channel_bytes = Vec::new();
        let mut remaining = total;
        let mut lcids: Vec<_> = ue.channels.keys().copied().collect();
        lcids.sort_by_key(|lcid| {
            let gbr = ue.channels.get(lcid).map(|c| c.qos.is_gbr).unwrap_or(false);
            (!gbr, *lcid)
        });
        for lcid in lcids {
            if remaining == 0 {
                break;
            }
            let Some(channel) = ue.channels.get_mut(&lcid) else {
                continue;
            };
            let give = channel.buffer.total_bytes().min(remaining);
            if give == 0 {
                continue;
            }
            channel.grant_bytes(give);
            per_channel_bytes.push((lcid, give));
            remaining -= give;
        }

        let process_id = ue.dl_harq.free_process()?;
        ue.dl_harq.start(
            process_id,
            HarqProcess {
                mcs: request.mcs,
                rbg_mask: mask,
                rbg_count: request.rbg_indices.len() as u8,
                tb_size_bytes: total,
                retx_count: 0,
            },
        );

        Some(DlAllocation {
            rnti: request.rnti,
            rbg_mask: mask,
            mcs: vec![request.mcs; layers],
            tb_size_bytes: vec![tb_per_layer; layers],
            new_data: vec![true; layers],
            redundancy_version: vec![0; layers],
            harq_process_id: process_id,
            per_channel_bytes,
            vendor: VendorExtensions::new(),
        })
    }

    fn unknown_rnti(&self, rnti: Rnti, operation: &str) {
        self.sched_user
            .protocol_error_indicated(ProtocolError::UnknownRnti {
                rnti,
                operation: operation.to_owned(),
            });
    }
}

impl fmt::Debug for MacScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacScheduler")
            .field("strategy", &self.strategy.name())
            .field("cell", &self.cell)
            .field("ues", &self.ues.len())
            .finish()
    }
}

/// Claims RBGs for a retransmission: the original bitmap when every bit
/// is still free, otherwise any free set of the same size. Returns the
/// claimed bitmap.
fn place_rbg_set(map: &mut ResourceMap, rnti: Rnti, process: &HarqProcess) -> Option<u32> {
    let original: Vec<usize> = (0..32usize)
        .filter(|&i| process.rbg_mask & (1 << i) != 0)
        .collect();
    let original_free = original
        .iter()
        .all(|&i| i < map.len() && map.slot(i).is_none());
    let slots: Vec<usize> = if original_free {
        original
    } else {
        let mut free = Vec::new();
        let mut cursor = 0;
        while free.len() < usize::from(process.rbg_count) {
            let i = map.next_free(cursor)?;
            free.push(i);
            cursor = i + 1;
        }
        free
    };
    if slots.len() < usize::from(process.rbg_count) {
        return None;
    }
    for &i in &slots {
        // Checked free above within this TTI's map
        map.assign(i, rnti).ok()?;
    }
    Some(mask_of(&slots))
}

fn mask_of(indices: &[usize]) -> u32 {
    indices
        .iter()
        .filter(|&&i| i < 32)
        .fold(0u32, |mask, &i| mask | (1 << i))
}
