//! HARQ Retransmission Interface
//!
//! The scheduler only needs size and process bookkeeping from HARQ: which
//! users have a pending retransmission, how many PRBs the original
//! transmission occupied, and a notification once a retransmission has been
//! scheduled. Soft combining and per-process timers live elsewhere.

use common::types::{Pmi, ProcessId, UeId};
use std::collections::{BTreeMap, BTreeSet};

/// The resource footprint of a transmission awaiting retransmission
#[derive(Debug, Clone)]
pub struct RetransmissionGrant {
    pub process: ProcessId,
    /// PRBs of the original transmission; the retransmission must occupy
    /// exactly as many PRBs (not necessarily the same ones)
    pub prbs: Vec<usize>,
    /// Precoder of the original transmission
    pub pmi: Pmi,
}

/// HARQ-side collaborator queried once per TTI
pub trait HarqManager: Send {
    /// Users with at least one pending retransmission
    fn users_with_retransmissions(&self) -> BTreeSet<UeId>;

    /// The process whose retransmission should be served next
    fn process_with_next_retransmission(&self, user: UeId) -> Option<ProcessId>;

    fn has_retransmission(&self, user: UeId, process: ProcessId, stream: usize) -> bool;

    fn retransmission(
        &self,
        user: UeId,
        process: ProcessId,
        stream: usize,
    ) -> Option<RetransmissionGrant>;

    /// Marks the pending retransmission as scheduled this TTI
    fn retransmission_started(&mut self, user: UeId, process: ProcessId, stream: usize);
}

/// Minimal in-memory HARQ ledger for simulation and tests.
///
/// Tracks one pending retransmission per process; `retransmission_started`
/// clears the entry.
#[derive(Debug, Default)]
pub struct HarqRegistry {
    pending: BTreeMap<UeId, BTreeMap<ProcessId, RetransmissionGrant>>,
}

impl HarqRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a failed transmission for later rescheduling
    pub fn add_pending(&mut self, user: UeId, grant: RetransmissionGrant) {
        self.pending
            .entry(user)
            .or_default()
            .insert(grant.process, grant);
    }

    pub fn has_pending(&self, user: UeId) -> bool {
        self.pending.get(&user).is_some_and(|p| !p.is_empty())
    }
}

impl HarqManager for HarqRegistry {
    fn users_with_retransmissions(&self) -> BTreeSet<UeId> {
        self.pending
            .iter()
            .filter(|(_, processes)| !processes.is_empty())
            .map(|(&user, _)| user)
            .collect()
    }

    fn process_with_next_retransmission(&self, user: UeId) -> Option<ProcessId> {
        self.pending
            .get(&user)
            .and_then(|processes| processes.keys().next().copied())
    }

    fn has_retransmission(&self, user: UeId, process: ProcessId, stream: usize) -> bool {
        // single-stream transport only
        stream == 0
            && self
                .pending
                .get(&user)
                .is_some_and(|processes| processes.contains_key(&process))
    }

    fn retransmission(
        &self,
        user: UeId,
        process: ProcessId,
        stream: usize,
    ) -> Option<RetransmissionGrant> {
        if stream != 0 {
            return None;
        }
        self.pending
            .get(&user)
            .and_then(|processes| processes.get(&process))
            .cloned()
    }

    fn retransmission_started(&mut self, user: UeId, process: ProcessId, _stream: usize) {
        if let Some(processes) = self.pending.get_mut(&user) {
            processes.remove(&process);
        }
    }
}
