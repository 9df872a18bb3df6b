//! Local and cluster queue index.
//!
//! The index tracks which local queues feed which cluster queue, the ordered
//! pending workloads of every cluster queue and the admitted workloads each
//! cluster queue is charged for. Workloads whose local queue has not arrived
//! yet are parked in a buffer and resolved when it does.
//!
//! Mutations that change the admitted set take the [`QuotaLedger`] so that
//! `in_use(cq, r)` always equals the sum of admitted requests.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::ledger::QuotaLedger;
use crate::core::model::{
    ClusterQueue, LocalQueue, ObjectKey, Workload, WorkloadInfo, WorkloadState,
};
use crate::core::{ObjectKind, QueueError};
use crate::infra::queue::InMemoryQueue;

/// Index state of one cluster queue.
#[derive(Debug, Clone)]
pub struct ClusterQueueEntry {
    spec: ClusterQueue,
    local_queues: BTreeSet<ObjectKey>,
    pending: InMemoryQueue,
    admitted: BTreeMap<ObjectKey, WorkloadInfo>,
}

impl ClusterQueueEntry {
    fn new(spec: ClusterQueue) -> Self {
        Self {
            spec,
            local_queues: BTreeSet::new(),
            pending: InMemoryQueue::new(),
            admitted: BTreeMap::new(),
        }
    }

    /// Current definition.
    pub const fn spec(&self) -> &ClusterQueue {
        &self.spec
    }

    /// Local queues bound to this cluster queue.
    pub const fn local_queues(&self) -> &BTreeSet<ObjectKey> {
        &self.local_queues
    }

    /// Pending workloads in admission order.
    pub const fn pending(&self) -> &InMemoryQueue {
        &self.pending
    }

    /// Admitted workloads by identity.
    pub const fn admitted(&self) -> &BTreeMap<ObjectKey, WorkloadInfo> {
        &self.admitted
    }
}

#[derive(Debug, Clone)]
struct LocalQueueEntry {
    spec: LocalQueue,
    workloads: BTreeSet<ObjectKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Pending(String),
    Admitted(String),
    Buffered,
}

#[derive(Debug, Clone)]
struct Slot {
    location: Location,
    local_queue: ObjectKey,
}

/// Where an upserted workload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Queued as pending in the named cluster queue.
    Pending(String),
    /// Charged as admitted to the named cluster queue.
    Admitted(String),
    /// Parked until its local queue is known.
    Buffered,
    /// Finished workload removed from the index.
    Removed,
    /// Update for an unknown workload, ignored.
    Ignored,
}

/// A pending workload annotated with its positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// The workload.
    pub info: WorkloadInfo,
    /// Zero-based rank in the cluster queue's total order.
    pub position_in_cluster_queue: usize,
    /// Zero-based rank among workloads of the same local queue.
    pub position_in_local_queue: usize,
}

/// Index of queues and workloads.
#[derive(Debug, Clone, Default)]
pub struct QueueIndex {
    cluster_queues: HashMap<String, ClusterQueueEntry>,
    local_queues: HashMap<ObjectKey, LocalQueueEntry>,
    buffered: BTreeMap<ObjectKey, BTreeMap<ObjectKey, Workload>>,
    slots: HashMap<ObjectKey, Slot>,
}

impl QueueIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cluster queue; duplicates are a conflict.
    pub fn add_cluster_queue(
        &mut self,
        cq: ClusterQueue,
        ledger: &mut QuotaLedger,
    ) -> Result<(), QueueError> {
        if self.cluster_queues.contains_key(&cq.name) {
            return Err(QueueError::Conflict(format!(
                "cluster queue {} already exists",
                cq.name
            )));
        }
        ledger.upsert_cluster_queue(&cq)?;
        self.cluster_queues
            .insert(cq.name.clone(), ClusterQueueEntry::new(cq));
        Ok(())
    }

    /// Replace the definition of a cluster queue, keeping its workloads.
    pub fn update_cluster_queue(
        &mut self,
        cq: ClusterQueue,
        ledger: &mut QuotaLedger,
    ) -> Result<(), QueueError> {
        let entry = self
            .cluster_queues
            .get_mut(&cq.name)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, &cq.name))?;
        ledger.upsert_cluster_queue(&cq)?;
        entry.spec = cq;
        Ok(())
    }

    /// Remove a cluster queue.
    ///
    /// Without `force` the queue must have no bound local queues and no
    /// admitted workloads. With `force` its local queues go too; their pending
    /// workloads are buffered and admitted ones are forgotten.
    pub fn delete_cluster_queue(
        &mut self,
        name: &str,
        force: bool,
        ledger: &mut QuotaLedger,
    ) -> Result<(), QueueError> {
        let entry = self
            .cluster_queues
            .get(name)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, name))?;
        if !force && (!entry.local_queues.is_empty() || !entry.admitted.is_empty()) {
            return Err(QueueError::Conflict(format!(
                "cluster queue {name} still has {} local queues and {} admitted workloads",
                entry.local_queues.len(),
                entry.admitted.len()
            )));
        }
        for lq in entry.local_queues.clone() {
            self.delete_local_queue(&lq, true)?;
        }
        if let Some(entry) = self.cluster_queues.remove(name) {
            for key in entry.admitted.keys() {
                self.forget(key);
            }
        }
        ledger.remove_cluster_queue(name);
        Ok(())
    }

    /// Register a local queue bound to a known cluster queue.
    ///
    /// Buffered workloads waiting for this local queue are resolved; the number
    /// of resolved workloads is returned.
    pub fn add_local_queue(
        &mut self,
        lq: LocalQueue,
        ledger: &mut QuotaLedger,
    ) -> Result<usize, QueueError> {
        let key = lq.key();
        if self.local_queues.contains_key(&key) {
            return Err(QueueError::Conflict(format!("local queue {key} already exists")));
        }
        let cq = self.cluster_queues.get_mut(&lq.cluster_queue).ok_or_else(|| {
            QueueError::Conflict(format!(
                "local queue {key} references unknown cluster queue {}",
                lq.cluster_queue
            ))
        })?;
        cq.local_queues.insert(key.clone());

        // Admitted workloads may outlive a forced delete of their queue.
        let workloads = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.local_queue == key)
            .map(|(k, _)| k.clone())
            .collect();
        self.local_queues
            .insert(key.clone(), LocalQueueEntry { spec: lq, workloads });

        let waiting = self.buffered.remove(&key).unwrap_or_default();
        let resolved = waiting.len();
        for (_, workload) in waiting {
            self.add_or_update_workload(workload, true, ledger)?;
        }
        Ok(resolved)
    }

    /// Rebind a local queue; pending workloads follow it.
    pub fn update_local_queue(&mut self, lq: LocalQueue) -> Result<(), QueueError> {
        let key = lq.key();
        let old_cq = self
            .local_queues
            .get(&key)
            .map(|e| e.spec.cluster_queue.clone())
            .ok_or_else(|| QueueError::not_found(ObjectKind::LocalQueue, key.to_string()))?;
        if old_cq == lq.cluster_queue {
            return Ok(());
        }
        if !self.cluster_queues.contains_key(&lq.cluster_queue) {
            return Err(QueueError::Conflict(format!(
                "local queue {key} references unknown cluster queue {}",
                lq.cluster_queue
            )));
        }

        let moved = self
            .cluster_queues
            .get_mut(&old_cq)
            .map(|entry| {
                entry.local_queues.remove(&key);
                entry.pending.extract_if(|info| info.local_queue_key() == key)
            })
            .unwrap_or_default();
        if let Some(entry) = self.cluster_queues.get_mut(&lq.cluster_queue) {
            entry.local_queues.insert(key.clone());
            for mut info in moved {
                info.cluster_queue.clone_from(&lq.cluster_queue);
                if let Some(slot) = self.slots.get_mut(&info.key) {
                    slot.location = Location::Pending(lq.cluster_queue.clone());
                }
                entry.pending.push(info);
            }
        }
        if let Some(entry) = self.local_queues.get_mut(&key) {
            entry.spec = lq;
        }
        Ok(())
    }

    /// Remove a local queue.
    ///
    /// Without `force` the queue must be empty. With `force` its pending
    /// workloads are buffered until the queue returns; admitted workloads stay
    /// charged to their cluster queue.
    pub fn delete_local_queue(&mut self, key: &ObjectKey, force: bool) -> Result<(), QueueError> {
        let entry = self
            .local_queues
            .get(key)
            .ok_or_else(|| QueueError::not_found(ObjectKind::LocalQueue, key.to_string()))?;
        if !force && !entry.workloads.is_empty() {
            return Err(QueueError::Conflict(format!(
                "local queue {key} still has {} workloads",
                entry.workloads.len()
            )));
        }
        let Some(entry) = self.local_queues.remove(key) else {
            return Ok(());
        };
        let Some(cq) = self.cluster_queues.get_mut(&entry.spec.cluster_queue) else {
            return Ok(());
        };
        cq.local_queues.remove(key);
        for info in cq.pending.extract_if(|info| info.local_queue_key() == *key) {
            if let Some(slot) = self.slots.get_mut(&info.key) {
                slot.location = Location::Buffered;
            }
            self.buffered
                .entry(key.clone())
                .or_default()
                .insert(info.key.clone(), info.to_workload());
        }
        Ok(())
    }

    /// Insert or replace a workload keyed by its identity.
    ///
    /// An unknown local queue buffers the workload when `buffer_unresolved` is
    /// set and is a conflict otherwise. A finished workload is removed.
    pub fn add_or_update_workload(
        &mut self,
        workload: Workload,
        buffer_unresolved: bool,
        ledger: &mut QuotaLedger,
    ) -> Result<Placement, QueueError> {
        workload.validate()?;
        let key = workload.key();
        if workload.state == WorkloadState::Finished {
            self.delete_workload(&key, ledger);
            return Ok(Placement::Removed);
        }

        let lq_key = workload.local_queue_key();
        let Some(cq_name) = self
            .local_queues
            .get(&lq_key)
            .map(|e| e.spec.cluster_queue.clone())
        else {
            if !buffer_unresolved {
                return Err(QueueError::Conflict(format!(
                    "workload {key} references unknown local queue {lq_key}"
                )));
            }
            self.delete_workload(&key, ledger);
            self.buffered
                .entry(lq_key.clone())
                .or_default()
                .insert(key.clone(), workload);
            self.slots.insert(
                key,
                Slot {
                    location: Location::Buffered,
                    local_queue: lq_key,
                },
            );
            return Ok(Placement::Buffered);
        };

        let info = WorkloadInfo::new(&workload, &cq_name);
        if let Some(current) = self.admitted_info_mut(&key, &cq_name) {
            if info.state == WorkloadState::Admitted && current.requests == info.requests {
                *current = info;
                return Ok(Placement::Admitted(cq_name));
            }
        }

        self.delete_workload(&key, ledger);
        let location = match info.state {
            WorkloadState::Admitted => {
                if let Err(denied) = ledger.check(&cq_name, &info.requests) {
                    tracing::warn!(workload = %key, error = %denied, "admitted workload overcommits its cluster queue");
                }
                ledger.charge(&cq_name, &info.requests)?;
                self.entry_mut(&cq_name)?.admitted.insert(key.clone(), info);
                Location::Admitted(cq_name.clone())
            }
            _ => {
                self.entry_mut(&cq_name)?.pending.push(info);
                Location::Pending(cq_name.clone())
            }
        };
        if let Some(lq) = self.local_queues.get_mut(&lq_key) {
            lq.workloads.insert(key.clone());
        }
        let placement = match &location {
            Location::Admitted(cq) => Placement::Admitted(cq.clone()),
            _ => Placement::Pending(cq_name),
        };
        self.slots.insert(
            key,
            Slot {
                location,
                local_queue: lq_key,
            },
        );
        Ok(placement)
    }

    /// Like [`Self::add_or_update_workload`] but a no-op for unknown workloads.
    pub fn update_workload(
        &mut self,
        workload: Workload,
        buffer_unresolved: bool,
        ledger: &mut QuotaLedger,
    ) -> Result<Placement, QueueError> {
        if !self.slots.contains_key(&workload.key()) {
            return Ok(Placement::Ignored);
        }
        self.add_or_update_workload(workload, buffer_unresolved, ledger)
    }

    /// Remove a workload, releasing its quota if admitted.
    ///
    /// Returns false when the workload was unknown.
    pub fn delete_workload(&mut self, key: &ObjectKey, ledger: &mut QuotaLedger) -> bool {
        let Some(slot) = self.slots.remove(key) else {
            return false;
        };
        match &slot.location {
            Location::Pending(cq) => {
                if let Some(entry) = self.cluster_queues.get_mut(cq) {
                    entry.pending.remove(key);
                }
            }
            Location::Admitted(cq) => {
                let info = self
                    .cluster_queues
                    .get_mut(cq)
                    .and_then(|entry| entry.admitted.remove(key));
                if let Some(info) = info {
                    if let Err(err) = ledger.release(cq, &info.requests) {
                        tracing::warn!(workload = %key, error = %err, "failed to release quota");
                    }
                }
            }
            Location::Buffered => {
                if let Some(waiting) = self.buffered.get_mut(&slot.local_queue) {
                    waiting.remove(key);
                    if waiting.is_empty() {
                        self.buffered.remove(&slot.local_queue);
                    }
                }
            }
        }
        if let Some(lq) = self.local_queues.get_mut(&slot.local_queue) {
            lq.workloads.remove(key);
        }
        true
    }

    /// Reserve quota for a pending workload and mark it admitted.
    pub fn admit_workload(&mut self, key: &ObjectKey, ledger: &mut QuotaLedger) -> Result<String, QueueError> {
        let slot = self
            .slots
            .get(key)
            .ok_or_else(|| QueueError::not_found(ObjectKind::Workload, key.to_string()))?;
        let Location::Pending(cq_name) = slot.location.clone() else {
            return Err(QueueError::Conflict(format!("workload {key} is not pending")));
        };
        let entry = self.entry_mut(&cq_name)?;
        let requests = entry
            .pending
            .get(key)
            .map(|info| info.requests.clone())
            .ok_or_else(|| QueueError::not_found(ObjectKind::Workload, key.to_string()))?;
        ledger.reserve(&cq_name, &requests)?;

        let entry = self.entry_mut(&cq_name)?;
        if let Some(mut info) = entry.pending.remove(key) {
            info.state = WorkloadState::Admitted;
            entry.admitted.insert(key.clone(), info);
        }
        if let Some(slot) = self.slots.get_mut(key) {
            slot.location = Location::Admitted(cq_name.clone());
        }
        Ok(cq_name)
    }

    /// A window of the pending order of `cluster_queue`.
    ///
    /// Both positions come from the same pass over the total order, so the
    /// local numbering is always the global numbering restricted to one queue.
    pub fn pending_workloads(
        &self,
        cluster_queue: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<PendingEntry>, QueueError> {
        let entry = self.entry(cluster_queue)?;
        let mut per_local: HashMap<ObjectKey, usize> = HashMap::new();
        Ok(entry
            .pending
            .iter()
            .enumerate()
            .map(|(global, info)| {
                let local = per_local.entry(info.local_queue_key()).or_insert(0);
                let position_in_local_queue = *local;
                *local += 1;
                PendingEntry {
                    info: info.clone(),
                    position_in_cluster_queue: global,
                    position_in_local_queue,
                }
            })
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// A window of the pending order restricted to one local queue.
    pub fn pending_workloads_in_local_queue(
        &self,
        local_queue: &ObjectKey,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<PendingEntry>, QueueError> {
        let lq = self
            .local_queues
            .get(local_queue)
            .ok_or_else(|| QueueError::not_found(ObjectKind::LocalQueue, local_queue.to_string()))?;
        let entry = self.entry(&lq.spec.cluster_queue)?;
        Ok(entry
            .pending
            .iter()
            .enumerate()
            .filter(|(_, info)| info.local_queue_key() == *local_queue)
            .enumerate()
            .map(|(local, (global, info))| PendingEntry {
                info: info.clone(),
                position_in_cluster_queue: global,
                position_in_local_queue: local,
            })
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// Head of every non-empty cluster queue, in cluster queue name order.
    pub fn heads(&self) -> Vec<WorkloadInfo> {
        let mut heads: Vec<WorkloadInfo> = self
            .cluster_queues
            .values()
            .filter_map(|e| e.pending.head().cloned())
            .collect();
        heads.sort_by(|a, b| a.cluster_queue.cmp(&b.cluster_queue));
        heads
    }

    /// Lookup a cluster queue entry.
    pub fn cluster_queue(&self, name: &str) -> Option<&ClusterQueueEntry> {
        self.cluster_queues.get(name)
    }

    /// All cluster queue entries.
    pub fn cluster_queues(&self) -> impl Iterator<Item = &ClusterQueueEntry> {
        self.cluster_queues.values()
    }

    /// Definition of a local queue.
    pub fn local_queue(&self, key: &ObjectKey) -> Option<&LocalQueue> {
        self.local_queues.get(key).map(|e| &e.spec)
    }

    /// Identities of all local queues.
    pub fn local_queue_keys(&self) -> Vec<ObjectKey> {
        self.local_queues.keys().cloned().collect()
    }

    /// Identities of all known workloads, buffered ones included.
    pub fn workload_keys(&self) -> Vec<ObjectKey> {
        self.slots.keys().cloned().collect()
    }

    /// Local queues that buffered workloads are waiting for.
    pub fn awaited_local_queues(&self) -> Vec<ObjectKey> {
        self.buffered.keys().cloned().collect()
    }

    /// Drop every workload buffered for `local_queue`; returns how many.
    pub fn discard_buffered(&mut self, local_queue: &ObjectKey) -> usize {
        let Some(waiting) = self.buffered.remove(local_queue) else {
            return 0;
        };
        for key in waiting.keys() {
            self.slots.remove(key);
        }
        waiting.len()
    }

    /// Number of buffered workloads.
    pub fn buffered_len(&self) -> usize {
        self.buffered.values().map(BTreeMap::len).sum()
    }

    /// True when the workload is known in any state.
    pub fn contains_workload(&self, key: &ObjectKey) -> bool {
        self.slots.contains_key(key)
    }

    fn entry(&self, name: &str) -> Result<&ClusterQueueEntry, QueueError> {
        self.cluster_queues
            .get(name)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, name))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut ClusterQueueEntry, QueueError> {
        self.cluster_queues
            .get_mut(name)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, name))
    }

    fn admitted_info_mut(&mut self, key: &ObjectKey, cq: &str) -> Option<&mut WorkloadInfo> {
        match self.slots.get(key).map(|s| &s.location) {
            Some(Location::Admitted(current)) if current == cq => self
                .cluster_queues
                .get_mut(cq)
                .and_then(|e| e.admitted.get_mut(key)),
            _ => None,
        }
    }

    fn forget(&mut self, key: &ObjectKey) {
        if let Some(slot) = self.slots.remove(key) {
            if let Some(lq) = self.local_queues.get_mut(&slot.local_queue) {
                lq.workloads.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::quantity::{resource_list, Quantity};

    fn setup() -> (QueueIndex, QuotaLedger) {
        let mut index = QueueIndex::new();
        let mut ledger = QuotaLedger::new();
        index
            .add_cluster_queue(
                ClusterQueue::new("cq").with_quota("cpu", Quantity::from_units(10)),
                &mut ledger,
            )
            .unwrap();
        index
            .add_local_queue(lq("lq-a", "cq"), &mut ledger)
            .unwrap();
        (index, ledger)
    }

    fn lq(name: &str, cq: &str) -> LocalQueue {
        LocalQueue {
            namespace: "ns".into(),
            name: name.into(),
            cluster_queue: cq.into(),
        }
    }

    fn wl(name: &str, queue: &str, priority: i32, created: u128, cpu: &str) -> Workload {
        Workload {
            namespace: "ns".into(),
            name: name.into(),
            queue_name: queue.into(),
            priority,
            created_at_ms: created,
            requests: resource_list([("cpu", cpu)]).unwrap(),
            state: WorkloadState::Pending,
        }
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("ns", name)
    }

    #[test]
    fn duplicate_queues_conflict() {
        let (mut index, mut ledger) = setup();
        assert!(matches!(
            index.add_cluster_queue(ClusterQueue::new("cq"), &mut ledger),
            Err(QueueError::Conflict(_))
        ));
        assert!(matches!(
            index.add_local_queue(lq("lq-a", "cq"), &mut ledger),
            Err(QueueError::Conflict(_))
        ));
    }

    #[test]
    fn local_queue_requires_known_cluster_queue() {
        let (mut index, mut ledger) = setup();
        assert!(matches!(
            index.add_local_queue(lq("lq-x", "missing"), &mut ledger),
            Err(QueueError::Conflict(_))
        ));
    }

    #[test]
    fn upsert_is_idempotent() {
        let (mut index, mut ledger) = setup();
        let w = wl("a", "lq-a", 1, 10, "1");
        index.add_or_update_workload(w.clone(), true, &mut ledger).unwrap();
        index.add_or_update_workload(w, true, &mut ledger).unwrap();
        assert_eq!(index.cluster_queue("cq").unwrap().pending().len(), 1);
    }

    #[test]
    fn positions_interleave_local_queues() {
        let (mut index, mut ledger) = setup();
        index.add_local_queue(lq("lq-b", "cq"), &mut ledger).unwrap();
        for w in [
            wl("a-high", "lq-a", 100, 1, "1"),
            wl("a-low", "lq-a", 50, 1, "1"),
            wl("b-high", "lq-b", 100, 2, "1"),
            wl("b-low", "lq-b", 50, 2, "1"),
        ] {
            index.add_or_update_workload(w, true, &mut ledger).unwrap();
        }
        let got: Vec<(String, usize, usize)> = index
            .pending_workloads("cq", 0, 10)
            .unwrap()
            .into_iter()
            .map(|e| (e.info.key.name, e.position_in_cluster_queue, e.position_in_local_queue))
            .collect();
        assert_eq!(
            got,
            vec![
                ("a-high".to_string(), 0, 0),
                ("b-high".to_string(), 1, 0),
                ("a-low".to_string(), 2, 1),
                ("b-low".to_string(), 3, 1),
            ]
        );

        let in_b = index
            .pending_workloads_in_local_queue(&key("lq-b"), 0, 10)
            .unwrap();
        assert_eq!(in_b.len(), 2);
        assert_eq!(in_b[1].position_in_cluster_queue, 3);
        assert_eq!(in_b[1].position_in_local_queue, 1);
    }

    #[test]
    fn offset_beyond_length_is_empty() {
        let (mut index, mut ledger) = setup();
        index
            .add_or_update_workload(wl("a", "lq-a", 1, 1, "1"), true, &mut ledger)
            .unwrap();
        assert!(index.pending_workloads("cq", 5, 10).unwrap().is_empty());
    }

    #[test]
    fn buffered_workload_resolves_when_queue_arrives() {
        let (mut index, mut ledger) = setup();
        let placement = index
            .add_or_update_workload(wl("early", "lq-late", 1, 1, "1"), true, &mut ledger)
            .unwrap();
        assert_eq!(placement, Placement::Buffered);
        assert_eq!(index.buffered_len(), 1);

        let resolved = index.add_local_queue(lq("lq-late", "cq"), &mut ledger).unwrap();
        assert_eq!(resolved, 1);
        assert_eq!(index.buffered_len(), 0);
        assert!(index.cluster_queue("cq").unwrap().pending().contains(&key("early")));
    }

    #[test]
    fn unresolved_workload_conflicts_without_buffering() {
        let (mut index, mut ledger) = setup();
        let err = index
            .add_or_update_workload(wl("early", "lq-late", 1, 1, "1"), false, &mut ledger)
            .unwrap_err();
        assert!(matches!(err, QueueError::Conflict(_)));
        assert!(!index.contains_workload(&key("early")));
    }

    #[test]
    fn admitted_upsert_charges_and_delete_releases() {
        let (mut index, mut ledger) = setup();
        let mut w = wl("a", "lq-a", 1, 1, "4");
        w.state = WorkloadState::Admitted;
        index.add_or_update_workload(w.clone(), true, &mut ledger).unwrap();
        index.add_or_update_workload(w, true, &mut ledger).unwrap();
        assert_eq!(ledger.record("cq").unwrap().usage("cpu"), Quantity::from_units(4));

        assert!(index.delete_workload(&key("a"), &mut ledger));
        assert_eq!(ledger.record("cq").unwrap().usage("cpu"), Quantity::ZERO);
        assert!(!index.delete_workload(&key("a"), &mut ledger));
    }

    #[test]
    fn requeue_after_eviction_releases_quota() {
        let (mut index, mut ledger) = setup();
        index
            .add_or_update_workload(wl("a", "lq-a", 1, 1, "4"), true, &mut ledger)
            .unwrap();
        index.admit_workload(&key("a"), &mut ledger).unwrap();
        assert_eq!(ledger.record("cq").unwrap().usage("cpu"), Quantity::from_units(4));

        index
            .add_or_update_workload(wl("a", "lq-a", 1, 1, "4"), true, &mut ledger)
            .unwrap();
        assert_eq!(ledger.record("cq").unwrap().usage("cpu"), Quantity::ZERO);
        assert!(index.cluster_queue("cq").unwrap().pending().contains(&key("a")));
    }

    #[test]
    fn admit_denied_leaves_workload_pending() {
        let (mut index, mut ledger) = setup();
        index
            .add_or_update_workload(wl("big", "lq-a", 1, 1, "11"), true, &mut ledger)
            .unwrap();
        assert!(matches!(
            index.admit_workload(&key("big"), &mut ledger),
            Err(QueueError::Denied { .. })
        ));
        assert!(index.cluster_queue("cq").unwrap().pending().contains(&key("big")));
    }

    #[test]
    fn delete_local_queue_respects_force() {
        let (mut index, mut ledger) = setup();
        index
            .add_or_update_workload(wl("a", "lq-a", 1, 1, "1"), true, &mut ledger)
            .unwrap();
        assert!(matches!(
            index.delete_local_queue(&key("lq-a"), false),
            Err(QueueError::Conflict(_))
        ));
        index.delete_local_queue(&key("lq-a"), true).unwrap();
        assert_eq!(index.buffered_len(), 1);
        assert!(matches!(
            index.delete_local_queue(&key("lq-a"), true),
            Err(QueueError::NotFound { .. })
        ));
    }

    #[test]
    fn update_local_queue_moves_pending_workloads() {
        let (mut index, mut ledger) = setup();
        index
            .add_cluster_queue(ClusterQueue::new("other"), &mut ledger)
            .unwrap();
        index
            .add_or_update_workload(wl("a", "lq-a", 1, 1, "1"), true, &mut ledger)
            .unwrap();
        index.update_local_queue(lq("lq-a", "other")).unwrap();
        assert!(index.cluster_queue("cq").unwrap().pending().is_empty());
        let moved = index.cluster_queue("other").unwrap().pending().head().unwrap();
        assert_eq!(moved.cluster_queue, "other");
    }

    #[test]
    fn delete_cluster_queue_with_dependents() {
        let (mut index, mut ledger) = setup();
        assert!(matches!(
            index.delete_cluster_queue("cq", false, &mut ledger),
            Err(QueueError::Conflict(_))
        ));
        index.delete_cluster_queue("cq", true, &mut ledger).unwrap();
        assert!(index.cluster_queue("cq").is_none());
        assert!(index.local_queue(&key("lq-a")).is_none());
        assert!(ledger.record("cq").is_none());
    }

    #[test]
    fn update_of_unknown_workload_is_ignored() {
        let (mut index, mut ledger) = setup();
        let placement = index
            .update_workload(wl("ghost", "lq-a", 1, 1, "1"), true, &mut ledger)
            .unwrap();
        assert_eq!(placement, Placement::Ignored);
        assert!(!index.contains_workload(&key("ghost")));
    }
}
