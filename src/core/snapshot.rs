//! Immutable view of the manager for one admission cycle.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::index::QueueIndex;
use crate::core::ledger::QuotaLedger;
use crate::core::model::{ClusterQueue, ResourceUsage, WorkloadInfo};
use crate::core::preemption::{PreemptionEngine, Victim};
use crate::core::QueueError;
use crate::util::clock::now_ms;

/// One cluster queue as seen by a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterQueueSnapshot {
    /// Definition at capture time.
    pub spec: ClusterQueue,
    /// Pending workloads in admission order.
    pub pending: Vec<WorkloadInfo>,
    /// Admitted workloads in identity order.
    pub admitted: Vec<WorkloadInfo>,
    /// Per-resource usage.
    pub usage: Vec<ResourceUsage>,
}

/// Consistent copy of every cluster queue plus the quota ledger.
#[derive(Debug, Clone)]
pub struct Snapshot {
    cluster_queues: BTreeMap<String, ClusterQueueSnapshot>,
    ledger: QuotaLedger,
    taken_at_ms: u128,
}

impl Snapshot {
    /// Copy `index` and `ledger`; the caller holds whatever lock keeps them in step.
    pub fn capture(index: &QueueIndex, ledger: &QuotaLedger) -> Self {
        let cluster_queues = index
            .cluster_queues()
            .map(|entry| {
                let name = entry.spec().name.clone();
                let snapshot = ClusterQueueSnapshot {
                    spec: entry.spec().clone(),
                    pending: entry.pending().iter().cloned().collect(),
                    admitted: entry.admitted().values().cloned().collect(),
                    usage: ledger.resource_usage(&name).unwrap_or_default(),
                };
                (name, snapshot)
            })
            .collect();
        Self {
            cluster_queues,
            ledger: ledger.clone(),
            taken_at_ms: now_ms(),
        }
    }

    /// Capture time in milliseconds since epoch.
    pub const fn taken_at_ms(&self) -> u128 {
        self.taken_at_ms
    }

    /// Lookup one cluster queue.
    pub fn cluster_queue(&self, name: &str) -> Option<&ClusterQueueSnapshot> {
        self.cluster_queues.get(name)
    }

    /// Cluster queues in name order.
    pub fn cluster_queues(&self) -> impl Iterator<Item = &ClusterQueueSnapshot> {
        self.cluster_queues.values()
    }

    /// Ledger state at capture time.
    pub const fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Head of every non-empty cluster queue, in cluster queue name order.
    pub fn heads(&self) -> Vec<&WorkloadInfo> {
        self.cluster_queues
            .values()
            .filter_map(|cq| cq.pending.first())
            .collect()
    }

    /// Check whether `workload` fits in its cluster queue as captured.
    pub fn fits(&self, workload: &WorkloadInfo) -> Result<(), QueueError> {
        self.ledger.check(&workload.cluster_queue, &workload.requests)
    }

    /// Victims that would make room for `pending` in `cluster_queue`.
    pub fn compute_victims(&self, pending: &WorkloadInfo, cluster_queue: &str) -> Option<Vec<Victim>> {
        PreemptionEngine::compute_victims(self, pending, cluster_queue)
    }
}
