//! Visibility request/response models.
//!
//! Thin, serde-friendly wrappers over the manager's read-only queries.

use serde::{Deserialize, Serialize};

use crate::core::{PendingEntry, Priority, QueueManager, QueueResult, ResourceUsage};

/// Optional window of a pending-workloads query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWorkloadOptions {
    /// Entries to skip; defaults to the manager's configured offset.
    #[serde(default)]
    pub offset: Option<usize>,
    /// Maximum entries to return; defaults to the manager's configured limit.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One pending workload as shown to visibility callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWorkload {
    /// Workload namespace.
    pub namespace: String,
    /// Workload name.
    pub name: String,
    /// Local queue the workload was submitted to.
    pub local_queue_name: String,
    /// Priority.
    pub priority: Priority,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Rank in the cluster queue.
    pub position_in_cluster_queue: usize,
    /// Rank in the local queue.
    pub position_in_local_queue: usize,
}

impl From<PendingEntry> for PendingWorkload {
    fn from(entry: PendingEntry) -> Self {
        Self {
            namespace: entry.info.key.namespace,
            name: entry.info.key.name,
            local_queue_name: entry.info.local_queue,
            priority: entry.info.priority,
            created_at_ms: entry.info.created_at_ms,
            position_in_cluster_queue: entry.position_in_cluster_queue,
            position_in_local_queue: entry.position_in_local_queue,
        }
    }
}

/// Response of a pending-workloads query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWorkloadsSummary {
    /// Entries in admission order.
    pub items: Vec<PendingWorkload>,
}

/// Resource usage of one cluster queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterQueueUsageSummary {
    /// Cluster queue name.
    pub name: String,
    /// Pending workloads.
    pub pending_workloads: usize,
    /// Admitted workloads.
    pub admitted_workloads: usize,
    /// Per-resource totals.
    pub resources: Vec<ResourceUsage>,
}

/// Pending workloads of a cluster queue.
pub fn pending_workloads_in_cluster_queue(
    manager: &QueueManager,
    cluster_queue: &str,
    opts: PendingWorkloadOptions,
) -> QueueResult<PendingWorkloadsSummary> {
    let (offset, limit) = manager.config().resolve_window(opts.offset, opts.limit);
    let items = manager
        .pending_workloads(cluster_queue, offset, limit)?
        .into_iter()
        .map(PendingWorkload::from)
        .collect();
    Ok(PendingWorkloadsSummary { items })
}

/// Pending workloads of a local queue.
pub fn pending_workloads_in_local_queue(
    manager: &QueueManager,
    namespace: &str,
    name: &str,
    opts: PendingWorkloadOptions,
) -> QueueResult<PendingWorkloadsSummary> {
    let (offset, limit) = manager.config().resolve_window(opts.offset, opts.limit);
    let items = manager
        .pending_workloads_in_local_queue(namespace, name, offset, limit)?
        .into_iter()
        .map(PendingWorkload::from)
        .collect();
    Ok(PendingWorkloadsSummary { items })
}

/// Usage summary of a cluster queue.
pub fn cluster_queue_usage(
    manager: &QueueManager,
    cluster_queue: &str,
) -> QueueResult<ClusterQueueUsageSummary> {
    let (pending_workloads, admitted_workloads) = manager.workload_counts(cluster_queue)?;
    Ok(ClusterQueueUsageSummary {
        name: cluster_queue.to_string(),
        pending_workloads,
        admitted_workloads,
        resources: manager.resource_usage(cluster_queue)?,
    })
}
