//! Value objects for queues, workloads and preemption policy.
//!
//! These are already-materialized objects as delivered by the object-store
//! watch layer; the core never mutates them in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::QueueError;
use crate::util::quantity::{validate_resources, Quantity, ResourceList};

/// Workload priority; higher is more important.
pub type Priority = i32;

/// Namespaced identity shared by workloads and local queues.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object, unique within the namespace.
    pub name: String,
}

impl ObjectKey {
    /// Build a key from namespace and name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Admission state of a workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadState {
    /// Waiting for quota.
    #[default]
    Pending,
    /// Holding a reservation in its cluster queue.
    Admitted,
    /// Done; holds nothing.
    Finished,
}

/// A unit of resource-consuming work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Namespace of the workload.
    pub namespace: String,
    /// Name of the workload.
    pub name: String,
    /// Name of the local queue (in the same namespace) it was submitted to.
    pub queue_name: String,
    /// Scheduling priority.
    #[serde(default)]
    pub priority: Priority,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Requested resources.
    #[serde(default)]
    pub requests: ResourceList,
    /// Current admission state.
    #[serde(default)]
    pub state: WorkloadState,
}

impl Workload {
    /// Identity of this workload.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Identity of the local queue this workload targets.
    pub fn local_queue_key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.queue_name.clone())
    }

    /// Reject negative requests.
    pub fn validate(&self) -> Result<(), QueueError> {
        validate_resources(&self.requests)
            .map_err(|e| QueueError::Invalid(format!("workload {}: {e}", self.key())))
    }
}

/// A workload as tracked by the index, resolved to its cluster queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadInfo {
    /// Workload identity.
    pub key: ObjectKey,
    /// Local queue name (same namespace as the workload).
    pub local_queue: String,
    /// Cluster queue the workload is queued in or charged to.
    pub cluster_queue: String,
    /// Scheduling priority.
    pub priority: Priority,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Requested resources.
    pub requests: ResourceList,
    /// Admission state.
    pub state: WorkloadState,
}

impl WorkloadInfo {
    /// Resolve `workload` against `cluster_queue`.
    pub fn new(workload: &Workload, cluster_queue: &str) -> Self {
        Self {
            key: workload.key(),
            local_queue: workload.queue_name.clone(),
            cluster_queue: cluster_queue.to_string(),
            priority: workload.priority,
            created_at_ms: workload.created_at_ms,
            requests: workload.requests.clone(),
            state: workload.state,
        }
    }

    /// Rebuild the workload value this entry was resolved from.
    pub fn to_workload(&self) -> Workload {
        Workload {
            namespace: self.key.namespace.clone(),
            name: self.key.name.clone(),
            queue_name: self.local_queue.clone(),
            priority: self.priority,
            created_at_ms: self.created_at_ms,
            requests: self.requests.clone(),
            state: self.state,
        }
    }

    /// Identity of the local queue.
    pub fn local_queue_key(&self) -> ObjectKey {
        ObjectKey::new(self.key.namespace.clone(), self.local_queue.clone())
    }

    /// Ordering facts for policy checks.
    pub fn candidate(&self) -> Candidate<'_> {
        Candidate {
            priority: self.priority,
            created_at_ms: self.created_at_ms,
            name: &self.key.name,
        }
    }

    /// True when the workload requests a non-zero amount of `resource`.
    pub fn uses(&self, resource: &str) -> bool {
        self.requests.get(resource).is_some_and(|q| !q.is_zero())
    }
}

/// Namespaced entry point bound to exactly one cluster queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalQueue {
    /// Namespace of the queue.
    pub namespace: String,
    /// Name of the queue.
    pub name: String,
    /// Cluster queue this queue feeds.
    pub cluster_queue: String,
}

impl LocalQueue {
    /// Identity of this queue.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Which admitted workloads a preemptor may evict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreemptionPolicy {
    /// Never evict.
    #[default]
    Never,
    /// Evict strictly lower priority workloads.
    LowerPriority,
    /// Evict lower priority workloads, or equal priority ones created later.
    LowerOrNewerEqualPriority,
    /// Evict regardless of priority (reclaim only).
    Any,
}

impl PreemptionPolicy {
    /// Whether `candidate` may be evicted for `preemptor` under this policy.
    pub fn permits(self, preemptor: &Candidate<'_>, candidate: &Candidate<'_>) -> bool {
        match self {
            Self::Never => false,
            Self::LowerPriority => candidate.priority < preemptor.priority,
            Self::LowerOrNewerEqualPriority => {
                candidate.priority < preemptor.priority
                    || (candidate.priority == preemptor.priority
                        && candidate.created_at_ms > preemptor.created_at_ms)
            }
            Self::Any => true,
        }
    }
}

/// Minimal ordering facts about a workload used by policy checks.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Workload priority.
    pub priority: Priority,
    /// Creation timestamp in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Workload name, for logging.
    pub name: &'a str,
}

/// Whether a queue may evict cohort workloads while its preemptor borrows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowWithinCohortPolicy {
    /// Never evict cohort workloads while borrowing.
    #[default]
    Never,
    /// Evict strictly lower priority cohort workloads while borrowing.
    LowerPriority,
}

/// Borrowing sub-policy of a cluster queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowWithinCohort {
    /// Policy selector.
    #[serde(default)]
    pub policy: BorrowWithinCohortPolicy,
    /// Only workloads at or below this priority may be evicted while borrowing.
    #[serde(default)]
    pub max_priority_threshold: Option<Priority>,
}

/// Preemption configuration of a cluster queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterQueuePreemption {
    /// Evict borrowing workloads from cohort siblings to reclaim nominal quota.
    #[serde(default)]
    pub reclaim_within_cohort: PreemptionPolicy,
    /// Evict workloads of this cluster queue.
    #[serde(default)]
    pub within_cluster_queue: PreemptionPolicy,
    /// Cohort eviction rules while the preemptor borrows.
    #[serde(default)]
    pub borrow_within_cohort: BorrowWithinCohort,
}

/// Cluster-scoped quota-holding queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterQueue {
    /// Name of the queue.
    pub name: String,
    /// Cohort this queue lends to and borrows from.
    #[serde(default)]
    pub cohort: Option<String>,
    /// Nominal quota per resource.
    #[serde(default)]
    pub nominal_quota: ResourceList,
    /// Maximum borrowed amount per resource; absent means unbounded.
    #[serde(default)]
    pub borrowing_limit: ResourceList,
    /// Preemption policy.
    #[serde(default)]
    pub preemption: ClusterQueuePreemption,
}

impl ClusterQueue {
    /// A queue with no quota, cohort or preemption.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cohort: None,
            nominal_quota: ResourceList::new(),
            borrowing_limit: ResourceList::new(),
            preemption: ClusterQueuePreemption::default(),
        }
    }

    /// Set the cohort.
    #[must_use]
    pub fn with_cohort(mut self, cohort: impl Into<String>) -> Self {
        self.cohort = Some(cohort.into());
        self
    }

    /// Set the nominal quota of one resource.
    #[must_use]
    pub fn with_quota(mut self, resource: impl Into<String>, quantity: Quantity) -> Self {
        self.nominal_quota.insert(resource.into(), quantity);
        self
    }

    /// Set the borrowing limit of one resource.
    #[must_use]
    pub fn with_borrowing_limit(mut self, resource: impl Into<String>, quantity: Quantity) -> Self {
        self.borrowing_limit.insert(resource.into(), quantity);
        self
    }

    /// Replace the preemption policy.
    #[must_use]
    pub const fn with_preemption(mut self, preemption: ClusterQueuePreemption) -> Self {
        self.preemption = preemption;
        self
    }

    /// Reject negative quota and limits.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.name.is_empty() {
            return Err(QueueError::Invalid("cluster queue name is empty".into()));
        }
        validate_resources(&self.nominal_quota)
            .and_then(|()| validate_resources(&self.borrowing_limit))
            .map_err(|e| QueueError::Invalid(format!("cluster queue {}: {e}", self.name)))
    }
}

/// Derived read-only usage of one resource in a cluster queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Resource name.
    pub name: String,
    /// Total amount in use.
    pub total: Quantity,
    /// Portion of `total` above nominal quota.
    pub borrowed: Quantity,
}
