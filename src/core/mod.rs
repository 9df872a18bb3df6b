//! Quota accounting, queue ordering and preemption.

pub mod audit;
pub mod cohort;
pub mod error;
pub mod index;
pub mod ledger;
pub mod manager;
pub mod model;
pub mod preemption;
pub mod snapshot;

pub use audit::{build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use cohort::CohortGraph;
pub use error::{AppResult, ObjectKind, QueueError, QueueResult, Shortage};
pub use index::{ClusterQueueEntry, PendingEntry, Placement, QueueIndex};
pub use ledger::{QuotaLedger, QuotaRecord};
pub use manager::{CleanUpReport, LifecycleEvent, ObjectStore, QueueManager, Spawn, WakeState};
pub use model::{
    BorrowWithinCohort, BorrowWithinCohortPolicy, Candidate, ClusterQueue, ClusterQueuePreemption,
    LocalQueue, ObjectKey, PreemptionPolicy, Priority, ResourceUsage, Workload, WorkloadInfo,
    WorkloadState,
};
pub use preemption::{PreemptionEngine, Victim, VictimReason};
pub use snapshot::{ClusterQueueSnapshot, Snapshot};
