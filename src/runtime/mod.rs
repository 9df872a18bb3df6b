//! Runtime adapters and the visibility API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{
    cluster_queue_usage, pending_workloads_in_cluster_queue, pending_workloads_in_local_queue,
    ClusterQueueUsageSummary, PendingWorkload, PendingWorkloadOptions, PendingWorkloadsSummary,
};
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
