//! # Cohort Queue
//!
//! Cohort-aware workload queueing for shared clusters.
//!
//! Workloads are submitted to namespaced **local queues**, each bound to one
//! cluster-scoped **cluster queue** that holds nominal quota per resource.
//! Cluster queues grouped in a **cohort** lend unused nominal quota to each
//! other. The crate keeps a live, mutually consistent view of:
//!
//! - per cluster queue quota usage and the borrowed portion of it
//!   ([`core::QuotaLedger`]),
//! - cohort membership and cohort-wide headroom ([`core::CohortGraph`]),
//! - the ordered pending workloads of every cluster queue
//!   ([`core::QueueIndex`]), sorted by priority, creation time and name,
//! - the victims that would let a denied workload fit
//!   ([`core::PreemptionEngine`]).
//!
//! [`core::QueueManager`] is the facade over all of it. An external scheduling
//! loop takes [`core::QueueManager::snapshot`], tries to admit heads, asks for
//! victims on denial and reports decisions back as lifecycle events.
//!
//! ```rust,no_run
//! use cohort_queue::core::{ClusterQueue, LocalQueue, QueueManager, Workload, WorkloadState};
//! use cohort_queue::util::{resource_list, Quantity};
//!
//! # fn main() -> Result<(), cohort_queue::core::QueueError> {
//! let manager = QueueManager::default();
//! manager.add_cluster_queue(ClusterQueue::new("team-a").with_quota("cpu", Quantity::from_units(8)))?;
//! manager.add_local_queue(LocalQueue {
//!     namespace: "research".into(),
//!     name: "default".into(),
//!     cluster_queue: "team-a".into(),
//! })?;
//! manager.add_or_update_workload(Workload {
//!     namespace: "research".into(),
//!     name: "train-1".into(),
//!     queue_name: "default".into(),
//!     priority: 10,
//!     created_at_ms: 1,
//!     requests: resource_list([("cpu", "4")])?,
//!     state: WorkloadState::Pending,
//! })?;
//!
//! let snapshot = manager.snapshot();
//! for head in snapshot.heads() {
//!     if snapshot.fits(head).is_ok() {
//!         manager.admit_workload(&head.key)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Quota accounting, queue ordering and preemption.
pub mod core;
/// Configuration models for the manager and cluster bootstrap.
pub mod config;
/// Builders to construct the manager from configuration.
pub mod builders;
/// In-memory ordered containers.
pub mod infra;
/// Runtime adapters and visibility API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
