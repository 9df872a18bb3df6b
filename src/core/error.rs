//! Error types for queue, quota and preemption operations.

use std::fmt;

use thiserror::Error;

use crate::util::quantity::{Quantity, ResourceName};

/// Kind of object a lookup failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A cluster-scoped quota-holding queue.
    ClusterQueue,
    /// A namespaced entry queue.
    LocalQueue,
    /// A cohort of cluster queues.
    Cohort,
    /// A workload.
    Workload,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClusterQueue => "cluster queue",
            Self::LocalQueue => "local queue",
            Self::Cohort => "cohort",
            Self::Workload => "workload",
        };
        f.write_str(name)
    }
}

/// One resource dimension a reservation could not satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortage {
    /// Resource that was short.
    pub resource: ResourceName,
    /// Amount requested.
    pub requested: Quantity,
    /// Amount that could have been granted.
    pub available: Quantity,
}

impl fmt::Display for Shortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (requested {}, available {})",
            self.resource, self.requested, self.available
        )
    }
}

fn join_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors produced by the queueing core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Reference to an unknown queue, cohort or workload.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What kind of object was missing.
        kind: ObjectKind,
        /// Name of the missing object.
        name: String,
    },
    /// Duplicate add, delete with dependents, or a forbidden transition.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Quota is insufficient on at least one resource.
    #[error("quota denied in cluster queue {cluster_queue}: {}", join_shortages(.shortages))]
    Denied {
        /// Cluster queue the reservation targeted.
        cluster_queue: String,
        /// Every resource dimension that was short.
        shortages: Vec<Shortage>,
    },
    /// Malformed input such as a negative quantity.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl QueueError {
    /// Shorthand for a [`QueueError::NotFound`].
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }
}

/// Result alias for core operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
