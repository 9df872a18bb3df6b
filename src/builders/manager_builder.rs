//! Build a queue manager from cluster configuration.

use crate::config::ClusterConfig;
use crate::core::{AuditSink, QueueError, QueueManager};

/// Validate `cfg` and return a manager seeded with its queues.
///
/// Cluster queues are created before local queues, so declaration order in
/// the file does not matter.
pub fn build_manager(cfg: &ClusterConfig) -> Result<QueueManager, QueueError> {
    build_manager_with_audit(cfg, None)
}

/// Like [`build_manager`], attaching `audit` before any queue is created.
pub fn build_manager_with_audit(
    cfg: &ClusterConfig,
    audit: Option<Box<dyn AuditSink>>,
) -> Result<QueueManager, QueueError> {
    cfg.validate()
        .map_err(|e| QueueError::Invalid(format!("config invalid: {e}")))?;

    let mut manager = QueueManager::new(cfg.manager.clone());
    if let Some(audit) = audit {
        manager = manager.with_audit(audit);
    }
    for cq in &cfg.cluster_queues {
        manager.add_cluster_queue(cq.clone())?;
    }
    for lq in &cfg.local_queues {
        manager.add_local_queue(lq.clone())?;
    }
    tracing::info!(
        cluster_queues = cfg.cluster_queues.len(),
        local_queues = cfg.local_queues.len(),
        "queue manager built"
    );
    Ok(manager)
}
