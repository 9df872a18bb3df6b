//! Tests for builder modules

use cohort_queue::builders::{build_manager, build_manager_with_audit};
use cohort_queue::config::{ClusterConfig, ManagerConfig};
use cohort_queue::core::{ClusterQueue, InMemoryAuditSink, LocalQueue, QueueError};
use cohort_queue::util::Quantity;

fn config() -> ClusterConfig {
    ClusterConfig {
        manager: ManagerConfig::default(),
        cluster_queues: vec![
            ClusterQueue::new("cq1").with_quota("cpu", Quantity::from_units(4)),
        ],
        local_queues: vec![LocalQueue {
            namespace: "ns".into(),
            name: "lq".into(),
            cluster_queue: "cq1".into(),
        }],
    }
}

#[test]
fn test_build_manager_seeds_queues() {
    let manager = build_manager(&config()).unwrap();
    assert_eq!(manager.workload_counts("cq1").unwrap(), (0, 0));
    assert!(manager
        .pending_workloads_in_local_queue("ns", "lq", 0, 10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_build_manager_with_audit() {
    let manager =
        build_manager_with_audit(&config(), Some(Box::new(InMemoryAuditSink::new(8)))).unwrap();
    assert_eq!(manager.resource_usage("cq1").unwrap().len(), 1);
}

#[test]
fn test_build_manager_rejects_invalid_config() {
    let mut cfg = config();
    cfg.manager.default_pending_limit = 0;
    assert!(matches!(build_manager(&cfg), Err(QueueError::Invalid(_))));
}
