//! Tests for tokio spawner utilities and the visibility API

use cohort_queue::core::{ClusterQueue, LocalQueue, QueueManager, Spawn, Workload, WorkloadState};
use cohort_queue::runtime::tokio_spawner::TokioSpawner;
use cohort_queue::runtime::{cluster_queue_usage, PendingWorkloadOptions};
use cohort_queue::util::{resource_list, Quantity};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_current_spawner_outside_runtime() {
    assert!(TokioSpawner::current().is_none());
}

#[test]
fn test_cluster_queue_usage_summary() {
    let manager = QueueManager::default();
    manager
        .add_cluster_queue(ClusterQueue::new("cq").with_quota("cpu", Quantity::from_units(4)))
        .unwrap();
    manager
        .add_local_queue(LocalQueue {
            namespace: "ns".into(),
            name: "lq".into(),
            cluster_queue: "cq".into(),
        })
        .unwrap();
    manager
        .add_or_update_workload(Workload {
            namespace: "ns".into(),
            name: "w".into(),
            queue_name: "lq".into(),
            priority: 0,
            created_at_ms: 1,
            requests: resource_list([("cpu", "3")]).unwrap(),
            state: WorkloadState::Admitted,
        })
        .unwrap();

    let summary = cluster_queue_usage(&manager, "cq").unwrap();
    assert_eq!(summary.admitted_workloads, 1);
    assert_eq!(summary.pending_workloads, 0);
    assert_eq!(summary.resources[0].total, Quantity::from_units(3));
    assert_eq!(summary.resources[0].borrowed, Quantity::ZERO);
}

#[test]
fn test_pending_options_deserialize_partially() {
    let opts: PendingWorkloadOptions = serde_json::from_str(r#"{"limit": 5}"#).unwrap();
    assert_eq!(opts.offset, None);
    assert_eq!(opts.limit, Some(5));
}
