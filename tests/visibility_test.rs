//! Integration tests for pending-workload visibility queries.
//!
//! Covers:
//! 1. Ordering by priority, then creation time, then name
//! 2. Position in cluster queue and in local queue
//! 3. Offset and limit windows
//! 4. Insertion-order independence

use cohort_queue::config::ManagerConfig;
use cohort_queue::core::{ClusterQueue, LocalQueue, QueueError, QueueManager, Workload, WorkloadState};
use cohort_queue::runtime::{
    pending_workloads_in_cluster_queue, pending_workloads_in_local_queue, PendingWorkload,
    PendingWorkloadOptions,
};
use cohort_queue::util::{resource_list, Quantity};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const NS: &str = "ns1";
const CQ: &str = "cq1";

const HIGH: i32 = 100;
const LOW: i32 = 50;

fn manager_with_queues(local_queues: &[&str]) -> QueueManager {
    let manager = QueueManager::default();
    manager
        .add_cluster_queue(ClusterQueue::new(CQ).with_quota("cpu", Quantity::from_units(1)))
        .unwrap();
    for lq in local_queues {
        manager
            .add_local_queue(LocalQueue {
                namespace: NS.into(),
                name: (*lq).into(),
                cluster_queue: CQ.into(),
            })
            .unwrap();
    }
    manager
}

fn workload(name: &str, queue: &str, priority: i32, created_at_ms: u128) -> Workload {
    Workload {
        namespace: NS.into(),
        name: name.into(),
        queue_name: queue.into(),
        priority,
        created_at_ms,
        requests: resource_list([("cpu", "1")]).unwrap(),
        state: WorkloadState::Pending,
    }
}

fn pending(name: &str, queue: &str, priority: i32, created_at_ms: u128, cq_pos: usize, lq_pos: usize) -> PendingWorkload {
    PendingWorkload {
        namespace: NS.into(),
        name: name.into(),
        local_queue_name: queue.into(),
        priority,
        created_at_ms,
        position_in_cluster_queue: cq_pos,
        position_in_local_queue: lq_pos,
    }
}

fn query(manager: &QueueManager, offset: Option<usize>, limit: Option<usize>) -> Vec<PendingWorkload> {
    pending_workloads_in_cluster_queue(manager, CQ, PendingWorkloadOptions { offset, limit })
        .unwrap()
        .items
}

fn two_queue_fixture() -> QueueManager {
    let manager = manager_with_queues(&["lq-a", "lq-b"]);
    for w in [
        workload("a-high", "lq-a", HIGH, 1),
        workload("b-high", "lq-b", HIGH, 2),
        workload("a-low", "lq-a", LOW, 1),
        workload("b-low", "lq-b", LOW, 2),
    ] {
        manager.add_or_update_workload(w).unwrap();
    }
    manager
}

#[test]
fn test_single_local_queue_orders_by_priority() {
    let manager = manager_with_queues(&["lq-a"]);
    manager.add_or_update_workload(workload("low", "lq-a", LOW, 1)).unwrap();
    manager.add_or_update_workload(workload("high", "lq-a", HIGH, 2)).unwrap();

    assert_eq!(
        query(&manager, None, None),
        vec![
            pending("high", "lq-a", HIGH, 2, 0, 0),
            pending("low", "lq-a", LOW, 1, 1, 1),
        ]
    );
}

#[test]
fn test_two_local_queues_interleave() {
    let manager = two_queue_fixture();
    assert_eq!(
        query(&manager, None, None),
        vec![
            pending("a-high", "lq-a", HIGH, 1, 0, 0),
            pending("b-high", "lq-b", HIGH, 2, 1, 0),
            pending("a-low", "lq-a", LOW, 1, 2, 1),
            pending("b-low", "lq-b", LOW, 2, 3, 1),
        ]
    );
}

#[test]
fn test_limit() {
    let manager = two_queue_fixture();
    assert_eq!(
        query(&manager, None, Some(2)),
        vec![
            pending("a-high", "lq-a", HIGH, 1, 0, 0),
            pending("b-high", "lq-b", HIGH, 2, 1, 0),
        ]
    );
}

#[test]
fn test_offset() {
    let manager = two_queue_fixture();
    assert_eq!(
        query(&manager, Some(1), None),
        vec![
            pending("b-high", "lq-b", HIGH, 2, 1, 0),
            pending("a-low", "lq-a", LOW, 1, 2, 1),
            pending("b-low", "lq-b", LOW, 2, 3, 1),
        ]
    );
}

#[test]
fn test_offset_and_limit() {
    let manager = two_queue_fixture();
    assert_eq!(
        query(&manager, Some(1), Some(1)),
        vec![pending("b-high", "lq-b", HIGH, 2, 1, 0)]
    );
}

#[test]
fn test_offset_past_end_is_empty() {
    let manager = two_queue_fixture();
    assert!(query(&manager, Some(4), None).is_empty());
    assert!(query(&manager, Some(100), Some(5)).is_empty());
}

#[test]
fn test_pagination_matches_prefix_slice() {
    let manager = two_queue_fixture();
    let full = query(&manager, Some(0), Some(10));
    for offset in 0..=full.len() {
        for limit in 0..=full.len() {
            let page = query(&manager, Some(offset), Some(limit));
            let end = (offset + limit).min(full.len());
            assert_eq!(page, full[offset.min(end)..end], "offset {offset} limit {limit}");
        }
    }
}

#[test]
fn test_local_queue_view_uses_same_positions() {
    let manager = two_queue_fixture();
    let items = pending_workloads_in_local_queue(&manager, NS, "lq-b", PendingWorkloadOptions::default())
        .unwrap()
        .items;
    assert_eq!(
        items,
        vec![
            pending("b-high", "lq-b", HIGH, 2, 1, 0),
            pending("b-low", "lq-b", LOW, 2, 3, 1),
        ]
    );
}

#[test]
fn test_unknown_queues_are_not_found() {
    let manager = two_queue_fixture();
    let err = pending_workloads_in_cluster_queue(&manager, "nope", PendingWorkloadOptions::default())
        .unwrap_err();
    assert!(matches!(err, QueueError::NotFound { .. }));
    let err = pending_workloads_in_local_queue(&manager, NS, "nope", PendingWorkloadOptions::default())
        .unwrap_err();
    assert!(matches!(err, QueueError::NotFound { .. }));
}

#[test]
fn test_configured_defaults_and_cap() {
    let manager = QueueManager::new(ManagerConfig {
        default_pending_limit: 2,
        max_pending_limit: Some(3),
        ..ManagerConfig::default()
    });
    manager.add_cluster_queue(ClusterQueue::new(CQ)).unwrap();
    manager
        .add_local_queue(LocalQueue {
            namespace: NS.into(),
            name: "lq".into(),
            cluster_queue: CQ.into(),
        })
        .unwrap();
    for i in 0..5 {
        manager
            .add_or_update_workload(workload(&format!("w{i}"), "lq", 0, i))
            .unwrap();
    }
    assert_eq!(query(&manager, None, None).len(), 2);
    assert_eq!(query(&manager, None, Some(100)).len(), 3);
}

#[test]
fn test_order_independent_of_insertion() {
    let mut workloads = Vec::new();
    for i in 0..40u32 {
        let queue = if i % 3 == 0 { "lq-a" } else { "lq-b" };
        workloads.push(workload(
            &format!("w{:02}", i % 17),
            queue,
            i32::try_from(i % 4).unwrap() * 10,
            u128::from(i % 5),
        ));
    }
    // Names repeat, so keep one workload per name.
    workloads.sort_by(|a, b| a.name.cmp(&b.name));
    workloads.dedup_by(|a, b| a.name == b.name);

    let reference = manager_with_queues(&["lq-a", "lq-b"]);
    for w in &workloads {
        reference.add_or_update_workload(w.clone()).unwrap();
    }
    let expected = query(&reference, None, None);

    let mut sorted = expected.clone();
    sorted.sort_by(|a, b| {
        (-a.priority, a.created_at_ms, &a.name).cmp(&(-b.priority, b.created_at_ms, &b.name))
    });
    assert_eq!(expected, sorted);

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5 {
        workloads.shuffle(&mut rng);
        let manager = manager_with_queues(&["lq-a", "lq-b"]);
        for w in &workloads {
            manager.add_or_update_workload(w.clone()).unwrap();
        }
        assert_eq!(query(&manager, None, None), expected);
    }
}
