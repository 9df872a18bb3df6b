//! Tests for error types

use cohort_queue::core::{ObjectKind, QueueError, Shortage};
use cohort_queue::util::Quantity;

#[test]
fn test_not_found_error() {
    let err = QueueError::not_found(ObjectKind::ClusterQueue, "cq1");
    assert_eq!(format!("{err}"), "cluster queue not found: cq1");
}

#[test]
fn test_conflict_error() {
    let err = QueueError::Conflict("local queue ns/lq already exists".to_string());
    assert_eq!(format!("{err}"), "conflict: local queue ns/lq already exists");
}

#[test]
fn test_denied_error_lists_every_shortage() {
    let err = QueueError::Denied {
        cluster_queue: "cq1".into(),
        shortages: vec![
            Shortage {
                resource: "cpu".into(),
                requested: Quantity::from_units(8),
                available: Quantity::from_units(5),
            },
            Shortage {
                resource: "memory".into(),
                requested: Quantity::from_milli(1500),
                available: Quantity::ZERO,
            },
        ],
    };
    assert_eq!(
        format!("{err}"),
        "quota denied in cluster queue cq1: cpu (requested 8, available 5), memory (requested 1500m, available 0)"
    );
}

#[test]
fn test_invalid_error() {
    let err = QueueError::Invalid("negative quantity".to_string());
    assert_eq!(format!("{err}"), "invalid: negative quantity");
}
