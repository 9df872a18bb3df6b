//! Tests for configuration validation

use cohort_queue::config::{ClusterConfig, ManagerConfig};

#[test]
fn test_manager_config_defaults() {
    let cfg = ManagerConfig::default();
    assert_eq!(cfg.default_pending_limit, 1000);
    assert_eq!(cfg.default_pending_offset, 0);
    assert_eq!(cfg.clean_up_interval_ms, 30_000);
    assert!(cfg.buffer_unresolved_workloads);
    assert!(!cfg.allow_force_delete);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_manager_config_invalid_limit() {
    let invalid = ManagerConfig {
        default_pending_limit: 0,
        ..ManagerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_manager_config_invalid_interval() {
    let invalid = ManagerConfig {
        clean_up_interval_ms: 0,
        ..ManagerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_manager_config_from_json() {
    let cfg = ManagerConfig::from_json_str(
        r#"{"default_pending_limit": 50, "allow_force_delete": true}"#,
    )
    .unwrap();
    assert_eq!(cfg.default_pending_limit, 50);
    assert!(cfg.allow_force_delete);
    assert!(ManagerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_manager_config_from_env() {
    std::env::set_var("COHORT_QUEUE_DEFAULT_PENDING_LIMIT", "25");
    std::env::set_var("COHORT_QUEUE_ALLOW_FORCE_DELETE", "true");
    let cfg = ManagerConfig::from_env().unwrap();
    std::env::remove_var("COHORT_QUEUE_DEFAULT_PENDING_LIMIT");
    std::env::remove_var("COHORT_QUEUE_ALLOW_FORCE_DELETE");
    assert_eq!(cfg.default_pending_limit, 25);
    assert!(cfg.allow_force_delete);
}

#[test]
fn test_cluster_config_from_json() {
    let json = r#"{
        "manager": {"clean_up_interval_ms": 1000},
        "cluster_queues": [
            {"name": "team-a", "cohort": "research", "nominal_quota": {"cpu": "10", "memory": "32Gi"}},
            {"name": "team-b", "cohort": "research", "nominal_quota": {"cpu": "500m"},
             "borrowing_limit": {"cpu": "2"},
             "preemption": {"reclaim_within_cohort": "any"}}
        ],
        "local_queues": [
            {"namespace": "ml", "name": "default", "cluster_queue": "team-a"}
        ]
    }"#;
    let cfg = ClusterConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.manager.clean_up_interval_ms, 1000);
    assert_eq!(cfg.cluster_queues.len(), 2);
    assert_eq!(cfg.cluster_queues[1].nominal_quota["cpu"].milli(), 500);
    assert_eq!(cfg.local_queues[0].cluster_queue, "team-a");
}

#[test]
fn test_cluster_config_rejects_dangling_local_queue() {
    let json = r#"{
        "local_queues": [{"namespace": "ml", "name": "default", "cluster_queue": "missing"}]
    }"#;
    assert!(ClusterConfig::from_json_str(json).is_err());
}

#[test]
fn test_cluster_config_rejects_negative_quota() {
    let json = r#"{"cluster_queues": [{"name": "cq", "nominal_quota": {"cpu": "-1"}}]}"#;
    assert!(ClusterConfig::from_json_str(json).is_err());
}

#[test]
fn test_cluster_config_from_missing_path() {
    assert!(ClusterConfig::from_path("/definitely/not/here.json").is_err());
}
