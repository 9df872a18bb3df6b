//! Tests for audit sink

use cohort_queue::core::{
    build_audit_event, AuditSink, ClusterQueue, InMemoryAuditSink, QueueManager, TracingAuditSink,
};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let event = build_audit_event("ns/w1", Some("cq1"), "admit", Some("payload".to_string()));
    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0], event);
    assert_eq!(events[0].object, "ns/w1");
    assert_eq!(events[0].cluster_queue.as_deref(), Some("cq1"));
    assert_eq!(events[0].action, "admit");
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event("ns/w1", None, "queue", None));
    sink.record(build_audit_event("ns/w2", None, "queue", None));
    sink.record(build_audit_event("ns/w3", None, "queue", None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].object, "ns/w2"); // First one popped
    assert_eq!(events[1].object, "ns/w3");
}

#[test]
fn test_event_ids_are_unique_uuids() {
    let a = build_audit_event("cq1", Some("cq1"), "add", None);
    let b = build_audit_event("cq1", Some("cq1"), "add", None);
    assert_ne!(a.event_id, b.event_id);
    assert!(uuid::Uuid::parse_str(&a.event_id).is_ok());
}

#[test]
fn test_tracing_sink_accepts_events() {
    let mut sink = TracingAuditSink;
    sink.record(build_audit_event("cq1", Some("cq1"), "add", None));
}

#[test]
fn test_manager_records_mutations() {
    let manager = QueueManager::default().with_audit(Box::new(TracingAuditSink));
    manager.add_cluster_queue(ClusterQueue::new("cq1")).unwrap();
    manager.delete_cluster_queue("cq1").unwrap();
}
