//! Tests for utility functions

use cohort_queue::util::{init_tracing, now_ms, resource_list, Quantity};

#[test]
fn test_quantity_suffixes() {
    assert_eq!("2".parse::<Quantity>().unwrap(), Quantity::from_units(2));
    assert_eq!("1.5".parse::<Quantity>().unwrap(), Quantity::from_milli(1500));
    assert_eq!("500m".parse::<Quantity>().unwrap(), Quantity::from_milli(500));
    assert_eq!("3k".parse::<Quantity>().unwrap(), Quantity::from_units(3_000));
    assert_eq!("4Ki".parse::<Quantity>().unwrap(), Quantity::from_units(4_096));
    assert_eq!("1Gi".parse::<Quantity>().unwrap(), Quantity::from_units(1 << 30));
}

#[test]
fn test_quantity_rejects_garbage() {
    assert!("".parse::<Quantity>().is_err());
    assert!("abc".parse::<Quantity>().is_err());
    assert!("1Xi".parse::<Quantity>().is_err());
}

#[test]
fn test_quantity_display_and_json() {
    assert_eq!(Quantity::from_milli(2500).to_string(), "2500m");
    assert_eq!(Quantity::from_units(7).to_string(), "7");
    let json = serde_json::to_string(&Quantity::from_milli(250)).unwrap();
    assert_eq!(json, "\"250m\"");
    let back: Quantity = serde_json::from_str("3").unwrap();
    assert_eq!(back, Quantity::from_units(3));
}

#[test]
fn test_resource_list_rejects_bad_entry() {
    assert!(resource_list([("cpu", "1"), ("memory", "lots")]).is_err());
    assert_eq!(resource_list([("cpu", "1")]).unwrap().len(), 1);
}

#[test]
fn test_now_ms_advances() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing("info");
    init_tracing("debug");
}
