//! In-memory ordered set of pending workloads.
//!
//! Entries are kept in a `BTreeMap` keyed by
//! `(priority desc, creation asc, name asc, namespace asc)`, so iteration order
//! is the admission order and never depends on hash-map iteration.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::core::model::{ObjectKey, Priority, WorkloadInfo};

/// Total-order key of a pending workload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueOrderKey {
    priority: Reverse<Priority>,
    created_at_ms: u128,
    name: String,
    namespace: String,
}

impl QueueOrderKey {
    /// Order key of `info`.
    pub fn of(info: &WorkloadInfo) -> Self {
        Self {
            priority: Reverse(info.priority),
            created_at_ms: info.created_at_ms,
            name: info.key.name.clone(),
            namespace: info.key.namespace.clone(),
        }
    }
}

/// Ordered pending workloads of one cluster queue.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    items: BTreeMap<QueueOrderKey, WorkloadInfo>,
    positions: HashMap<ObjectKey, QueueOrderKey>,
}

impl InMemoryQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a workload; returns the replaced entry.
    pub fn push(&mut self, info: WorkloadInfo) -> Option<WorkloadInfo> {
        let previous = self.remove(&info.key);
        let order = QueueOrderKey::of(&info);
        self.positions.insert(info.key.clone(), order.clone());
        self.items.insert(order, info);
        previous
    }

    /// Remove a workload by identity.
    pub fn remove(&mut self, key: &ObjectKey) -> Option<WorkloadInfo> {
        let order = self.positions.remove(key)?;
        self.items.remove(&order)
    }

    /// Look up a workload by identity.
    pub fn get(&self, key: &ObjectKey) -> Option<&WorkloadInfo> {
        self.positions.get(key).and_then(|o| self.items.get(o))
    }

    /// True when the workload is queued here.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.positions.contains_key(key)
    }

    /// First workload in admission order.
    pub fn head(&self) -> Option<&WorkloadInfo> {
        self.items.values().next()
    }

    /// Workloads in admission order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkloadInfo> {
        self.items.values()
    }

    /// Remove every workload matching `pred`, returning them in order.
    pub fn extract_if<F>(&mut self, mut pred: F) -> Vec<WorkloadInfo>
    where
        F: FnMut(&WorkloadInfo) -> bool,
    {
        let doomed: Vec<QueueOrderKey> = self
            .items
            .iter()
            .filter(|&(_, info)| pred(info))
            .map(|(order, _)| order.clone())
            .collect();
        doomed
            .into_iter()
            .filter_map(|order| {
                let info = self.items.remove(&order)?;
                self.positions.remove(&info.key);
                Some(info)
            })
            .collect()
    }

    /// Number of queued workloads.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
