//! Per cluster-queue quota accounting.
//!
//! Each cluster queue has a [`QuotaRecord`] holding its nominal quota,
//! optional borrowing limits and current usage. The borrowed portion of a
//! resource is always `max(0, usage - nominal)`: a reservation that pushes
//! usage past nominal is borrowed against the cohort, and a release shrinks
//! the borrowed portion before touching nominal usage.
//!
//! Reservations are atomic across resources. Either every requested dimension
//! fits and all are charged, or nothing changes and every short dimension is
//! reported in [`QueueError::Denied`].

use std::collections::HashMap;

use crate::core::cohort::CohortGraph;
use crate::core::model::{ClusterQueue, ResourceUsage};
use crate::core::{ObjectKind, QueueError, Shortage};
use crate::util::quantity::{validate_resources, Quantity, ResourceList};

/// Quota state of one cluster queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaRecord {
    nominal: ResourceList,
    borrowing_limit: ResourceList,
    usage: ResourceList,
}

impl QuotaRecord {
    /// Nominal quota of `resource`, zero when unset.
    pub fn nominal(&self, resource: &str) -> Quantity {
        self.nominal.get(resource).copied().unwrap_or_default()
    }

    /// Amount of `resource` in use.
    pub fn usage(&self, resource: &str) -> Quantity {
        self.usage.get(resource).copied().unwrap_or_default()
    }

    /// Borrowing limit of `resource`, if any.
    pub fn borrowing_limit(&self, resource: &str) -> Option<Quantity> {
        self.borrowing_limit.get(resource).copied()
    }

    /// Amount of `resource` used beyond nominal.
    pub fn borrowed(&self, resource: &str) -> Quantity {
        (self.usage(resource) - self.nominal(resource)).clamp_non_negative()
    }

    /// Nominal quota of `resource` not currently in use.
    pub fn unused_nominal(&self, resource: &str) -> Quantity {
        (self.nominal(resource) - self.usage(resource)).clamp_non_negative()
    }

    /// True when usage exceeds nominal on any resource.
    pub fn is_borrowing(&self) -> bool {
        self.usage
            .keys()
            .any(|resource| !self.borrowed(resource).is_zero())
    }

    /// Full usage map.
    pub const fn usage_map(&self) -> &ResourceList {
        &self.usage
    }

    /// Full nominal quota map.
    pub const fn nominal_map(&self) -> &ResourceList {
        &self.nominal
    }

    fn add_usage(&mut self, resources: &ResourceList) {
        for (name, q) in resources {
            if q.is_zero() {
                continue;
            }
            *self.usage.entry(name.clone()).or_default() += *q;
        }
    }

    fn sub_usage(&mut self, resources: &ResourceList) {
        for (name, q) in resources {
            if let Some(current) = self.usage.get_mut(name) {
                *current -= *q;
                if current.is_zero() {
                    self.usage.remove(name);
                }
            }
        }
    }
}

/// Quota records of every known cluster queue plus their cohort grouping.
#[derive(Debug, Clone, Default)]
pub struct QuotaLedger {
    records: HashMap<String, QuotaRecord>,
    cohorts: CohortGraph,
}

impl QuotaLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or refresh the record of a cluster queue, keeping its usage.
    pub fn upsert_cluster_queue(&mut self, cq: &ClusterQueue) -> Result<(), QueueError> {
        cq.validate()?;
        let record = self.records.entry(cq.name.clone()).or_default();
        record.nominal.clone_from(&cq.nominal_quota);
        record.borrowing_limit.clone_from(&cq.borrowing_limit);
        self.cohorts.join(
            &cq.name,
            cq.cohort.as_deref(),
            cq.preemption.borrow_within_cohort.max_priority_threshold,
        );
        Ok(())
    }

    /// Drop the record of a cluster queue.
    pub fn remove_cluster_queue(&mut self, name: &str) -> Option<QuotaRecord> {
        self.cohorts.leave(name);
        self.records.remove(name)
    }

    /// Record of a cluster queue.
    pub fn record(&self, name: &str) -> Option<&QuotaRecord> {
        self.records.get(name)
    }

    /// Cohort grouping.
    pub const fn cohorts(&self) -> &CohortGraph {
        &self.cohorts
    }

    fn record_or_not_found(&self, name: &str) -> Result<&QuotaRecord, QueueError> {
        self.records
            .get(name)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, name))
    }

    /// Amount of `resource` a new reservation in `cluster_queue` could get now.
    ///
    /// Outside a cohort this is the unused nominal quota. Inside a cohort it is
    /// `nominal - in_use + sibling headroom`, capped by what the cohort as a
    /// whole still has (siblings may already have lent headroom to someone
    /// else) and by the queue's borrowing limit.
    pub fn available(&self, cluster_queue: &str, resource: &str) -> Result<Quantity, QueueError> {
        let record = self.record_or_not_found(cluster_queue)?;
        let own = record.nominal(resource) - record.usage(resource);
        let Some(cohort) = self.cohorts.cohort_of(cluster_queue) else {
            return Ok(own.clamp_non_negative());
        };

        let with_headroom = own + self.cohorts.sibling_headroom(cluster_queue, resource, self);
        let cohort_free: Quantity = self
            .cohorts
            .members(cohort)
            .filter_map(|cq| self.records.get(cq))
            .map(|r| r.nominal(resource) - r.usage(resource))
            .sum();
        let mut available = with_headroom.min(cohort_free);
        if let Some(limit) = record.borrowing_limit(resource) {
            available = available.min(own + limit);
        }
        Ok(available.clamp_non_negative())
    }

    /// Check whether `resources` fit in `cluster_queue` without charging.
    pub fn check(&self, cluster_queue: &str, resources: &ResourceList) -> Result<(), QueueError> {
        validate_resources(resources)?;
        self.record_or_not_found(cluster_queue)?;
        let mut shortages = Vec::new();
        for (resource, requested) in resources {
            if requested.is_zero() {
                continue;
            }
            let available = self.available(cluster_queue, resource)?;
            if *requested > available {
                shortages.push(Shortage {
                    resource: resource.clone(),
                    requested: *requested,
                    available,
                });
            }
        }
        if shortages.is_empty() {
            Ok(())
        } else {
            Err(QueueError::Denied {
                cluster_queue: cluster_queue.to_string(),
                shortages,
            })
        }
    }

    /// Reserve `resources` in `cluster_queue`, borrowing from the cohort if needed.
    pub fn reserve(&mut self, cluster_queue: &str, resources: &ResourceList) -> Result<(), QueueError> {
        self.check(cluster_queue, resources)?;
        self.charge(cluster_queue, resources)
    }

    /// Charge `resources` without a capacity check.
    ///
    /// Used when an admission already happened outside this ledger and is only
    /// being reflected here.
    pub fn charge(&mut self, cluster_queue: &str, resources: &ResourceList) -> Result<(), QueueError> {
        validate_resources(resources)?;
        let record = self
            .records
            .get_mut(cluster_queue)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, cluster_queue))?;
        record.add_usage(resources);
        Ok(())
    }

    /// Return `resources` previously reserved in `cluster_queue`.
    ///
    /// Releasing more than is in use is rejected and leaves the record untouched.
    pub fn release(&mut self, cluster_queue: &str, resources: &ResourceList) -> Result<(), QueueError> {
        validate_resources(resources)?;
        let record = self
            .records
            .get_mut(cluster_queue)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, cluster_queue))?;
        if let Some((name, q)) = resources.iter().find(|(name, q)| **q > record.usage(name)) {
            return Err(QueueError::Invalid(format!(
                "release of {q} {name} exceeds usage {} in cluster queue {cluster_queue}",
                record.usage(name)
            )));
        }
        record.sub_usage(resources);
        Ok(())
    }

    /// Borrowed amount of `resource` in `cluster_queue`.
    pub fn borrowed_amount(&self, cluster_queue: &str, resource: &str) -> Result<Quantity, QueueError> {
        Ok(self.record_or_not_found(cluster_queue)?.borrowed(resource))
    }

    /// True when admitting `resources` would push usage past nominal.
    pub fn would_borrow(&self, cluster_queue: &str, resources: &ResourceList) -> bool {
        self.records.get(cluster_queue).is_some_and(|r| {
            resources
                .iter()
                .any(|(name, q)| r.usage(name) + *q > r.nominal(name))
        })
    }

    /// Usage summary of every resource with quota or usage.
    pub fn resource_usage(&self, cluster_queue: &str) -> Result<Vec<ResourceUsage>, QueueError> {
        let record = self.record_or_not_found(cluster_queue)?;
        let mut names: Vec<&String> = record.nominal.keys().chain(record.usage.keys()).collect();
        names.sort();
        names.dedup();
        Ok(names
            .into_iter()
            .map(|name| ResourceUsage {
                name: name.clone(),
                total: record.usage(name),
                borrowed: record.borrowed(name),
            })
            .collect())
    }
}
