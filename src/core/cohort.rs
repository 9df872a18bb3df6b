//! Cohort membership and cohort-wide capacity aggregation.
//!
//! The graph only records who belongs where. Quantities always come from the
//! [`QuotaLedger`], so a membership change never triggers any re-evaluation
//! by itself: the next reservation or snapshot simply sees the new grouping.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::ledger::QuotaLedger;
use crate::core::model::Priority;
use crate::core::{ObjectKind, QueueError};
use crate::util::quantity::Quantity;

/// Membership of cluster queues in cohorts.
#[derive(Debug, Clone, Default)]
pub struct CohortGraph {
    members: BTreeMap<String, BTreeSet<String>>,
    cohort_of: HashMap<String, String>,
    thresholds: HashMap<String, Option<Priority>>,
}

impl CohortGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `cluster_queue` in `cohort`, leaving any previous cohort.
    ///
    /// `threshold` is the queue's borrow-within-cohort priority threshold and
    /// only affects [`Self::members_ordered_by_priority_threshold`].
    pub fn join(&mut self, cluster_queue: &str, cohort: Option<&str>, threshold: Option<Priority>) {
        self.leave(cluster_queue);
        let Some(cohort) = cohort else {
            return;
        };
        self.members
            .entry(cohort.to_string())
            .or_default()
            .insert(cluster_queue.to_string());
        self.cohort_of
            .insert(cluster_queue.to_string(), cohort.to_string());
        self.thresholds.insert(cluster_queue.to_string(), threshold);
        tracing::debug!(cluster_queue, cohort, "joined cohort");
    }

    /// Remove `cluster_queue` from its cohort; empty cohorts disappear.
    pub fn leave(&mut self, cluster_queue: &str) {
        self.thresholds.remove(cluster_queue);
        let Some(cohort) = self.cohort_of.remove(cluster_queue) else {
            return;
        };
        if let Some(set) = self.members.get_mut(&cohort) {
            set.remove(cluster_queue);
            if set.is_empty() {
                self.members.remove(&cohort);
            }
        }
        tracing::debug!(cluster_queue, cohort = %cohort, "left cohort");
    }

    /// Cohort of a cluster queue.
    pub fn cohort_of(&self, cluster_queue: &str) -> Option<&str> {
        self.cohort_of.get(cluster_queue).map(String::as_str)
    }

    /// True when the cohort has at least one member.
    pub fn contains(&self, cohort: &str) -> bool {
        self.members.contains_key(cohort)
    }

    /// Members of a cohort in name order.
    pub fn members(&self, cohort: &str) -> impl Iterator<Item = &str> {
        self.members
            .get(cohort)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Other members of the cohort `cluster_queue` belongs to.
    pub fn siblings<'a>(&'a self, cluster_queue: &'a str) -> impl Iterator<Item = &'a str> {
        self.cohort_of(cluster_queue)
            .into_iter()
            .flat_map(move |cohort| self.members(cohort))
            .filter(move |m| *m != cluster_queue)
    }

    /// Sum over members of `max(0, nominal - in_use)` for `resource`.
    pub fn headroom(
        &self,
        cohort: &str,
        resource: &str,
        ledger: &QuotaLedger,
    ) -> Result<Quantity, QueueError> {
        if !self.contains(cohort) {
            return Err(QueueError::not_found(ObjectKind::Cohort, cohort));
        }
        Ok(self
            .members(cohort)
            .filter_map(|cq| ledger.record(cq))
            .map(|r| r.unused_nominal(resource))
            .sum())
    }

    /// Unused nominal quota of the siblings of `cluster_queue`.
    pub fn sibling_headroom(&self, cluster_queue: &str, resource: &str, ledger: &QuotaLedger) -> Quantity {
        self.siblings(cluster_queue)
            .filter_map(|cq| ledger.record(cq))
            .map(|r| r.unused_nominal(resource))
            .sum()
    }

    /// Members ordered by borrow-within-cohort threshold, lowest first.
    ///
    /// Queues without a threshold sort last; ties break on name. The
    /// preemption engine walks siblings in this order so that queues most
    /// willing to give up low-priority work are considered first.
    pub fn members_ordered_by_priority_threshold(&self, cohort: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self.members(cohort).collect();
        out.sort_by_key(|cq| {
            (
                self.thresholds
                    .get(*cq)
                    .copied()
                    .flatten()
                    .unwrap_or(Priority::MAX),
                *cq,
            )
        });
        out
    }
}
