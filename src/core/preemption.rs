//! Victim selection for workloads the ledger cannot admit directly.
//!
//! The engine is a pure function of a [`Snapshot`]. It never touches live
//! state; callers must re-reserve against a fresh view before evicting.
//!
//! Search order:
//! 1. admitted workloads of the preemptor's own cluster queue, when the
//!    within-cluster-queue policy allows it;
//! 2. borrowing workloads of cohort siblings, largest borrower first, when the
//!    reclaim policy allows it. Equal borrowers are taken in
//!    borrow-threshold order, lowest threshold first. Own-queue candidates
//!    are appended behind them.
//!
//! Each step walks its candidates greedily on a scratch ledger until the
//! preemptor fits, then drops every victim whose eviction turned out to be
//! unnecessary. A step that cannot free enough on every short resource
//! contributes nothing.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::core::ledger::QuotaLedger;
use crate::core::model::{
    BorrowWithinCohortPolicy, Candidate, ObjectKey, PreemptionPolicy, Priority, WorkloadInfo,
};
use crate::core::snapshot::Snapshot;
use crate::core::QueueError;
use crate::util::quantity::Quantity;

/// Why a workload was picked as a victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimReason {
    /// Lower priority workload of the same cluster queue.
    WithinClusterQueue,
    /// Sibling workload running on capacity borrowed from the preemptor's queue.
    InCohortReclamation,
    /// Sibling workload evicted while the preemptor itself borrows.
    InCohortReclaimWhileBorrowing,
}

/// A workload the reconciler should evict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Victim {
    /// Identity of the workload.
    pub workload: ObjectKey,
    /// Cluster queue the workload is charged to.
    pub cluster_queue: String,
    /// Its priority.
    pub priority: Priority,
    /// Why it was picked.
    pub reason: VictimReason,
}

struct Target<'a> {
    info: &'a WorkloadInfo,
    reason: VictimReason,
}

impl Target<'_> {
    fn victim(&self) -> Victim {
        Victim {
            workload: self.info.key.clone(),
            cluster_queue: self.info.cluster_queue.clone(),
            priority: self.info.priority,
            reason: self.reason,
        }
    }
}

/// Stateless victim search.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreemptionEngine;

impl PreemptionEngine {
    /// Victims whose eviction lets `pending` fit in `cluster_queue`.
    ///
    /// Returns `Some(vec![])` when the workload already fits and `None` when
    /// no permitted combination frees enough on every short resource.
    pub fn compute_victims(
        snapshot: &Snapshot,
        pending: &WorkloadInfo,
        cluster_queue: &str,
    ) -> Option<Vec<Victim>> {
        let cq = snapshot.cluster_queue(cluster_queue)?;
        let ledger = snapshot.ledger();
        let short: Vec<String> = match ledger.check(cluster_queue, &pending.requests) {
            Ok(()) => return Some(Vec::new()),
            Err(QueueError::Denied { shortages, .. }) => {
                shortages.into_iter().map(|s| s.resource).collect()
            }
            Err(err) => {
                tracing::debug!(workload = %pending.key, error = %err, "cannot compute victims");
                return None;
            }
        };

        let policy = cq.spec.preemption;
        let preemptor = pending.candidate();
        let within = match policy.within_cluster_queue {
            PreemptionPolicy::Any => PreemptionPolicy::LowerOrNewerEqualPriority,
            other => other,
        };

        let mut own: Vec<Target<'_>> = cq
            .admitted
            .iter()
            .filter(|w| w.key != pending.key)
            .filter(|w| short.iter().any(|r| w.uses(r)))
            .filter(|w| within.permits(&preemptor, &w.candidate()))
            .map(|info| Target {
                info,
                reason: VictimReason::WithinClusterQueue,
            })
            .collect();
        own.sort_by(|a, b| {
            (a.info.priority, a.info.created_at_ms, &a.info.key)
                .cmp(&(b.info.priority, b.info.created_at_ms, &b.info.key))
        });

        if !own.is_empty() {
            if let Some(victims) = minimal_set(ledger, cluster_queue, pending, &short, &own) {
                tracing::debug!(workload = %pending.key, victims = victims.len(), "preempting within cluster queue");
                return Some(victims);
            }
        }

        if policy.reclaim_within_cohort == PreemptionPolicy::Never {
            return None;
        }
        let cohort = ledger.cohorts().cohort_of(cluster_queue)?;
        let borrowing = ledger.would_borrow(cluster_queue, &pending.requests);
        let bwc = policy.borrow_within_cohort;
        if borrowing && bwc.policy == BorrowWithinCohortPolicy::Never {
            return None;
        }
        let reason = if borrowing {
            VictimReason::InCohortReclaimWhileBorrowing
        } else {
            VictimReason::InCohortReclamation
        };

        // Sibling rank breaks ties between equally borrowing siblings.
        let mut cohort_targets: Vec<(Quantity, usize, Target<'_>)> = Vec::new();
        let siblings = ledger.cohorts().members_ordered_by_priority_threshold(cohort);
        for (rank, sibling) in siblings.into_iter().enumerate() {
            if sibling == cluster_queue {
                continue;
            }
            let (Some(record), Some(sibling_cq)) =
                (ledger.record(sibling), snapshot.cluster_queue(sibling))
            else {
                continue;
            };
            let borrowed_short: Vec<&String> = short
                .iter()
                .filter(|r| !record.borrowed(r).is_zero())
                .collect();
            if borrowed_short.is_empty() {
                continue;
            }
            let borrowed_total: Quantity = borrowed_short.iter().map(|r| record.borrowed(r)).sum();
            for info in &sibling_cq.admitted {
                if !borrowed_short.iter().any(|r| info.uses(r)) {
                    continue;
                }
                let candidate = info.candidate();
                if !policy.reclaim_within_cohort.permits(&preemptor, &candidate) {
                    continue;
                }
                if borrowing && !within_borrow_threshold(&preemptor, &candidate, bwc.max_priority_threshold) {
                    continue;
                }
                cohort_targets.push((borrowed_total, rank, Target { info, reason }));
            }
        }
        cohort_targets.sort_by(|(qa, ra, a), (qb, rb, b)| {
            (Reverse(*qa), *ra, a.info.priority, a.info.created_at_ms, &a.info.key).cmp(&(
                Reverse(*qb),
                *rb,
                b.info.priority,
                b.info.created_at_ms,
                &b.info.key,
            ))
        });

        let mut candidates: Vec<Target<'_>> = cohort_targets.into_iter().map(|(_, _, t)| t).collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.extend(own);
        let victims = minimal_set(ledger, cluster_queue, pending, &short, &candidates)?;
        tracing::debug!(workload = %pending.key, victims = victims.len(), "reclaiming within cohort");
        Some(victims)
    }
}

fn within_borrow_threshold(
    preemptor: &Candidate<'_>,
    candidate: &Candidate<'_>,
    threshold: Option<Priority>,
) -> bool {
    candidate.priority < preemptor.priority && threshold.is_none_or(|t| candidate.priority <= t)
}

fn minimal_set(
    ledger: &QuotaLedger,
    cluster_queue: &str,
    pending: &WorkloadInfo,
    short: &[String],
    candidates: &[Target<'_>],
) -> Option<Vec<Victim>> {
    let mut scratch = ledger.clone();
    let mut chosen: Vec<&Target<'_>> = Vec::new();
    let mut fits = false;

    for target in candidates {
        if target.reason != VictimReason::WithinClusterQueue {
            // A sibling that stopped borrowing has nothing left to reclaim.
            let still_borrowing = scratch
                .record(&target.info.cluster_queue)
                .is_some_and(|r| short.iter().any(|res| !r.borrowed(res).is_zero()));
            if !still_borrowing {
                continue;
            }
        }
        if scratch
            .release(&target.info.cluster_queue, &target.info.requests)
            .is_err()
        {
            continue;
        }
        chosen.push(target);
        if scratch.check(cluster_queue, &pending.requests).is_ok() {
            fits = true;
            break;
        }
    }
    if !fits {
        return None;
    }

    // Put back every victim, last-chosen first, that the preemptor can do without.
    let mut i = chosen.len().saturating_sub(1);
    while i > 0 {
        i -= 1;
        let target = chosen[i];
        if scratch
            .charge(&target.info.cluster_queue, &target.info.requests)
            .is_err()
        {
            continue;
        }
        if scratch.check(cluster_queue, &pending.requests).is_ok() {
            chosen.remove(i);
        } else if scratch
            .release(&target.info.cluster_queue, &target.info.requests)
            .is_err()
        {
            return None;
        }
    }
    Some(chosen.into_iter().map(Target::victim).collect())
}
