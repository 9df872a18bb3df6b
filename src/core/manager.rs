//! Queue manager facade.
//!
//! The manager owns the [`QueueIndex`] and the [`QuotaLedger`] behind a single
//! `parking_lot::RwLock`. Every mutation holds the write lock for the whole
//! index update; snapshots and visibility queries share the read lock.
//!
//! Waiters blocked in [`QueueManager::heads`] park on a `Condvar` guarded by a
//! separate [`WakeState`] mutex. Mutations drop the state lock before touching
//! the wake mutex, and waiters take the wake mutex before reading state, so a
//! notification can never slip in between a waiter's check and its wait.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::ManagerConfig;
use crate::core::audit::{build_audit_event, AuditSink};
use crate::core::index::{PendingEntry, Placement, QueueIndex};
use crate::core::ledger::QuotaLedger;
use crate::core::model::{ClusterQueue, LocalQueue, ObjectKey, ResourceUsage, Workload, WorkloadInfo};
use crate::core::preemption::Victim;
use crate::core::snapshot::Snapshot;
use crate::core::{ObjectKind, QueueError, QueueResult};

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Existence checks against the external object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// True when the cluster queue still exists.
    async fn cluster_queue_exists(&self, name: &str) -> bool;
    /// True when the local queue still exists.
    async fn local_queue_exists(&self, key: &ObjectKey) -> bool;
    /// True when the workload still exists.
    async fn workload_exists(&self, key: &ObjectKey) -> bool;
}

/// Change notification delivered by the object-store watch layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A cluster queue was created.
    ClusterQueueAdded(ClusterQueue),
    /// A cluster queue definition changed.
    ClusterQueueUpdated(ClusterQueue),
    /// A cluster queue was removed.
    ClusterQueueDeleted(String),
    /// A local queue was created.
    LocalQueueAdded(LocalQueue),
    /// A local queue definition changed.
    LocalQueueUpdated(LocalQueue),
    /// A local queue was removed.
    LocalQueueDeleted(ObjectKey),
    /// A workload was created.
    WorkloadAdded(Workload),
    /// A workload changed.
    WorkloadUpdated(Workload),
    /// A workload was removed.
    WorkloadDeleted(ObjectKey),
}

/// Shared state for Condvar-based wake notifications.
#[derive(Debug, Default)]
pub struct WakeState {
    /// Flag indicating pending work may be available.
    pub pending_available: bool,
    /// Flag to release every waiter for good.
    pub shutdown: bool,
}

/// What one clean-up sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanUpReport {
    /// Cluster queues removed.
    pub cluster_queues: usize,
    /// Local queues removed.
    pub local_queues: usize,
    /// Workloads removed, buffered ones included.
    pub workloads: usize,
}

impl CleanUpReport {
    /// True when the sweep removed nothing.
    pub const fn is_empty(&self) -> bool {
        self.cluster_queues == 0 && self.local_queues == 0 && self.workloads == 0
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    index: QueueIndex,
    ledger: QuotaLedger,
}

/// Facade over the queue index, quota ledger and cohort graph.
pub struct QueueManager {
    config: ManagerConfig,
    state: RwLock<ManagerState>,
    wake_state: Mutex<WakeState>,
    wake_condvar: Condvar,
    audit: Option<Mutex<Box<dyn AuditSink>>>,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("config", &self.config)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl QueueManager {
    /// Create an empty manager.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ManagerState::default()),
            wake_state: Mutex::new(WakeState::default()),
            wake_condvar: Condvar::new(),
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    /// Active configuration.
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register a cluster queue.
    pub fn add_cluster_queue(&self, cq: ClusterQueue) -> QueueResult<()> {
        let name = cq.name.clone();
        {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.add_cluster_queue(cq, ledger)?;
        }
        tracing::info!(cluster_queue = %name, "cluster queue added");
        self.audit(&name, Some(&name), "add");
        Ok(())
    }

    /// Replace quota, limits, policy and cohort of a cluster queue.
    pub fn update_cluster_queue(&self, cq: ClusterQueue) -> QueueResult<()> {
        let name = cq.name.clone();
        {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.update_cluster_queue(cq, ledger)?;
        }
        tracing::info!(cluster_queue = %name, "cluster queue updated");
        self.audit(&name, Some(&name), "update");
        Ok(())
    }

    /// Remove a cluster queue; dependents block this unless force delete is allowed.
    pub fn delete_cluster_queue(&self, name: &str) -> QueueResult<()> {
        {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.delete_cluster_queue(name, self.config.allow_force_delete, ledger)?;
        }
        tracing::info!(cluster_queue = %name, "cluster queue deleted");
        self.audit(name, Some(name), "delete");
        Ok(())
    }

    /// Register a local queue; its cluster queue must already exist.
    ///
    /// Returns the number of buffered workloads resolved by this queue.
    pub fn add_local_queue(&self, lq: LocalQueue) -> QueueResult<usize> {
        let key = lq.key();
        let cq = lq.cluster_queue.clone();
        let resolved = {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.add_local_queue(lq, ledger)?
        };
        tracing::info!(local_queue = %key, cluster_queue = %cq, resolved, "local queue added");
        self.audit(key.to_string(), Some(&cq), "add");
        if resolved > 0 {
            self.signal_pending();
        }
        Ok(resolved)
    }

    /// Rebind a local queue to another cluster queue.
    pub fn update_local_queue(&self, lq: LocalQueue) -> QueueResult<()> {
        let key = lq.key();
        let cq = lq.cluster_queue.clone();
        self.state.write().index.update_local_queue(lq)?;
        tracing::info!(local_queue = %key, cluster_queue = %cq, "local queue updated");
        self.audit(key.to_string(), Some(&cq), "update");
        self.signal_pending();
        Ok(())
    }

    /// Remove a local queue; remaining workloads block this unless force delete is allowed.
    pub fn delete_local_queue(&self, key: &ObjectKey) -> QueueResult<()> {
        self.state
            .write()
            .index
            .delete_local_queue(key, self.config.allow_force_delete)?;
        tracing::info!(local_queue = %key, "local queue deleted");
        self.audit(key.to_string(), None, "delete");
        Ok(())
    }

    /// Insert or replace a workload.
    pub fn add_or_update_workload(&self, workload: Workload) -> QueueResult<Placement> {
        let key = workload.key();
        let placement = {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.add_or_update_workload(workload, self.config.buffer_unresolved_workloads, ledger)?
        };
        self.after_placement(&key, &placement);
        Ok(placement)
    }

    /// Apply a workload update; unknown workloads are ignored.
    pub fn update_workload(&self, workload: Workload) -> QueueResult<Placement> {
        let key = workload.key();
        let placement = {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.update_workload(workload, self.config.buffer_unresolved_workloads, ledger)?
        };
        self.after_placement(&key, &placement);
        Ok(placement)
    }

    /// Remove a workload and release its quota; unknown workloads are a no-op.
    pub fn delete_workload(&self, key: &ObjectKey) -> bool {
        let removed = {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.delete_workload(key, ledger)
        };
        if removed {
            tracing::debug!(workload = %key, "workload deleted");
            self.audit(key.to_string(), None, "delete");
        }
        removed
    }

    /// Reserve quota for a pending workload against the live ledger.
    ///
    /// On denial the workload stays pending and the shortages are returned.
    pub fn admit_workload(&self, key: &ObjectKey) -> QueueResult<String> {
        let cq = {
            let mut state = self.state.write();
            let ManagerState { index, ledger } = &mut *state;
            index.admit_workload(key, ledger)?
        };
        tracing::info!(workload = %key, cluster_queue = %cq, "workload admitted");
        self.audit(key.to_string(), Some(&cq), "admit");
        Ok(cq)
    }

    /// Dispatch one watch notification.
    pub fn handle_event(&self, event: LifecycleEvent) -> QueueResult<()> {
        match event {
            LifecycleEvent::ClusterQueueAdded(cq) => self.add_cluster_queue(cq),
            LifecycleEvent::ClusterQueueUpdated(cq) => self.update_cluster_queue(cq),
            LifecycleEvent::ClusterQueueDeleted(name) => self.delete_cluster_queue(&name),
            LifecycleEvent::LocalQueueAdded(lq) => self.add_local_queue(lq).map(|_| ()),
            LifecycleEvent::LocalQueueUpdated(lq) => self.update_local_queue(lq),
            LifecycleEvent::LocalQueueDeleted(key) => self.delete_local_queue(&key),
            LifecycleEvent::WorkloadAdded(w) => self.add_or_update_workload(w).map(|_| ()),
            LifecycleEvent::WorkloadUpdated(w) => self.update_workload(w).map(|_| ()),
            LifecycleEvent::WorkloadDeleted(key) => {
                self.delete_workload(&key);
                Ok(())
            }
        }
    }

    /// Immutable view of every cluster queue for one admission cycle.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot::capture(&state.index, &state.ledger)
    }

    /// Victims for `pending` computed on a fresh snapshot.
    pub fn compute_victims(&self, pending: &WorkloadInfo, cluster_queue: &str) -> Option<Vec<Victim>> {
        self.snapshot().compute_victims(pending, cluster_queue)
    }

    /// Window of the pending order of a cluster queue.
    pub fn pending_workloads(
        &self,
        cluster_queue: &str,
        offset: usize,
        limit: usize,
    ) -> QueueResult<Vec<PendingEntry>> {
        self.state
            .read()
            .index
            .pending_workloads(cluster_queue, offset, limit)
    }

    /// Window of the pending order of one local queue.
    pub fn pending_workloads_in_local_queue(
        &self,
        namespace: &str,
        name: &str,
        offset: usize,
        limit: usize,
    ) -> QueueResult<Vec<PendingEntry>> {
        self.state.read().index.pending_workloads_in_local_queue(
            &ObjectKey::new(namespace, name),
            offset,
            limit,
        )
    }

    /// Per-resource usage of a cluster queue.
    pub fn resource_usage(&self, cluster_queue: &str) -> QueueResult<Vec<ResourceUsage>> {
        self.state.read().ledger.resource_usage(cluster_queue)
    }

    /// Number of pending and admitted workloads of a cluster queue.
    pub fn workload_counts(&self, cluster_queue: &str) -> QueueResult<(usize, usize)> {
        let state = self.state.read();
        let entry = state
            .index
            .cluster_queue(cluster_queue)
            .ok_or_else(|| QueueError::not_found(ObjectKind::ClusterQueue, cluster_queue))?;
        Ok((entry.pending().len(), entry.admitted().len()))
    }

    /// Number of workloads waiting for their local queue.
    pub fn buffered_workloads(&self) -> usize {
        self.state.read().index.buffered_len()
    }

    /// Block until some cluster queue has pending work.
    ///
    /// Returns the head of every non-empty cluster queue, or `None` once the
    /// manager has been shut down.
    pub fn heads(&self) -> Option<Vec<WorkloadInfo>> {
        let mut wake = self.wake_state.lock();
        loop {
            if wake.shutdown {
                return None;
            }
            let heads = self.state.read().index.heads();
            if !heads.is_empty() {
                return Some(heads);
            }
            wake.pending_available = false;
            while !wake.pending_available && !wake.shutdown {
                self.wake_condvar.wait(&mut wake);
            }
        }
    }

    /// Release every waiter; later [`Self::heads`] calls return `None` at once.
    pub fn shutdown(&self) {
        let mut wake = self.wake_state.lock();
        wake.shutdown = true;
        drop(wake);
        self.wake_condvar.notify_all();
        tracing::info!("queue manager shut down");
    }

    /// True after [`Self::shutdown`].
    pub fn is_shutdown(&self) -> bool {
        self.wake_state.lock().shutdown
    }

    /// Purge every object the store no longer has.
    pub async fn clean_up_once<O>(&self, store: &O) -> CleanUpReport
    where
        O: ObjectStore + ?Sized,
    {
        let (cluster_queues, local_queues, awaited, workloads) = {
            let state = self.state.read();
            let cqs: Vec<String> = state
                .index
                .cluster_queues()
                .map(|e| e.spec().name.clone())
                .collect();
            (
                cqs,
                state.index.local_queue_keys(),
                state.index.awaited_local_queues(),
                state.index.workload_keys(),
            )
        };

        let mut gone_cqs = Vec::new();
        for name in cluster_queues {
            if !store.cluster_queue_exists(&name).await {
                gone_cqs.push(name);
            }
        }
        let mut gone_lqs = Vec::new();
        for key in local_queues {
            if !store.local_queue_exists(&key).await {
                gone_lqs.push(key);
            }
        }
        let mut never_arrived = Vec::new();
        for key in awaited {
            if !store.local_queue_exists(&key).await {
                never_arrived.push(key);
            }
        }
        let mut gone_workloads = Vec::new();
        for key in workloads {
            if !store.workload_exists(&key).await {
                gone_workloads.push(key);
            }
        }

        let mut report = CleanUpReport::default();
        let mut state = self.state.write();
        let ManagerState { index, ledger } = &mut *state;
        for key in &gone_workloads {
            if index.delete_workload(key, ledger) {
                report.workloads += 1;
            }
        }
        for key in &gone_lqs {
            if index.delete_local_queue(key, true).is_ok() {
                report.local_queues += 1;
            }
        }
        for key in &never_arrived {
            report.workloads += index.discard_buffered(key);
        }
        for name in &gone_cqs {
            if index.delete_cluster_queue(name, true, ledger).is_ok() {
                report.cluster_queues += 1;
            }
        }
        drop(state);

        if !report.is_empty() {
            tracing::info!(
                cluster_queues = report.cluster_queues,
                local_queues = report.local_queues,
                workloads = report.workloads,
                "clean-up purged stale objects"
            );
            self.audit("clean-up", None, "purge");
        }
        report
    }

    /// Sweep periodically until `token` is cancelled, then shut down.
    pub async fn clean_up_on_context<O>(&self, store: &O, token: CancellationToken)
    where
        O: ObjectStore + ?Sized,
    {
        let interval = Duration::from_millis(self.config.clean_up_interval_ms);
        tracing::info!(interval_ms = self.config.clean_up_interval_ms, "clean-up loop started");
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            // The sweep only awaits the store before it takes the write lock,
            // so dropping it mid-way leaves the index untouched.
            tokio::select! {
                () = token.cancelled() => break,
                _ = self.clean_up_once(store) => {}
            }
        }
        tracing::info!("clean-up loop cancelled");
        self.shutdown();
    }

    /// Run [`Self::clean_up_on_context`] as a detached task on `spawner`.
    pub fn spawn_clean_up<S, O>(self: &Arc<Self>, spawner: &S, store: Arc<O>, token: CancellationToken)
    where
        S: Spawn,
        O: ObjectStore + 'static,
    {
        let manager = Arc::clone(self);
        spawner.spawn(async move {
            manager.clean_up_on_context(store.as_ref(), token).await;
        });
    }

    fn after_placement(&self, key: &ObjectKey, placement: &Placement) {
        match placement {
            Placement::Pending(cq) => {
                tracing::debug!(workload = %key, cluster_queue = %cq, "workload queued");
                self.audit(key.to_string(), Some(cq), "queue");
                self.signal_pending();
            }
            Placement::Admitted(cq) => {
                tracing::debug!(workload = %key, cluster_queue = %cq, "admitted workload recorded");
                self.audit(key.to_string(), Some(cq), "record_admitted");
            }
            Placement::Buffered => {
                tracing::warn!(workload = %key, "local queue unknown, workload buffered");
                self.audit(key.to_string(), None, "buffer");
            }
            Placement::Removed => {
                tracing::debug!(workload = %key, "finished workload removed");
                self.audit(key.to_string(), None, "finish");
            }
            Placement::Ignored => {
                tracing::debug!(workload = %key, "update for unknown workload ignored");
            }
        }
    }

    fn signal_pending(&self) {
        let mut wake = self.wake_state.lock();
        wake.pending_available = true;
        drop(wake);
        self.wake_condvar.notify_all();
    }

    fn audit(&self, object: impl Into<String>, cluster_queue: Option<&str>, action: &str) {
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .record(build_audit_event(object, cluster_queue, action, None));
        }
    }
}
