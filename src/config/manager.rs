//! Queue manager and cluster bootstrap configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::core::model::{ClusterQueue, LocalQueue};

/// Prefix of environment variables read by [`ManagerConfig::from_env`].
pub const ENV_PREFIX: &str = "COHORT_QUEUE_";

const fn default_pending_limit() -> usize {
    1000
}

const fn default_clean_up_interval_ms() -> u64 {
    30_000
}

const fn default_true() -> bool {
    true
}

/// Tunables of a [`crate::core::QueueManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Page size used when a visibility caller omits `limit`.
    #[serde(default = "default_pending_limit")]
    pub default_pending_limit: usize,
    /// Offset used when a visibility caller omits `offset`.
    #[serde(default)]
    pub default_pending_offset: usize,
    /// Upper bound on any requested page size.
    #[serde(default)]
    pub max_pending_limit: Option<usize>,
    /// Period of the background clean-up sweep.
    #[serde(default = "default_clean_up_interval_ms")]
    pub clean_up_interval_ms: u64,
    /// Park workloads whose local queue is unknown instead of rejecting them.
    #[serde(default = "default_true")]
    pub buffer_unresolved_workloads: bool,
    /// Allow deleting queues that still have dependents.
    #[serde(default)]
    pub allow_force_delete: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_pending_limit: default_pending_limit(),
            default_pending_offset: 0,
            max_pending_limit: None,
            clean_up_interval_ms: default_clean_up_interval_ms(),
            buffer_unresolved_workloads: true,
            allow_force_delete: false,
        }
    }
}

impl ManagerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_pending_limit == 0 {
            return Err("default_pending_limit must be greater than 0".into());
        }
        if self.clean_up_interval_ms == 0 {
            return Err("clean_up_interval_ms must be greater than 0".into());
        }
        if let Some(max) = self.max_pending_limit {
            if max == 0 {
                return Err("max_pending_limit must be greater than 0".into());
            }
            if self.default_pending_limit > max {
                return Err(format!(
                    "default_pending_limit {} exceeds max_pending_limit {max}",
                    self.default_pending_limit
                ));
            }
        }
        Ok(())
    }

    /// Parse from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build from `COHORT_QUEUE_*` variables on top of the defaults.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = env_var("DEFAULT_PENDING_LIMIT")? {
            cfg.default_pending_limit = v;
        }
        if let Some(v) = env_var("DEFAULT_PENDING_OFFSET")? {
            cfg.default_pending_offset = v;
        }
        if let Some(v) = env_var("MAX_PENDING_LIMIT")? {
            cfg.max_pending_limit = Some(v);
        }
        if let Some(v) = env_var("CLEAN_UP_INTERVAL_MS")? {
            cfg.clean_up_interval_ms = v;
        }
        if let Some(v) = env_var("BUFFER_UNRESOLVED_WORKLOADS")? {
            cfg.buffer_unresolved_workloads = v;
        }
        if let Some(v) = env_var("ALLOW_FORCE_DELETE")? {
            cfg.allow_force_delete = v;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Resolve an optional visibility window against the defaults and cap.
    pub fn resolve_window(&self, offset: Option<usize>, limit: Option<usize>) -> (usize, usize) {
        let offset = offset.unwrap_or(self.default_pending_offset);
        let limit = limit.unwrap_or(self.default_pending_limit);
        let limit = self.max_pending_limit.map_or(limit, |max| limit.min(max));
        (offset, limit)
    }
}

fn env_var<T>(suffix: &str) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    match std::env::var(&key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(None),
    }
}

/// Manager settings plus the queues to create at start-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Manager tunables.
    #[serde(default)]
    pub manager: ManagerConfig,
    /// Cluster queues to create.
    #[serde(default)]
    pub cluster_queues: Vec<ClusterQueue>,
    /// Local queues to create.
    #[serde(default)]
    pub local_queues: Vec<LocalQueue>,
}

impl ClusterConfig {
    /// Validate the manager settings and every queue definition.
    pub fn validate(&self) -> Result<(), String> {
        self.manager.validate()?;
        let mut names = std::collections::HashSet::new();
        for cq in &self.cluster_queues {
            cq.validate().map_err(|e| e.to_string())?;
            if !names.insert(cq.name.as_str()) {
                return Err(format!("cluster queue `{}` declared twice", cq.name));
            }
        }
        for lq in &self.local_queues {
            if !names.contains(lq.cluster_queue.as_str()) {
                return Err(format!(
                    "local queue `{}` references undeclared cluster queue `{}`",
                    lq.key(),
                    lq.cluster_queue
                ));
            }
        }
        Ok(())
    }

    /// Parse from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading cluster config {}", path.display()))?;
        Self::from_json_str(&raw).map_err(anyhow::Error::msg)
    }
}
