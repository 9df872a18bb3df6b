//! Configuration models for the queue manager and cluster bootstrap.

pub mod manager;

pub use manager::{ClusterConfig, ManagerConfig, ENV_PREFIX};
