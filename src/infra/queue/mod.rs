//! Pending-workload queue backends.

pub mod memory;

pub use memory::{InMemoryQueue, QueueOrderKey};
