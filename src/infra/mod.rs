//! In-memory ordered containers backing the queue index.

pub mod queue;

pub use queue::InMemoryQueue;
