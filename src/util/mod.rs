//! Shared utilities: clock, quantities and tracing setup.

pub mod clock;
pub mod quantity;
pub mod telemetry;

pub use clock::*;
pub use quantity::*;
pub use telemetry::*;
