//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod events;
pub mod memory;
pub mod snapshot;
pub mod telemetry;
