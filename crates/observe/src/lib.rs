//! Logging initialization shared by the linear pool tooling and its tests.
pub mod tracing;
