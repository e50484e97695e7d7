//! Deterministic, pure logic shared by the lifecycle driver.
//!
//! Core modules must be free of I/O side effects. They operate on marker facts
//! already read from disk and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod instrument;
pub mod types;
