//! callmeter core: instrumentation data model, tag primitives, and error types.
//!
//! This crate defines the declarative instrumentation spec, the call context
//! handed to the engine, and the error surface shared by the engine, registry
//! adapters, and configuration loading. It intentionally carries no runtime or
//! registry dependencies so it can be reused by any host that wraps calls.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `CallMeterError`/`Result` so a malformed
//! declaration never takes the host process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod call;
pub mod error;
pub mod spec;
pub mod tags;

/// Shared result type.
pub use error::{CallMeterError, Result};
