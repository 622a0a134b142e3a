//! callmeter engine library entry.
//!
//! This crate wires the registry contract, the in-memory reference registry,
//! tag building, the instrumented-call engine, and host-side interception into
//! one stack. It is consumed by the demo binary (`main.rs`) and by integration
//! tests.

pub mod config;
pub mod demo;
pub mod engine;
pub mod intercept;
pub mod obs;
pub mod registry;
pub mod tagging;

pub use engine::InstrumentedCallEngine;
pub use intercept::{Instrumented, Interceptor};
pub use obs::InMemoryRegistry;
pub use registry::MeterRegistry;
pub use tagging::{ClassMethodTags, TagBuilder};
