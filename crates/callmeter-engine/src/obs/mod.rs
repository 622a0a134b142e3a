//! In-process reference registry.
//!
//! Instruments are stored as atomics behind a `DashMap` keyed by `MeterId` and
//! read back through `RegistrySnapshot`. Exporting or scraping is left to the
//! host; the snapshot is serde-serializable for that purpose.

pub mod memory;

pub use memory::{
    InMemoryRegistry, LongTaskSnapshot, RegistrySnapshot, TimerSnapshot, ValueSnapshot,
};
