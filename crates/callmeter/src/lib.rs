//! Top-level facade crate for callmeter.
//!
//! Re-exports the core model and the engine so users can depend on a single crate.

pub mod core {
    pub use callmeter_core::*;
}

pub mod engine {
    pub use callmeter_engine::*;
}
