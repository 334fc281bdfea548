//! Top-level facade crate for instruments.
//!
//! Re-exports the core primitives and the registry so users can depend on a single crate.

pub mod core {
    pub use instruments_core::*;
}

pub mod registry {
    pub use instruments_registry::*;
}
