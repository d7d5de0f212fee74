//! API implementation submodules.
//!
//! Each submodule contains `impl ForestechApi` blocks that extend the public
//! API with domain-specific methods. The struct definition remains in `lib.rs`.

mod builder;
mod network;
mod services;

pub use builder::ForestechApiBuilder;
