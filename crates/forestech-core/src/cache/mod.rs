//! Response caching for read paths.
//!
//! Provides a process-wide (but explicitly injected) response cache and the
//! per-consumer fetcher built on it:
//! - TTL-checked reads with no background eviction
//! - Fail-fast reads while the backend is disconnected
//! - Cancellation of superseded or abandoned fetches

mod fetch;
mod store;

pub use fetch::{CachedFetch, FetchOptions, FetchState};
pub use store::ResponseCache;
