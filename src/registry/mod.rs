//! Registry existence checking module.
//!
//! Verifies whether extracted package names resolve in their public
//! registries, with caching and rate limiting to avoid duplicate and
//! throttled lookups.

mod cache;
pub mod checker;

pub use checker::{existence_url, RegistryChecker, RegistryEndpoints};
