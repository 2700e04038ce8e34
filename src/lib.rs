//! ghrecon - GitHub organization reconnaissance
//!
//! Enumerates an organization's repositories (or walks already-cloned ones),
//! extracts URLs and package dependency declarations from their files,
//! validates the URLs with an external probing tool, and flags dependencies
//! that no public registry knows about.

pub mod clone;
pub mod config;
pub mod extract;
pub mod github;
pub mod registry;
pub mod report;
pub mod retry;
pub mod scanner;
pub mod types;
pub mod validate;

pub use config::Config;
pub use scanner::Scanner;
pub use types::{ReconError, Result, ScanReport, Shutdown};
