//! Core types and errors for the recon scanner.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during a scan.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("GitHub authentication failed: {0}")]
    Auth(String),

    #[error("organization not found: {0}")]
    OrgNotFound(String),

    #[error("rate limited by {0}")]
    RateLimited(String),

    #[error("clone failed for {repo}: {reason}")]
    Clone { repo: String, reason: String },

    #[error("manifest parse error in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("probe tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;

/// Package ecosystem whose registry can be probed for existence.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pypi,
    Gem,
    Go,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 4] =
        [Ecosystem::Npm, Ecosystem::Pypi, Ecosystem::Gem, Ecosystem::Go];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Gem => "gem",
            Ecosystem::Go => "go",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository selected for scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    /// Repository enumerated from the GitHub API (archived repos are never selected).
    Remote {
        org: String,
        name: String,
        clone_url: String,
    },
    /// Pre-existing working tree on disk; trusted as-is.
    Local { path: PathBuf },
}

impl RepoSource {
    /// Human-readable identifier used for grouping in the report.
    pub fn display_name(&self) -> String {
        match self {
            RepoSource::Remote { org, name, .. } => format!("{}/{}", org, name),
            RepoSource::Local { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// A working tree ready for extraction.
#[derive(Debug, Clone)]
pub struct ClonedRepo {
    pub source: RepoSource,
    pub path: PathBuf,
    /// True when the cloner created the directory and may remove it.
    pub scratch: bool,
}

/// Deduplication key for extracted packages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageKey {
    pub ecosystem: Ecosystem,
    pub name: String,
}

impl PackageKey {
    pub fn new(ecosystem: Ecosystem, name: &str) -> Self {
        Self {
            ecosystem,
            name: name.to_string(),
        }
    }
}

/// Version and provenance for one extracted package within a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageEntry {
    pub version: Option<String>,
    pub files: BTreeSet<String>,
}

/// Everything extracted from one repository.
///
/// URLs and packages are stored in ordered maps keyed by their dedup
/// identity, with provenance collapsed into a file set per entry. Re-running
/// extraction on unchanged input therefore produces an identical value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoFindings {
    pub repo: String,
    pub urls: BTreeMap<String, BTreeSet<String>>,
    pub packages: BTreeMap<PackageKey, PackageEntry>,
    pub files_scanned: usize,
    pub files_skipped: usize,
}

impl RepoFindings {
    pub fn new(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            ..Default::default()
        }
    }

    /// Record a URL occurrence; duplicate URLs collapse onto one entry.
    pub fn record_url(&mut self, url: &str, file: &str) {
        self.urls
            .entry(url.to_string())
            .or_default()
            .insert(file.to_string());
    }

    /// Record a package occurrence. The first version seen wins; later
    /// occurrences only extend provenance.
    pub fn record_package(
        &mut self,
        ecosystem: Ecosystem,
        name: &str,
        version: Option<&str>,
        file: &str,
    ) {
        let entry = self
            .packages
            .entry(PackageKey::new(ecosystem, name))
            .or_default();
        if entry.version.is_none() {
            entry.version = version.map(str::to_string);
        }
        entry.files.insert(file.to_string());
    }
}

/// Classification of one probed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UrlStatus {
    /// Responded with a non-error status.
    Live,
    /// Responded with an HTTP error status.
    Broken { status: u16 },
    /// Timed out or could not be resolved; never reported as broken.
    Unknown,
}

impl UrlStatus {
    pub fn is_broken(&self) -> bool {
        matches!(self, UrlStatus::Broken { .. })
    }
}

/// Result of a registry existence lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryStatus {
    /// The name is claimed in its public registry.
    Exists { latest_version: Option<String> },
    /// The registry reports no such name: candidate for takeover.
    NotFound,
    /// Lookup failed; never counted as flagged or as safe.
    Unknown { reason: String },
}

impl RegistryStatus {
    pub fn is_flagged(&self) -> bool {
        matches!(self, RegistryStatus::NotFound)
    }
}

/// A broken URL with its provenance, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct BrokenUrl {
    pub url: String,
    pub status: Option<u16>,
    pub files: Vec<String>,
}

/// A potentially hijackable package reference, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedPackage {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: Option<String>,
    pub registry_url: String,
    pub files: Vec<String>,
}

/// Per-repository section of the final report.
#[derive(Debug, Clone, Serialize)]
pub struct RepoReport {
    pub repo: String,
    pub files_scanned: usize,
    pub urls_found: usize,
    pub packages_found: usize,
    pub broken_urls: Vec<BrokenUrl>,
    pub flagged_packages: Vec<FlaggedPackage>,
}

/// Complete result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Organization name or local folder that was scanned.
    pub target: String,
    pub repos_processed: usize,
    pub urls_total: usize,
    pub packages_total: usize,
    /// URLs whose probe came back inconclusive.
    pub urls_unknown: usize,
    /// Packages whose registry lookup came back inconclusive.
    pub packages_unknown: usize,
    /// Set when the validation stage did not run, with the reason.
    pub validation_skipped: Option<String>,
    pub repos: Vec<RepoReport>,
    pub duration_secs: f64,
    pub errors: Vec<String>,
}

/// Configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            user_agent: "ghrecon/0.1".to_string(),
        }
    }
}

/// Cooperative shutdown flag set by the signal handler and polled between
/// units of work.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
