//! Extraction of URLs and dependency declarations from cloned working trees.
//!
//! The walk skips version-control metadata and binary content, applies the
//! URL patterns to everything else under the size ceiling, and hands
//! recognized manifest files to the typed parsers. A single unreadable or
//! malformed file is logged and skipped; the walk always completes.

mod content;
mod filters;
mod manifests;
mod urls;

pub use content::{ContentInspector, ContentKind};
pub use filters::is_reportable_package;
pub use manifests::{parse as parse_manifest, recognize, Dependency, ManifestKind};
pub use urls::{is_reportable_url, UrlExtractor};

use crate::types::{ClonedRepo, RepoFindings};
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, warn};

/// Walks one repository tree and produces its [`RepoFindings`].
pub struct Extractor {
    max_file_size: u64,
    inspector: ContentInspector,
    urls: UrlExtractor,
}

impl Extractor {
    pub fn new(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            inspector: ContentInspector::new(),
            urls: UrlExtractor::new(),
        }
    }

    /// Extract everything from `repo`. Never fails: per-file problems are
    /// logged and counted as skipped.
    pub fn extract(&self, repo: &ClonedRepo) -> RepoFindings {
        let mut findings = RepoFindings::new(&repo.source.display_name());

        let walker = WalkBuilder::new(&repo.path)
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .filter_entry(|entry| !is_vcs_metadata(entry.file_name()))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("walk error in {}: {}", repo.path.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            self.scan_file(entry.path(), &repo.path, &mut findings);
        }

        debug!(
            "{}: {} files scanned, {} skipped, {} urls, {} packages",
            findings.repo,
            findings.files_scanned,
            findings.files_skipped,
            findings.urls.len(),
            findings.packages.len()
        );
        findings
    }

    fn scan_file(&self, path: &Path, root: &Path, findings: &mut RepoFindings) {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.max_file_size => {
                debug!("skipping large file ({} bytes): {}", meta.len(), rel);
                findings.files_skipped += 1;
                return;
            }
            Err(e) => {
                warn!("cannot stat {}: {}", rel, e);
                findings.files_skipped += 1;
                return;
            }
            _ => {}
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!("cannot read {}: {}", rel, e);
                findings.files_skipped += 1;
                return;
            }
        };

        if self.inspector.inspect(&bytes) == ContentKind::Binary {
            findings.files_skipped += 1;
            return;
        }

        let content = String::from_utf8_lossy(&bytes);

        for url in self.urls.extract(&content) {
            findings.record_url(&url, &rel);
        }

        let file_name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        if let Some(kind) = manifests::recognize(file_name) {
            match manifests::parse(kind, &content, &rel) {
                Ok(deps) => {
                    for dep in deps {
                        if filters::is_reportable_package(dep.ecosystem, &dep.name) {
                            findings.record_package(
                                dep.ecosystem,
                                &dep.name,
                                dep.version.as_deref(),
                                &rel,
                            );
                        }
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }

        findings.files_scanned += 1;
    }
}

fn is_vcs_metadata(name: &OsStr) -> bool {
    matches!(name.to_str(), Some(".git" | ".hg" | ".svn"))
}
