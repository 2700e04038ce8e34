//! Pipeline orchestration: enumerate, clone, extract, validate, check, report.
//!
//! Clone and extraction of distinct repositories run in a bounded pool;
//! URL validation happens once, after all extraction, over the global
//! deduplicated set. One bad repository never aborts the run.

use crate::clone::{list_local_repos, Cloner};
use crate::config::Config;
use crate::extract::Extractor;
use crate::github::RepoEnumerator;
use crate::registry::{existence_url, RegistryChecker};
use crate::report::ConsoleReport;
use crate::types::{
    BrokenUrl, FlaggedPackage, PackageKey, ReconError, RegistryStatus, RepoFindings, RepoReport,
    RepoSource, Result, ScanReport, Shutdown, UrlStatus,
};
use crate::validate::UrlValidator;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Main scanner that drives the whole pipeline.
pub struct Scanner {
    config: Config,
    cloner: Arc<Cloner>,
    extractor: Arc<Extractor>,
    registry: Arc<RegistryChecker>,
    validator: UrlValidator,
    console: ConsoleReport,
    shutdown: Shutdown,
}

impl Scanner {
    /// Create a scanner from the run configuration.
    pub fn new(config: Config, shutdown: Shutdown) -> Result<Self> {
        let http = config.http_config();

        let cloner = Arc::new(Cloner::new(config.clone_workdir(), config.timeout));
        let extractor = Arc::new(Extractor::new(config.max_file_size));
        let registry = Arc::new(RegistryChecker::new(
            &http,
            config.rate_limit,
            3600, // 1 hour cache TTL
        )?);
        let validator =
            UrlValidator::new(&config.probe_tool, config.timeout, config.probe_timeout);
        let console = ConsoleReport::new(config.verbose, config.json, config.quiet);

        Ok(Self {
            config,
            cloner,
            extractor,
            registry,
            validator,
            console,
            shutdown,
        })
    }

    /// Run the full pipeline and produce the report.
    ///
    /// Only organization resolution fails the run. A missing probe tool
    /// degrades to a report without URL validation; per-repository failures
    /// are collected as warnings.
    pub async fn run(&self) -> Result<ScanReport> {
        let start = Instant::now();
        let target = self.config.target_name();

        let sources = self.collect_sources().await?;
        self.console.print_run_start(&target, sources.len());

        // Settle the probe tool question up front so a missing binary is
        // announced before any cloning starts.
        let mut validation_skipped: Option<String> = None;
        if self.config.skip_validate {
            validation_skipped = Some("disabled with --skip-validate".to_string());
        } else if let Err(e) = self.validator.ensure_available() {
            self.console.print_warning(&format!(
                "{}; URL validation will be skipped",
                e
            ));
            validation_skipped = Some(e.to_string());
        }

        let mut errors: Vec<String> = Vec::new();
        let (repo_findings, repo_errors) = self.clone_and_extract(sources).await;
        errors.extend(repo_errors);

        // Global dedup across repositories.
        let all_urls: Vec<String> = repo_findings
            .iter()
            .flat_map(|f| f.urls.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let unique_packages: Vec<PackageKey> = repo_findings
            .iter()
            .flat_map(|f| f.packages.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        self.console.print_info(&format!(
            "Extracted {} unique urls and {} unique packages from {} repositories",
            all_urls.len(),
            unique_packages.len(),
            repo_findings.len()
        ));

        if self.shutdown.is_triggered() && validation_skipped.is_none() {
            validation_skipped = Some("interrupted before validation".to_string());
        }

        let url_statuses = if validation_skipped.is_none() {
            self.console.print_progress("Probing extracted urls...");
            match self.validator.validate(&all_urls).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    self.console
                        .print_warning(&format!("{}; URL validation not completed", e));
                    validation_skipped = Some(e.to_string());
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let registry_statuses = self.check_registries(&unique_packages).await;

        // Assemble per-repository sections in processing order.
        let repos: Vec<RepoReport> = repo_findings
            .iter()
            .map(|findings| build_repo_report(findings, &url_statuses, &registry_statuses))
            .collect();

        let urls_unknown = if validation_skipped.is_none() {
            all_urls
                .iter()
                .filter(|u| {
                    matches!(
                        url_statuses.get(*u).copied().unwrap_or(UrlStatus::Unknown),
                        UrlStatus::Unknown
                    )
                })
                .count()
        } else {
            0
        };
        let packages_unknown = registry_statuses
            .values()
            .filter(|s| matches!(s, RegistryStatus::Unknown { .. }))
            .count();

        let report = ScanReport {
            target,
            repos_processed: repo_findings.len(),
            urls_total: all_urls.len(),
            packages_total: unique_packages.len(),
            urls_unknown,
            packages_unknown,
            validation_skipped,
            repos,
            duration_secs: start.elapsed().as_secs_f64(),
            errors,
        };

        for repo in &report.repos {
            self.console.print_repo(repo);
        }
        self.console.print_summary(&report);

        Ok(report)
    }

    /// Enumerate remote repositories or list the local folder.
    async fn collect_sources(&self) -> Result<Vec<RepoSource>> {
        if let Some(ref org) = self.config.org {
            let enumerator = RepoEnumerator::new(
                &self.config.http_config(),
                self.config.token.as_deref(),
                self.shutdown.clone(),
            )?;
            enumerator.list_org_repos(org).await
        } else if let Some(ref folder) = self.config.folder {
            list_local_repos(folder)
        } else {
            Err(ReconError::ConfigError(
                "either --org or --folder is required".to_string(),
            ))
        }
    }

    /// Clone and extract every source with bounded parallelism, restoring
    /// input order for the report. Failed repositories become warnings.
    async fn clone_and_extract(
        &self,
        sources: Vec<RepoSource>,
    ) -> (Vec<RepoFindings>, Vec<String>) {
        let parallel = self.config.parallel.max(1);

        let results: Vec<(usize, String, Result<Option<RepoFindings>>)> =
            stream::iter(sources.into_iter().enumerate())
                .map(|(idx, source)| {
                    let cloner = self.cloner.clone();
                    let extractor = self.extractor.clone();
                    let shutdown = self.shutdown.clone();
                    let keep_clones = self.config.keep_clones;
                    async move {
                        let name = source.display_name();
                        if shutdown.is_triggered() {
                            return (idx, name, Ok(None));
                        }
                        let outcome =
                            process_repo(&cloner, &extractor, source, keep_clones).await;
                        (idx, name, outcome.map(Some))
                    }
                })
                .buffer_unordered(parallel)
                .collect()
                .await;

        let mut ordered = results;
        ordered.sort_by_key(|(idx, _, _)| *idx);

        let mut findings = Vec::new();
        let mut errors = Vec::new();
        for (_, name, outcome) in ordered {
            match outcome {
                Ok(Some(f)) => {
                    self.console
                        .print_progress(&format!("{}: extraction done", name));
                    findings.push(f);
                }
                Ok(None) => debug!("{}: skipped after shutdown", name),
                Err(e) => {
                    warn!("{}", e);
                    errors.push(e.to_string());
                }
            }
        }
        (findings, errors)
    }

    /// Existence-check every unique package with bounded concurrency.
    async fn check_registries(
        &self,
        packages: &[PackageKey],
    ) -> HashMap<PackageKey, RegistryStatus> {
        if self.config.skip_registry_check || packages.is_empty() || self.shutdown.is_triggered()
        {
            return HashMap::new();
        }

        self.console
            .print_progress("Checking packages against public registries...");
        let pb = self
            .console
            .create_progress_bar(packages.len() as u64, "Checking registries");

        let registry = &self.registry;
        let concurrency = 16;
        let statuses: HashMap<PackageKey, RegistryStatus> = stream::iter(packages.iter())
            .map(|key| {
                let pb = pb.clone();
                async move {
                    let status = registry.check(key).await;
                    if let Some(ref pb) = pb {
                        pb.inc(1);
                    }
                    (key.clone(), status)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        statuses
    }
}

/// Clone one repository, extract it, and release the scratch directory.
async fn process_repo(
    cloner: &Cloner,
    extractor: &Arc<Extractor>,
    source: RepoSource,
    keep_clones: bool,
) -> Result<RepoFindings> {
    let cloned = cloner.clone_repo(&source).await?;

    // Extraction is pure filesystem work; keep it off the async workers.
    let extractor = extractor.clone();
    let repo = cloned.clone();
    let findings = match tokio::task::spawn_blocking(move || extractor.extract(&repo)).await {
        Ok(f) => f,
        Err(e) => {
            warn!("{}: extraction task failed: {}", source.display_name(), e);
            RepoFindings::new(&source.display_name())
        }
    };

    if cloned.scratch && !keep_clones {
        if let Err(e) = tokio::fs::remove_dir_all(&cloned.path).await {
            warn!(
                "failed to remove scratch clone {}: {}",
                cloned.path.display(),
                e
            );
        }
    }

    Ok(findings)
}

/// Assemble one repository's report section: broken URLs first, then
/// flagged packages, both with their provenance. `Unknown` statuses are
/// excluded from both sections.
fn build_repo_report(
    findings: &RepoFindings,
    url_statuses: &HashMap<String, UrlStatus>,
    registry_statuses: &HashMap<PackageKey, RegistryStatus>,
) -> RepoReport {
    let broken_urls: Vec<BrokenUrl> = findings
        .urls
        .iter()
        .filter_map(|(url, files)| {
            match url_statuses.get(url) {
                Some(UrlStatus::Broken { status }) => Some(BrokenUrl {
                    url: url.clone(),
                    status: Some(*status),
                    files: files.iter().cloned().collect(),
                }),
                _ => None,
            }
        })
        .collect();

    let flagged_packages: Vec<FlaggedPackage> = findings
        .packages
        .iter()
        .filter_map(|(key, entry)| {
            let status = registry_statuses.get(key)?;
            if !status.is_flagged() {
                return None;
            }
            Some(FlaggedPackage {
                ecosystem: key.ecosystem,
                name: key.name.clone(),
                version: entry.version.clone(),
                registry_url: existence_url(key.ecosystem, &key.name),
                files: entry.files.iter().cloned().collect(),
            })
        })
        .collect();

    RepoReport {
        repo: findings.repo.clone(),
        files_scanned: findings.files_scanned,
        urls_found: findings.urls.len(),
        packages_found: findings.packages.len(),
        broken_urls,
        flagged_packages,
    }
}
