//! Shallow cloning of enumerated repositories via the system `git` binary.
//!
//! Destinations are derived deterministically from org/repo so two runs (or
//! two workers) aim at the same path; a per-destination lock serializes
//! duplicate targets while distinct repositories clone in parallel.

use crate::types::{ClonedRepo, ReconError, RepoSource, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct Cloner {
    workdir: PathBuf,
    timeout: Duration,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl Cloner {
    pub fn new(workdir: PathBuf, timeout_secs: u64) -> Self {
        Self {
            workdir,
            timeout: Duration::from_secs(timeout_secs),
            locks: DashMap::new(),
        }
    }

    /// Deterministic scratch destination for a remote repository.
    pub fn dest_dir(&self, org: &str, name: &str) -> PathBuf {
        self.workdir.join(org).join(name)
    }

    /// Produce a working tree for `source`.
    ///
    /// Local sources are wrapped without copying. Remote sources are
    /// shallow-cloned (depth 1, default branch only); an existing clone at
    /// the destination is reused, a stale partial directory is replaced.
    /// Named apart from `Clone::clone` so an `Arc<Cloner>` receiver cannot
    /// resolve to the wrong method.
    pub async fn clone_repo(&self, source: &RepoSource) -> Result<ClonedRepo> {
        match source {
            RepoSource::Local { path } => {
                if !path.is_dir() {
                    return Err(ReconError::Clone {
                        repo: source.display_name(),
                        reason: format!("{} is not a directory", path.display()),
                    });
                }
                Ok(ClonedRepo {
                    source: source.clone(),
                    path: path.clone(),
                    scratch: false,
                })
            }
            RepoSource::Remote {
                org,
                name,
                clone_url,
            } => {
                let dest = self.dest_dir(org, name);

                // Serialize clones of the same repository by target path.
                let lock = self
                    .locks
                    .entry(dest.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone();
                let _guard = lock.lock().await;

                if dest.join(".git").is_dir() {
                    debug!("reusing existing clone at {}", dest.display());
                    return Ok(ClonedRepo {
                        source: source.clone(),
                        path: dest,
                        scratch: true,
                    });
                }

                if dest.exists() {
                    warn!("removing stale partial clone at {}", dest.display());
                    tokio::fs::remove_dir_all(&dest)
                        .await
                        .map_err(|e| ReconError::Clone {
                            repo: source.display_name(),
                            reason: format!("could not clear {}: {}", dest.display(), e),
                        })?;
                }

                if let Some(parent) = dest.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }

                self.run_git_clone(clone_url, &dest, &source.display_name())
                    .await?;

                Ok(ClonedRepo {
                    source: source.clone(),
                    path: dest,
                    scratch: true,
                })
            }
        }
    }

    async fn run_git_clone(&self, url: &str, dest: &Path, repo: &str) -> Result<()> {
        debug!("cloning {} into {}", repo, dest.display());

        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--single-branch")
            .arg("--quiet")
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| ReconError::Clone {
            repo: repo.to_string(),
            reason: format!("failed to spawn git: {}", e),
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                remove_partial(dest).await;
                Err(ReconError::Clone {
                    repo: repo.to_string(),
                    reason: summarize_stderr(&output.stderr),
                })
            }
            Ok(Err(e)) => {
                remove_partial(dest).await;
                Err(ReconError::Clone {
                    repo: repo.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                // kill_on_drop has already reaped the child here.
                remove_partial(dest).await;
                Err(ReconError::Clone {
                    repo: repo.to_string(),
                    reason: format!("timed out after {}s", self.timeout.as_secs()),
                })
            }
        }
    }
}

/// Best-effort removal of a partially written clone directory.
async fn remove_partial(dest: &Path) {
    if dest.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(dest).await {
            warn!("failed to remove partial clone {}: {}", dest.display(), e);
        }
    }
}

fn summarize_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "git exited with an error".to_string())
}

/// Enumerate subdirectories of a local folder as repositories to scan.
pub fn list_local_repos(folder: &Path) -> Result<Vec<RepoSource>> {
    if !folder.is_dir() {
        return Err(ReconError::ConfigError(format!(
            "{} is not a directory",
            folder.display()
        )));
    }

    let mut sources = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            sources.push(RepoSource::Local { path });
        }
    }

    // Deterministic processing (and report) order.
    sources.sort_by_key(|s| s.display_name());
    Ok(sources)
}
