//! URL validation via an external HTTP probing tool.
//!
//! All extracted URLs are probed in one batch invocation to amortize process
//! startup. The tool (httpx by default) receives URLs on stdin and emits one
//! JSON object per probe on stdout. URLs the tool times out on, cannot
//! resolve, or never reports stay `Unknown` — only a confirmed HTTP error
//! status counts as broken.

use crate::types::{ReconError, Result, UrlStatus};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// One line of the probe tool's JSON output (the fields we read).
#[derive(Debug, Deserialize)]
struct ProbeRecord {
    #[serde(default)]
    url: Option<String>,
    /// The original input line, when the tool echoes it back.
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    failed: bool,
}

impl ProbeRecord {
    fn key(&self) -> Option<&str> {
        self.input.as_deref().or(self.url.as_deref())
    }

    fn status(&self) -> UrlStatus {
        if self.failed {
            return UrlStatus::Unknown;
        }
        match self.status_code {
            Some(code) if code >= 400 => UrlStatus::Broken { status: code },
            Some(_) => UrlStatus::Live,
            None => UrlStatus::Unknown,
        }
    }
}

/// Batch validator backed by an external probing binary.
pub struct UrlValidator {
    tool: String,
    per_request_timeout: Duration,
    wall_clock: Duration,
}

impl UrlValidator {
    pub fn new(tool: &str, timeout_secs: u64, wall_clock_secs: u64) -> Self {
        Self {
            tool: tool.to_string(),
            per_request_timeout: Duration::from_secs(timeout_secs),
            wall_clock: Duration::from_secs(wall_clock_secs),
        }
    }

    /// Locate the probing binary. Its absence fails the validation stage
    /// (and only that stage).
    pub fn ensure_available(&self) -> Result<PathBuf> {
        find_in_path(&self.tool).ok_or_else(|| {
            ReconError::ToolUnavailable(format!("{} not found on PATH", self.tool))
        })
    }

    /// Probe `urls` in one batch. Every input URL gets an entry in the
    /// returned map; anything the tool does not settle is `Unknown`.
    pub async fn validate(&self, urls: &[String]) -> Result<HashMap<String, UrlStatus>> {
        let mut statuses: HashMap<String, UrlStatus> = urls
            .iter()
            .map(|u| (u.clone(), UrlStatus::Unknown))
            .collect();

        if urls.is_empty() {
            return Ok(statuses);
        }

        let binary = self.ensure_available()?;
        debug!("probing {} urls via {}", urls.len(), binary.display());

        let mut child = Command::new(&binary)
            .arg("-silent")
            .arg("-json")
            .arg("-no-color")
            .arg("-timeout")
            .arg(self.per_request_timeout.as_secs().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ReconError::ToolUnavailable(format!("failed to spawn {}: {}", self.tool, e))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            ReconError::ToolUnavailable(format!("{}: no stdin handle", self.tool))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ReconError::ToolUnavailable(format!("{}: no stdout handle", self.tool))
        })?;
        let input = format!("{}\n", urls.join("\n"));

        // Feed stdin and drain stdout concurrently. A streaming tool emits
        // results while input is still arriving; once either pipe buffer
        // fills the two sides deadlock if driven sequentially.
        let writer = async move {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                debug!("probe stdin closed early: {}", e);
            }
            // dropping stdin signals end of input
        };
        let reader = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ProbeRecord>(line) {
                    Ok(record) => {
                        if let Some(key) = record.key() {
                            if let Some(slot) = statuses.get_mut(key) {
                                *slot = record.status();
                            }
                        }
                    }
                    Err(e) => debug!("unparseable probe line ({}): {}", e, line),
                }
            }
        };

        let run = async {
            tokio::join!(writer, reader);
            child.wait().await
        };

        // Results parsed before a failure or the wall-clock expiry are kept;
        // only unresolved URLs stay Unknown.
        match tokio::time::timeout(self.wall_clock, run).await {
            Ok(Ok(status)) => {
                if !status.success() {
                    debug!("probe tool exited with {}", status);
                }
            }
            Ok(Err(e)) => {
                // kill_on_drop reaps the child.
                warn!("probe tool failed ({}); unresolved urls left unknown", e);
            }
            Err(_) => {
                warn!(
                    "probe tool exceeded {}s ceiling; unresolved urls left unknown",
                    self.wall_clock.as_secs()
                );
            }
        }

        Ok(statuses)
    }
}

/// Resolve a tool name against PATH, or verify an explicit path.
fn find_in_path(tool: &str) -> Option<PathBuf> {
    let direct = Path::new(tool);
    if direct.components().count() > 1 {
        return direct.is_file().then(|| direct.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}
