//! Configuration handling for the scanner.

use crate::types::HttpConfig;
use clap::Parser;
use std::path::PathBuf;

/// GitHub organization recon: broken links and hijackable package references.
#[derive(Parser, Debug, Clone)]
#[command(name = "ghrecon")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// GitHub organization whose non-archived repositories should be scanned
    #[arg(short = 'o', long, required_unless_present = "folder", conflicts_with = "folder")]
    pub org: Option<String>,

    /// Local folder containing already-cloned repositories (bypasses the API)
    #[arg(short = 'f', long)]
    pub folder: Option<PathBuf>,

    /// GitHub API bearer token; raises unauthenticated rate limits
    #[arg(long, env = "GH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory for scratch clones (defaults to repos_<org>)
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Number of repositories to clone and extract in parallel
    #[arg(short = 'p', long, default_value = "4")]
    pub parallel: usize,

    /// Request timeout in seconds (API, clone, registry lookups)
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Maximum retries for retryable failures (rate limits, transient errors)
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Rate limit for registry lookups (requests per second)
    #[arg(long, default_value = "10")]
    pub rate_limit: u32,

    /// Skip files larger than this many bytes during extraction
    #[arg(long, default_value = "1048576")]
    pub max_file_size: u64,

    /// External HTTP probing binary used to classify URLs
    #[arg(long, default_value = "httpx")]
    pub probe_tool: String,

    /// Wall-clock ceiling in seconds for the whole probe invocation
    #[arg(long, default_value = "300")]
    pub probe_timeout: u64,

    /// Skip URL validation (extraction and hijack checks still run)
    #[arg(long)]
    pub skip_validate: bool,

    /// Skip registry existence checks (only extract packages)
    #[arg(long)]
    pub skip_registry_check: bool,

    /// Keep scratch clone directories after the run
    #[arg(long)]
    pub keep_clones: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode: only report repositories with findings
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            org: None,
            folder: None,
            token: None,
            workdir: None,
            parallel: 4,
            timeout: 30,
            max_retries: 3,
            rate_limit: 10,
            max_file_size: 1_048_576,
            probe_tool: "httpx".to_string(),
            probe_timeout: 300,
            skip_validate: false,
            skip_registry_check: false,
            keep_clones: false,
            json: false,
            output: None,
            verbose: false,
            quiet: false,
        }
    }
}

impl Config {
    /// Get HTTP configuration from the run config.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
            user_agent: "ghrecon/0.1".to_string(),
        }
    }

    /// Name the report is labelled with: the org, or the folder basename.
    pub fn target_name(&self) -> String {
        if let Some(ref org) = self.org {
            return org.clone();
        }
        if let Some(ref folder) = self.folder {
            return folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| folder.display().to_string());
        }
        String::new()
    }

    /// Scratch directory for remote clones.
    pub fn clone_workdir(&self) -> PathBuf {
        if let Some(ref dir) = self.workdir {
            return dir.clone();
        }
        let org = self.org.as_deref().unwrap_or("scan");
        PathBuf::from(format!("repos_{}", org))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workdir_named_after_org() {
        let config = Config {
            org: Some("acme".to_string()),
            ..Default::default()
        };
        assert_eq!(config.clone_workdir(), PathBuf::from("repos_acme"));
    }

    #[test]
    fn test_explicit_workdir_wins() {
        let config = Config {
            org: Some("acme".to_string()),
            workdir: Some(PathBuf::from("/tmp/scratch")),
            ..Default::default()
        };
        assert_eq!(config.clone_workdir(), PathBuf::from("/tmp/scratch"));
    }

    #[test]
    fn test_target_name_from_folder() {
        let config = Config {
            folder: Some(PathBuf::from("/srv/mirrors/acme-repos")),
            ..Default::default()
        };
        assert_eq!(config.target_name(), "acme-repos");
    }
}
