//! Colored console rendering of scan results.
//!
//! Output is grouped by repository in processing order; within a repository
//! broken URLs come before flagged packages. Inconclusive probes and lookups
//! appear only in the summary counts, never as findings.

use crate::types::{RepoReport, ScanReport};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Console output handler with colors and formatting.
pub struct ConsoleReport {
    verbose: bool,
    json_mode: bool,
    quiet: bool,
}

impl ConsoleReport {
    pub fn new(verbose: bool, json_mode: bool, quiet: bool) -> Self {
        Self {
            verbose,
            json_mode,
            quiet,
        }
    }

    /// Print the run header.
    pub fn print_run_start(&self, target: &str, repo_count: usize) {
        if self.json_mode || self.quiet {
            return;
        }
        println!(
            "{} Scanning {} ({} repositories)",
            "[*]".bright_blue(),
            target.bright_white(),
            repo_count
        );
    }

    /// Print scan progress (only in verbose mode).
    pub fn print_progress(&self, message: &str) {
        if self.json_mode || !self.verbose {
            return;
        }
        println!("{} {}", "[.]".dimmed(), message.dimmed());
    }

    /// Print info message.
    pub fn print_info(&self, message: &str) {
        if self.json_mode || self.quiet {
            return;
        }
        println!("{} {}", "[*]".bright_blue(), message);
    }

    /// Print a warning that survives quiet mode.
    pub fn print_warning(&self, message: &str) {
        if self.json_mode {
            return;
        }
        println!("{} {}", "[!]".yellow(), message.yellow());
    }

    /// Print one repository's section of the report.
    pub fn print_repo(&self, report: &RepoReport) {
        if self.json_mode {
            return;
        }

        let has_findings = !report.broken_urls.is_empty() || !report.flagged_packages.is_empty();
        if self.quiet && !has_findings {
            return;
        }

        println!();
        println!(
            "{} {}",
            "===".bright_cyan(),
            report.repo.bright_white().bold()
        );

        if !report.broken_urls.is_empty() {
            println!(
                "  {}",
                format!("Broken URLs ({}):", report.broken_urls.len())
                    .red()
                    .bold()
            );
            for broken in &report.broken_urls {
                let status = broken
                    .status
                    .map(|s| format!(" [{}]", s))
                    .unwrap_or_default();
                println!("    - {}{}", broken.url, status.red());
                for file in &broken.files {
                    println!("        {}", file.dimmed());
                }
            }
        }

        if !report.flagged_packages.is_empty() {
            println!(
                "  {}",
                format!(
                    "Potentially hijackable packages ({}):",
                    report.flagged_packages.len()
                )
                .on_red()
                .white()
                .bold()
            );
            for flagged in &report.flagged_packages {
                let version = flagged
                    .version
                    .as_deref()
                    .map(|v| format!(" ({})", v))
                    .unwrap_or_default();
                println!(
                    "    - [{}] {}{} -> {}",
                    flagged.ecosystem.to_string().yellow(),
                    flagged.name.bright_white().bold(),
                    version,
                    flagged.registry_url.dimmed()
                );
                for file in &flagged.files {
                    println!("        {}", file.dimmed());
                }
            }
        }

        if !has_findings {
            println!("  {}", "no findings".green());
        }
    }

    /// Print the run summary.
    pub fn print_summary(&self, report: &ScanReport) {
        if self.json_mode {
            return;
        }

        let broken_total: usize = report.repos.iter().map(|r| r.broken_urls.len()).sum();
        let flagged_total: usize = report.repos.iter().map(|r| r.flagged_packages.len()).sum();

        println!();
        println!("{}", "=== Scan Summary ===".bright_cyan());
        println!("  Target:    {}", report.target);
        println!("  Duration:  {:.2}s", report.duration_secs);
        println!("  Repos:     {}", report.repos_processed);
        println!("  URLs:      {}", report.urls_total);
        println!("  Packages:  {}", report.packages_total);

        if let Some(ref reason) = report.validation_skipped {
            println!(
                "  {}",
                format!("URL validation NOT completed: {}", reason).yellow()
            );
        } else {
            println!(
                "  Broken:    {} ({} unknown)",
                broken_total, report.urls_unknown
            );
        }

        if flagged_total > 0 {
            println!(
                "  {}",
                format!(
                    "POTENTIALLY HIJACKABLE PACKAGES: {} ({} unknown)",
                    flagged_total, report.packages_unknown
                )
                .red()
                .bold()
            );
        } else {
            println!(
                "  {}",
                format!(
                    "No hijackable packages found ({} unknown).",
                    report.packages_unknown
                )
                .green()
            );
        }

        if !report.errors.is_empty() {
            println!();
            println!("{}", "Warnings during the run:".yellow());
            for error in &report.errors {
                println!("  - {}", error.dimmed());
            }
        }

        println!();
    }

    /// Create a progress bar for the registry checking phase.
    pub fn create_progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if self.json_mode || self.quiet {
            return None;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(message.to_string());
        Some(pb)
    }
}

impl Default for ConsoleReport {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}
