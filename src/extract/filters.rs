//! Filters to keep obvious non-package names out of the hijack check.
//!
//! Manifest parsing over-approximates, so generic words and config keys
//! occasionally surface as dependency names. Probing those wastes registry
//! calls and pollutes the report with names nobody could depend on.

use crate::types::Ecosystem;
use tracing::trace;

/// Generic words that show up as keys in loosely structured manifests but
/// are never real dependency declarations.
const SKIP_NAMES: &[&str] = &[
    "host", "port", "design", "pretty", "performance", "value", "index", "main", "default",
    "debug", "error", "message", "json", "config", "release", "object", "input", "output",
    "none", "true", "false", "null", "env", "test", "data", "code", "temp", "sample",
];

/// Decide whether an extracted dependency name should be kept.
pub fn is_reportable_package(ecosystem: Ecosystem, name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        return false;
    }
    if SKIP_NAMES.contains(&trimmed.to_lowercase().as_str()) {
        trace!("filter: generic name: {}", trimmed);
        return false;
    }
    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if trimmed.chars().all(|c| matches!(c, '-' | '_' | '.')) {
        return false;
    }
    // Shouting identifiers are env vars or constants, not package names.
    if trimmed.len() >= 3
        && trimmed
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        trace!("filter: constant-style name: {}", trimmed);
        return false;
    }

    trimmed.chars().all(|c| is_allowed_char(ecosystem, c))
}

/// Character set per ecosystem: Go module paths carry slashes and dots,
/// npm scopes carry `@` and one slash, the rest stay close to
/// `[a-z0-9._-]`.
fn is_allowed_char(ecosystem: Ecosystem, c: char) -> bool {
    if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
        return true;
    }
    match ecosystem {
        Ecosystem::Go => matches!(c, '/' | '~'),
        Ecosystem::Npm => matches!(c, '/' | '@'),
        Ecosystem::Pypi | Ecosystem::Gem => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_words_are_filtered() {
        assert!(!is_reportable_package(Ecosystem::Npm, "config"));
        assert!(!is_reportable_package(Ecosystem::Pypi, "test"));
        assert!(!is_reportable_package(Ecosystem::Gem, "DEBUG"));
    }

    #[test]
    fn test_degenerate_names_are_filtered() {
        assert!(!is_reportable_package(Ecosystem::Npm, "x"));
        assert!(!is_reportable_package(Ecosystem::Npm, "1234"));
        assert!(!is_reportable_package(Ecosystem::Npm, "---"));
        assert!(!is_reportable_package(Ecosystem::Pypi, "MY_SECRET_KEY"));
    }

    #[test]
    fn test_real_names_pass() {
        assert!(is_reportable_package(Ecosystem::Npm, "left-pad"));
        assert!(is_reportable_package(Ecosystem::Npm, "@acme/ui-kit"));
        assert!(is_reportable_package(Ecosystem::Pypi, "requests"));
        assert!(is_reportable_package(Ecosystem::Gem, "nokogiri"));
        assert!(is_reportable_package(Ecosystem::Go, "github.com/acme/widget"));
    }

    #[test]
    fn test_slashes_only_where_the_ecosystem_has_them() {
        assert!(!is_reportable_package(Ecosystem::Pypi, "acme/requests"));
        assert!(!is_reportable_package(Ecosystem::Gem, "acme/gem"));
        assert!(is_reportable_package(Ecosystem::Go, "acme.dev/widget"));
    }
}
