//! URL extraction from textual file content.
//!
//! The matching deliberately over-approximates: a false positive costs one
//! wasted probe, a missed URL costs a finding. Noise is cut afterwards by
//! [`is_reportable_url`].

use regex::Regex;
use std::collections::BTreeSet;
use url::Url;

/// Hostnames (optionally with a path prefix) that are never worth probing:
/// documentation placeholders, loopback addresses, and link targets that are
/// effectively guaranteed to be live.
const SKIP_DOMAINS: &[&str] = &[
    "example",
    "example.com",
    "example.org",
    "example.net",
    "localhost",
    "127.0.0.1",
    "0.0.0.0",
    "test.com",
    "dummy.com",
    "youtube.com",
    "stackoverflow.com",
    "bitly.com",
    "en.wikipedia.org",
    "apache.org/licenses",
];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"', '`', ']', '}'];

/// Compiled URL patterns applied to every text file.
pub struct UrlExtractor {
    base: Regex,
    markdown: Regex,
    href: Regex,
}

impl UrlExtractor {
    pub fn new() -> Self {
        // Static patterns; compilation cannot fail.
        Self {
            base: Regex::new(r#"(?i)https?://[^\s"'<>\\)]+"#).expect("static pattern"),
            markdown: Regex::new(r"\[[^\]]*\]\((https?://[^\s)]+)\)").expect("static pattern"),
            href: Regex::new(r#"(?i)href\s*=\s*["'](https?://[^"']+)["']"#)
                .expect("static pattern"),
        }
    }

    /// Pull every URL-like string out of `content`, cleaned and filtered.
    /// The returned set is deduplicated within the file.
    pub fn extract(&self, content: &str) -> BTreeSet<String> {
        let mut urls = BTreeSet::new();

        for m in self.base.find_iter(content) {
            urls.insert(clean_url(m.as_str()));
        }
        for caps in self.markdown.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                urls.insert(clean_url(m.as_str()));
            }
        }
        for caps in self.href.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                urls.insert(clean_url(m.as_str()));
            }
        }

        urls.retain(|u| is_reportable_url(u));
        urls
    }
}

impl Default for UrlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip punctuation that prose tends to glue onto a URL.
fn clean_url(raw: &str) -> String {
    raw.trim_end_matches(TRAILING_PUNCTUATION).to_string()
}

/// Decide whether a matched URL is worth probing.
pub fn is_reportable_url(url: &str) -> bool {
    // Template placeholders ({{var}}, ${var}, {0}) are not real URLs.
    if url.contains('{') || url.contains('}') {
        return false;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let path = parsed.path();
    for skip in SKIP_DOMAINS {
        match skip.split_once('/') {
            None => {
                if host == *skip {
                    return false;
                }
            }
            Some((skip_host, skip_path)) => {
                if host == skip_host && path.trim_start_matches('/').starts_with(skip_path) {
                    return false;
                }
            }
        }
    }

    // A bare root URL carries no signal about the repository's content.
    if (path.is_empty() || path == "/") && parsed.query().is_none() && parsed.fragment().is_none() {
        return false;
    }

    true
}
