//! Public registry existence checks for extracted packages.
//!
//! A dependency name that its own registry does not know is a takeover
//! candidate: anyone can claim it and be pulled in by whoever builds the
//! scanned repository. Lookups are rate limited, cached, and retried with
//! backoff on registry throttling; anything inconclusive stays `Unknown`.

use crate::registry::cache::RegistryCache;
use crate::retry::RetryPolicy;
use crate::types::{Ecosystem, HttpConfig, PackageKey, ReconError, RegistryStatus, Result};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// npm registry package document (the part we read).
#[derive(Debug, Deserialize)]
struct NpmPackageInfo {
    #[serde(rename = "dist-tags")]
    dist_tags: Option<DistTags>,
}

#[derive(Debug, Deserialize)]
struct DistTags {
    latest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PypiDocument {
    info: Option<PypiInfo>,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GemDocument {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoLatestDocument {
    #[serde(rename = "Version")]
    version: Option<String>,
}

/// Base URLs of the public registries. Injectable so lookups can be pointed
/// at a mirror or a local server.
#[derive(Debug, Clone)]
pub struct RegistryEndpoints {
    pub npm: String,
    pub pypi: String,
    pub gem: String,
    pub go: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            npm: "https://registry.npmjs.org".to_string(),
            pypi: "https://pypi.org".to_string(),
            gem: "https://rubygems.org".to_string(),
            go: "https://proxy.golang.org".to_string(),
        }
    }
}

impl RegistryEndpoints {
    /// The existence endpoint probed for one (ecosystem, name) pair.
    pub fn url_for(&self, ecosystem: Ecosystem, name: &str) -> String {
        match ecosystem {
            Ecosystem::Npm => format!("{}/{}", self.npm, urlencoding::encode(name)),
            Ecosystem::Pypi => {
                format!("{}/pypi/{}/json", self.pypi, urlencoding::encode(name))
            }
            Ecosystem::Gem => format!(
                "{}/api/v1/gems/{}.json",
                self.gem,
                urlencoding::encode(name)
            ),
            Ecosystem::Go => format!("{}/{}/@latest", self.go, escape_go_module(name)),
        }
    }
}

/// Public-registry existence endpoint for one (ecosystem, name) pair.
pub fn existence_url(ecosystem: Ecosystem, name: &str) -> String {
    RegistryEndpoints::default().url_for(ecosystem, name)
}

/// Go module proxy path escaping: every uppercase letter becomes `!` plus
/// its lowercase form.
pub fn escape_go_module(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Checker for verifying packages against their public registries.
pub struct RegistryChecker {
    client: Client,
    cache: RegistryCache,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
    retry: RetryPolicy,
    endpoints: RegistryEndpoints,
}

impl RegistryChecker {
    /// Create a new registry checker.
    pub fn new(http: &HttpConfig, rate_limit: u32, cache_ttl_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(&http.user_agent)
            .http1_only()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let quota =
            Quota::per_second(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::new(5).unwrap()));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            client,
            cache: RegistryCache::new(cache_ttl_secs),
            rate_limiter,
            retry: RetryPolicy::new(http.max_retries),
            endpoints: RegistryEndpoints::default(),
        })
    }

    /// Replace the registry base URLs.
    pub fn with_endpoints(mut self, endpoints: RegistryEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Check whether `key` exists in its registry. Infallible by contract:
    /// anything that cannot be settled is `Unknown`, never flagged or safe.
    pub async fn check(&self, key: &PackageKey) -> RegistryStatus {
        if let Some(cached) = self.cache.get(key) {
            trace!("cache hit for {}:{}", key.ecosystem, key.name);
            return cached;
        }

        self.rate_limiter.until_ready().await;

        // Only registry throttling is retried; a network error is already
        // an answer (Unknown) per the lookup contract.
        let status = match self
            .retry
            .run(
                || self.lookup(key),
                |e| matches!(e, ReconError::RateLimited(_)),
            )
            .await
        {
            Ok(status) => status,
            Err(e) => RegistryStatus::Unknown {
                reason: e.to_string(),
            },
        };

        self.cache.set(key, status.clone());
        status
    }

    async fn lookup(&self, key: &PackageKey) -> Result<RegistryStatus> {
        let url = self.endpoints.url_for(key.ecosystem, &key.name);
        trace!("checking {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                return Ok(RegistryStatus::Unknown {
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            let latest = latest_version(key.ecosystem, response).await;
            debug!("package exists: {}:{}", key.ecosystem, key.name);
            return Ok(RegistryStatus::Exists {
                latest_version: latest,
            });
        }
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::GONE && key.ecosystem == Ecosystem::Go)
        {
            debug!("package NOT FOUND: {}:{}", key.ecosystem, key.name);
            return Ok(RegistryStatus::NotFound);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ReconError::RateLimited(format!(
                "{} registry",
                key.ecosystem
            )));
        }

        Ok(RegistryStatus::Unknown {
            reason: format!("HTTP {}", status),
        })
    }
}

/// Best-effort latest version from a successful existence response. A body
/// that does not parse still means the package exists.
async fn latest_version(ecosystem: Ecosystem, response: Response) -> Option<String> {
    match ecosystem {
        Ecosystem::Npm => response
            .json::<NpmPackageInfo>()
            .await
            .ok()?
            .dist_tags?
            .latest,
        Ecosystem::Pypi => response.json::<PypiDocument>().await.ok()?.info?.version,
        Ecosystem::Gem => response.json::<GemDocument>().await.ok()?.version,
        Ecosystem::Go => response.json::<GoLatestDocument>().await.ok()?.version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existence_urls_per_ecosystem() {
        assert_eq!(
            existence_url(Ecosystem::Npm, "left-pad"),
            "https://registry.npmjs.org/left-pad"
        );
        assert_eq!(
            existence_url(Ecosystem::Npm, "@acme/ui-kit"),
            "https://registry.npmjs.org/%40acme%2Fui-kit"
        );
        assert_eq!(
            existence_url(Ecosystem::Pypi, "requests"),
            "https://pypi.org/pypi/requests/json"
        );
        assert_eq!(
            existence_url(Ecosystem::Gem, "nokogiri"),
            "https://rubygems.org/api/v1/gems/nokogiri.json"
        );
        assert_eq!(
            existence_url(Ecosystem::Go, "github.com/acme/widget"),
            "https://proxy.golang.org/github.com/acme/widget/@latest"
        );
    }

    #[test]
    fn test_go_module_escaping() {
        assert_eq!(
            escape_go_module("github.com/Azure/azure-sdk"),
            "github.com/!azure/azure-sdk"
        );
        assert_eq!(escape_go_module("golang.org/x/sync"), "golang.org/x/sync");
        assert_eq!(escape_go_module("ABC"), "!a!b!c");
    }

    /// Serve the given raw HTTP/1.1 responses, one per connection, then
    /// stop accepting.
    fn stub_registry(responses: Vec<String>) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let mut total = 0;
                while total < buf.len() {
                    match stream.read(&mut buf[total..]) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            total += n;
                            if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn checker_against(base: &str) -> RegistryChecker {
        RegistryChecker::new(&HttpConfig::default(), 100, 60)
            .unwrap()
            .with_endpoints(RegistryEndpoints {
                pypi: base.to_string(),
                ..Default::default()
            })
    }

    #[tokio::test]
    async fn test_missing_package_is_not_found() {
        let base = stub_registry(vec![http_response("404 Not Found", "")]);
        let checker = checker_against(&base);

        let status = checker
            .check(&PackageKey::new(Ecosystem::Pypi, "some-nonexistent-pkg"))
            .await;
        assert_eq!(status, RegistryStatus::NotFound);
    }

    #[tokio::test]
    async fn test_existing_package_reports_latest_version() {
        let base = stub_registry(vec![http_response(
            "200 OK",
            r#"{"info":{"version":"2.31.0"}}"#,
        )]);
        let checker = checker_against(&base);

        let status = checker
            .check(&PackageKey::new(Ecosystem::Pypi, "requests"))
            .await;
        assert_eq!(
            status,
            RegistryStatus::Exists {
                latest_version: Some("2.31.0".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_throttled_lookup_is_retried_then_settled() {
        let base = stub_registry(vec![
            http_response("429 Too Many Requests", ""),
            http_response("404 Not Found", ""),
        ]);
        let checker = checker_against(&base);

        let status = checker
            .check(&PackageKey::new(Ecosystem::Pypi, "ghost-pkg"))
            .await;
        assert_eq!(status, RegistryStatus::NotFound);
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_unknown() {
        // Bind then drop, so the port is known-refused.
        let refused = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let checker = checker_against(&refused);

        let status = checker
            .check(&PackageKey::new(Ecosystem::Pypi, "anything"))
            .await;
        assert!(matches!(status, RegistryStatus::Unknown { .. }));
    }

    #[test]
    fn test_registry_documents_deserialize() {
        let npm: NpmPackageInfo =
            serde_json::from_str(r#"{"name":"x","dist-tags":{"latest":"2.0.1"}}"#).unwrap();
        assert_eq!(npm.dist_tags.unwrap().latest.as_deref(), Some("2.0.1"));

        let pypi: PypiDocument =
            serde_json::from_str(r#"{"info":{"version":"1.4"}}"#).unwrap();
        assert_eq!(pypi.info.unwrap().version.as_deref(), Some("1.4"));

        let go: GoLatestDocument =
            serde_json::from_str(r#"{"Version":"v1.2.3","Time":"2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(go.version.as_deref(), Some("v1.2.3"));
    }
}
