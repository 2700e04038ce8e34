//! GitHub organization repository enumeration.
//!
//! Pages through `GET /orgs/{org}/repos`, keeping only non-archived
//! repositories. Rate-limit responses retry the current page via the shared
//! retry policy; they never restart the enumeration.

use crate::retry::RetryPolicy;
use crate::types::{HttpConfig, ReconError, RepoSource, Result, Shutdown};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

const GITHUB_API: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

/// Minimal slice of the repository listing payload.
#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    clone_url: String,
    #[serde(default)]
    archived: bool,
}

/// Read-only enumerator for an organization's repositories.
pub struct RepoEnumerator {
    client: Client,
    api_base: String,
    retry: RetryPolicy,
    shutdown: Shutdown,
}

impl RepoEnumerator {
    /// Create an enumerator, attaching the bearer token when one is given.
    /// Pagination stops at the next page boundary once `shutdown` triggers.
    pub fn new(http: &HttpConfig, token: Option<&str>, shutdown: Shutdown) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ReconError::Auth("token contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(&http.user_agent)
            .default_headers(headers)
            .http1_only()
            .build()?;

        Ok(Self {
            client,
            api_base: GITHUB_API.to_string(),
            retry: RetryPolicy::new(http.max_retries),
            shutdown,
        })
    }

    /// Point the enumerator at a different API host (GitHub Enterprise, or
    /// a local server in tests).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// List every non-archived repository of `org`, exhausting all pages.
    /// An interrupt stops pagination; repositories already listed are kept.
    pub async fn list_org_repos(&self, org: &str) -> Result<Vec<RepoSource>> {
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            if self.shutdown.is_triggered() {
                debug!(
                    "interrupt received, stopping enumeration for {} at page {}",
                    org, page
                );
                break;
            }

            let batch = self
                .retry
                .run(
                    || self.fetch_page(org, page),
                    |e| matches!(e, ReconError::RateLimited(_) | ReconError::Network(_)),
                )
                .await?;

            if batch.is_empty() {
                break;
            }
            repos.extend(select_sources(org, batch));
            page += 1;
        }

        debug!("enumerated {} non-archived repos for {}", repos.len(), org);
        Ok(repos)
    }

    /// Fetch one listing page, mapping API failures onto the error taxonomy.
    async fn fetch_page(&self, org: &str, page: u32) -> Result<Vec<ApiRepo>> {
        let url = format!(
            "{}/orgs/{}/repos?per_page={}&page={}",
            self.api_base,
            urlencoding::encode(org),
            PER_PAGE,
            page
        );
        trace!("fetching {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                ReconError::Network(e.to_string())
            } else {
                ReconError::HttpError(e)
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                Err(ReconError::Auth("invalid or expired GH_TOKEN".to_string()))
            }
            StatusCode::NOT_FOUND => Err(ReconError::OrgNotFound(org.to_string())),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if is_rate_limited(&response) =>
            {
                Err(ReconError::RateLimited("GitHub API".to_string()))
            }
            // A forbidden response without rate-limit headers is a scope or
            // permission problem; retrying it cannot succeed.
            StatusCode::FORBIDDEN => Err(ReconError::Auth(
                "access forbidden; token may lack organization read scope".to_string(),
            )),
            s if !s.is_success() => {
                Err(ReconError::Network(format!("GitHub API returned HTTP {}", s)))
            }
            _ => Ok(response.json::<Vec<ApiRepo>>().await?),
        }
    }
}

/// Keep only non-archived repositories from one listing page.
fn select_sources(org: &str, batch: Vec<ApiRepo>) -> Vec<RepoSource> {
    batch
        .into_iter()
        .filter_map(|repo| {
            if repo.archived {
                debug!("skipping archived repo {}/{}", org, repo.name);
                return None;
            }
            Some(RepoSource::Remote {
                org: org.to_string(),
                name: repo.name,
                clone_url: repo.clone_url,
            })
        })
        .collect()
}

fn is_rate_limited(response: &reqwest::Response) -> bool {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());
    remaining == Some("0") || response.headers().contains_key("retry-after")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_repo(name: &str, archived: bool) -> ApiRepo {
        ApiRepo {
            name: name.to_string(),
            clone_url: format!("https://github.com/acme/{}.git", name),
            archived,
        }
    }

    #[test]
    fn test_archived_repos_are_filtered() {
        let batch = vec![
            api_repo("alive", false),
            api_repo("dusty", true),
            api_repo("kicking", false),
        ];

        let sources = select_sources("acme", batch);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].display_name(), "acme/alive");
        assert_eq!(sources[1].display_name(), "acme/kicking");
    }

    #[test]
    fn test_all_archived_yields_empty_page() {
        let batch = vec![api_repo("old", true)];
        assert!(select_sources("acme", batch).is_empty());
    }

    #[test]
    fn test_listing_payload_deserializes() {
        let body = r#"[{"name":"web","clone_url":"https://github.com/acme/web.git","archived":false,"stargazers_count":7}]"#;
        let repos: Vec<ApiRepo> = serde_json::from_str(body).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "web");
        assert!(!repos[0].archived);
    }

    /// Serve the given raw HTTP/1.1 responses, one per connection, then
    /// stop accepting.
    fn stub_api(responses: Vec<String>) -> String {
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

    fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        )
    }

    fn enumerator(base: &str, shutdown: Shutdown) -> RepoEnumerator {
        RepoEnumerator::new(&HttpConfig::default(), None, shutdown)
            .unwrap()
            .with_api_base(base)
    }

    #[tokio::test]
    async fn test_triggered_shutdown_stops_pagination_before_any_request() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        // Discard port: any request would fail, proving none is made.
        let listing = enumerator("http://127.0.0.1:9", shutdown);
        let repos = listing.list_org_repos("acme").await.unwrap();
        assert!(repos.is_empty());
    }

    #[tokio::test]
    async fn test_plain_forbidden_is_auth_and_not_retried() {
        // One response only: a retry would hit connection-refused and
        // surface as a network error instead of Auth.
        let base = stub_api(vec![http_response("403 Forbidden", "", "")]);

        let listing = enumerator(&base, Shutdown::new());
        match listing.list_org_repos("acme").await {
            Err(ReconError::Auth(_)) => {}
            other => panic!("expected Auth, got {:?}", other.map(|r| r.len())),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_page_is_retried() {
        let base = stub_api(vec![
            http_response("403 Forbidden", "x-ratelimit-remaining: 0\r\n", ""),
            http_response("200 OK", "", "[]"),
        ]);

        let listing = enumerator(&base, Shutdown::new());
        let repos = listing.list_org_repos("acme").await.unwrap();
        assert!(repos.is_empty());
    }
}
