//! HTTP client for the upstream source host.
//!
//! Wraps reqwest with:
//! - The shared token bucket (one token per network request)
//! - The response cache (hits cost nothing)
//! - Fixed client identification and media type headers
//! - Optional bearer authentication

use crate::config::NetworkConfig;
use crate::network::cache::{CachedBody, ResponseCache};
use crate::network::rate_limit::TokenBucket;
use crate::{Result, TfmodError};
use bytes::Bytes;
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Rate-limited, caching HTTP client.
pub struct HttpClient {
    client: Client,
    token: Option<String>,
    bucket: TokenBucket,
    cache: ResponseCache,
}

impl HttpClient {
    /// Create a client; a token raises the request budget.
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_timeout(token, NetworkConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(token: Option<String>, timeout: Duration) -> Result<Self> {
        let token = token.filter(|t| !t.trim().is_empty());
        let bucket = TokenBucket::for_github(token.is_some());
        Self::with_parts(token, timeout, bucket, ResponseCache::default())
    }

    /// Create a client from explicit parts.
    pub fn with_parts(
        token: Option<String>,
        timeout: Duration,
        bucket: TokenBucket,
        cache: ResponseCache,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(NetworkConfig::GITHUB_MEDIA_TYPE),
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| TfmodError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            token,
            bucket,
            cache,
        })
    }

    pub fn rate_limit_capacity(&self) -> u32 {
        self.bucket.capacity()
    }

    pub fn rate_limit_remaining(&self) -> u32 {
        self.bucket.remaining()
    }

    /// Forget every cached response.
    pub fn clear_cache(&self) {
        debug!("Clearing response cache");
        self.cache.clear();
    }

    /// GET a body, served from cache when fresh.
    pub async fn get(&self, url: &str) -> Result<Bytes> {
        if let Some(body) = self.cache.get_plain(url) {
            debug!("Cache hit for {}", url);
            return Ok(body);
        }

        let response = self.send(url).await?;
        check_response_status(&response, url)?;
        let body = response.bytes().await?;

        self.cache.insert(url, CachedBody::Plain(body.clone()));
        Ok(body)
    }

    /// GET one page of a paginated listing with the next-page link.
    pub async fn get_page(&self, url: &str) -> Result<(Bytes, Option<String>)> {
        if let Some(page) = self.cache.get_page(url) {
            debug!("Cache hit for page {}", url);
            return Ok(page);
        }

        let response = self.send(url).await?;
        check_response_status(&response, url)?;
        let next = response
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let body = response.bytes().await?;

        self.cache.insert(
            url,
            CachedBody::Page {
                body: body.clone(),
                next: next.clone(),
            },
        );
        Ok((body, next))
    }

    /// GET without the cache; the caller inspects the status.
    pub async fn get_uncached(&self, url: &str) -> Result<Response> {
        self.send(url).await
    }

    async fn send(&self, url: &str) -> Result<Response> {
        self.bucket.acquire()?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                TfmodError::Timeout(format!("GET {} timed out", url))
            } else {
                TfmodError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    source: Some(e),
                }
            }
        })
    }
}

/// Anything other than 200 is an API error.
pub fn check_response_status(response: &Response, url: &str) -> Result<()> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(());
    }
    Err(TfmodError::GitHubApi {
        message: format!("GET {} returned {}", url, status.as_u16()),
        status_code: Some(status.as_u16()),
    })
}

/// Extract the URL tagged `rel="next"` from a `Link` header.
pub fn parse_next_link(header_value: &str) -> Option<String> {
    for part in header_value.split(',') {
        let mut sections = part.trim().split(';');
        let Some(url_part) = sections.next() else {
            continue;
        };
        let url = url_part.trim().trim_start_matches('<').trim_end_matches('>');

        let is_next = sections.any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"') == "next")
                .unwrap_or(false)
        });
        if is_next && !url.is_empty() {
            return Some(url.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://api.github.com/organizations/1/repos?page=2>; rel="next", <https://api.github.com/organizations/1/repos?page=5>; rel="last""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://api.github.com/organizations/1/repos?page=2")
        );
    }

    #[test]
    fn test_parse_next_link_last_page() {
        let header = r#"<https://x/repos?page=1>; rel="prev", <https://x/repos?page=1>; rel="first""#;
        assert_eq!(parse_next_link(header), None);
        assert_eq!(parse_next_link(""), None);
        assert_eq!(parse_next_link("garbage"), None);
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let client = HttpClient::new(Some("  ".into())).unwrap();
        assert_eq!(client.rate_limit_capacity(), 60);

        let client = HttpClient::new(Some("ghp_x".into())).unwrap();
        assert_eq!(client.rate_limit_capacity(), 5000);
    }

    #[tokio::test]
    async fn test_cache_hit_costs_no_token() {
        use wiremock::matchers::{header as header_eq, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .and(header_eq("accept", NetworkConfig::GITHUB_MEDIA_TYPE))
            .and(header_eq("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Some("secret".into())).unwrap();
        let url = format!("{}/thing", server.uri());
        assert_eq!(client.get(&url).await.unwrap(), Bytes::from("hello"));
        assert_eq!(client.get(&url).await.unwrap(), Bytes::from("hello"));
        assert_eq!(client.rate_limit_remaining(), 4999);
    }

    #[tokio::test]
    async fn test_non_200_is_api_error() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpClient::new(None).unwrap();
        let err = client
            .get(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TfmodError::GitHubApi {
                status_code: Some(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_bucket_short_circuits() {
        let bucket = TokenBucket::new("github", 0, Duration::from_secs(3600));
        let client = HttpClient::with_parts(
            None,
            Duration::from_secs(1),
            bucket,
            ResponseCache::default(),
        )
        .unwrap();
        let err = client.get("http://127.0.0.1:9/never").await.unwrap_err();
        assert!(matches!(err, TfmodError::RateLimited { .. }));
    }
}
