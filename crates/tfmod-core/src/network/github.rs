//! GitHub API calls used by the crawler.

use crate::config::NetworkConfig;
use crate::network::client::{check_response_status, HttpClient};
use crate::{Result, TfmodError};
use base64::Engine;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Repository entry from the organization listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub updated_at: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub size: i64,
}

/// Contents API payload for a single file.
#[derive(Debug, Clone, Default, Deserialize)]
struct ContentPayload {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// GitHub API client.
pub struct GitHubClient {
    http: Arc<HttpClient>,
    api_base: String,
}

impl GitHubClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self::with_api_base(http, NetworkConfig::GITHUB_API_BASE)
    }

    /// Point the client at another API root.
    pub fn with_api_base(http: Arc<HttpClient>, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// Every repository of an organization, following next links.
    pub async fn list_org_repos(&self, org: &str) -> Result<Vec<GitHubRepo>> {
        let mut url = Some(format!(
            "{}/orgs/{}/repos?per_page={}",
            self.api_base,
            org,
            NetworkConfig::REPOS_PER_PAGE
        ));
        let mut repos = Vec::new();

        while let Some(page_url) = url {
            let (body, next) = self.http.get_page(&page_url).await?;
            let page: Vec<GitHubRepo> = serde_json::from_slice(&body)?;
            debug!("Fetched {} repositories from {}", page.len(), page_url);
            repos.extend(page);
            url = next;
        }

        Ok(repos)
    }

    /// Readme text of a repository.
    pub async fn fetch_readme(&self, full_name: &str) -> Result<String> {
        let url = format!("{}/repos/{}/readme", self.api_base, full_name);
        let body = self.http.get(&url).await?;
        let payload: ContentPayload = serde_json::from_slice(&body)?;

        if let Some(download_url) = payload.download_url.filter(|u| !u.is_empty()) {
            let raw = self.http.get(&download_url).await?;
            return Ok(String::from_utf8_lossy(&raw).into_owned());
        }

        if let Some(content) = payload.content.filter(|c| !c.is_empty()) {
            let cleaned: String = content.chars().filter(|c| *c != '\n').collect();
            let decoded = base64::engine::general_purpose::STANDARD.decode(cleaned)?;
            return Ok(String::from_utf8_lossy(&decoded).into_owned());
        }

        Err(TfmodError::not_found("readme", full_name))
    }

    /// Gzipped tarball of a repository's default branch. Never cached.
    pub async fn download_archive(&self, full_name: &str) -> Result<Bytes> {
        let url = format!("{}/repos/{}/tarball", self.api_base, full_name);
        let response = self.http.get_uncached(&url).await?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::CONFLICT => {
                Err(TfmodError::Unavailable {
                    repository: full_name.to_string(),
                    status: response.status().as_u16(),
                })
            }
            _ => {
                check_response_status(&response, &url)?;
                Ok(response.bytes().await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GitHubClient {
        let http = Arc::new(HttpClient::new(None).unwrap());
        GitHubClient::with_api_base(http, server.uri())
    }

    #[tokio::test]
    async fn test_list_org_repos_follows_next_link() {
        let server = MockServer::start().await;
        let next = format!("{}/orgs/acme/repos-page-2", server.uri());

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("per_page", "100"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([
                        {"name": "terraform-azure-vnet", "full_name": "acme/terraform-azure-vnet",
                         "description": null, "updated_at": "2024-01-01T00:00:00Z",
                         "html_url": "https://github.com/acme/terraform-azure-vnet",
                         "private": false, "archived": false, "size": 10}
                    ]))
                    .insert_header("link", format!("<{}>; rel=\"next\"", next).as_str()),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos-page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "docs", "full_name": "acme/docs", "size": 1}
            ])))
            .mount(&server)
            .await;

        let repos = client_for(&server).list_org_repos("acme").await.unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "terraform-azure-vnet");
        assert_eq!(repos[0].description, "");
        assert_eq!(repos[1].name, "docs");
    }

    #[tokio::test]
    async fn test_readme_inline_base64() {
        let server = MockServer::start().await;
        // "# Redis\n" split across lines the way the contents API wraps it
        Mock::given(method("GET"))
            .and(path("/repos/acme/terraform-azure-redis/readme"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"content": "IyBSZW\nRpcwo=\n"})),
            )
            .mount(&server)
            .await;

        let readme = client_for(&server)
            .fetch_readme("acme/terraform-azure-redis")
            .await
            .unwrap();
        assert_eq!(readme, "# Redis\n");
    }

    #[tokio::test]
    async fn test_readme_download_url() {
        let server = MockServer::start().await;
        let raw = format!("{}/raw/README.md", server.uri());
        Mock::given(method("GET"))
            .and(path("/repos/acme/kv/readme"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"download_url": raw, "content": ""})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Key vault"))
            .mount(&server)
            .await;

        let readme = client_for(&server).fetch_readme("acme/kv").await.unwrap();
        assert_eq!(readme, "Key vault");
    }

    #[tokio::test]
    async fn test_archive_unavailable_statuses() {
        let server = MockServer::start().await;
        for (repo, status) in [("a", 403u16), ("b", 404), ("c", 409)] {
            Mock::given(method("GET"))
                .and(path(format!("/repos/acme/{}/tarball", repo)))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/repos/acme/d/tarball"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server);
        for repo in ["a", "b", "c"] {
            let err = client
                .download_archive(&format!("acme/{}", repo))
                .await
                .unwrap_err();
            assert!(err.is_unavailable(), "{} should be unavailable", repo);
        }
        let err = client.download_archive("acme/d").await.unwrap_err();
        assert!(matches!(
            err,
            TfmodError::GitHubApi {
                status_code: Some(502),
                ..
            }
        ));
    }
}
