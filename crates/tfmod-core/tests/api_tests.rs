//! Integration tests for the TfmodApi public interface.
//!
//! A wiremock server stands in for the GitHub API so sync passes run end to
//! end against a real SQLite index.

use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::time::Duration;
use tempfile::TempDir;
use tfmod_core::{
    CodeSearch, JobStatus, PatternQuery, RelationshipRequest, TfmodApi, TfmodError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VNET_MAIN: &str = r#"resource "azurerm_virtual_network" "vnet" {
  name                = var.name
  address_space       = var.address_space
  resource_group_name = var.resource_group

  lifecycle {
    ignore_changes = [tags]
  }
}
"#;

const VNET_VARIABLES: &str = r#"variable "name" {
  type = string
}

variable "address_space" {
  description = "Address ranges of the network"
  type        = list(string)
  default     = ["10.0.0.0/16"]
}

variable "resource_group" {
  type = string
}
"#;

const VNET_OUTPUTS: &str = r#"output "vnet_id" {
  value = azurerm_virtual_network.vnet.id
}
"#;

const SUBNET_MAIN: &str = r#"resource "azurerm_subnet" "this" {
  name                 = var.name
  virtual_network_name = var.vnet_name
}
"#;

const EXAMPLE_MAIN: &str = r#"module "network" {
  source = "../../"
  name   = "demo"
}
"#;

/// Gzipped tarball with every entry under one synthetic top directory.
fn build_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                format!("acme-repo-0123abc/{}", path),
                content.as_bytes(),
            )
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn repo_json(name: &str, updated_at: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "full_name": format!("acme/{}", name),
        "description": format!("Terraform module for {}", name),
        "updated_at": updated_at,
        "html_url": format!("https://github.com/acme/{}", name),
        "private": false,
        "archived": false,
        "size": 42
    })
}

async fn mount_github(server: &MockServer) {
    let repos = serde_json::json!([
        repo_json("terraform-azure-vnet", "2024-05-01T10:00:00Z"),
        repo_json("terraform-azure-kv", "2024-05-02T10:00:00Z"),
        repo_json("docs", "2024-05-03T10:00:00Z"),
        {
            "name": "terraform-azure-old",
            "full_name": "acme/terraform-azure-old",
            "archived": true,
            "size": 10
        }
    ]);
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos))
        .mount(server)
        .await;

    let readme = base64::engine::general_purpose::STANDARD.encode("# Virtual network\n");
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-azure-vnet/readme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": readme
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-azure-vnet/tarball"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(build_archive(&[
            ("main.tf", VNET_MAIN),
            ("variables.tf", VNET_VARIABLES),
            ("outputs.tf", VNET_OUTPUTS),
            ("modules/subnet/main.tf", SUBNET_MAIN),
            ("examples/default/main.tf", EXAMPLE_MAIN),
            (".github/workflows/ci.yml", "on: push\n"),
        ])))
        .mount(server)
        .await;

    // no readme and a blocked archive
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-azure-kv/readme"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/terraform-azure-kv/tarball"))
        .respond_with(ResponseTemplate::new(403))
        .mount(server)
        .await;
}

fn api_for(server: &MockServer, temp_dir: &TempDir) -> TfmodApi {
    TfmodApi::builder(temp_dir.path().join("index.db"))
        .org("acme")
        .api_base(server.uri())
        .worker_count(2)
        .build()
        .unwrap()
}

async fn synced_api() -> (TfmodApi, MockServer, TempDir) {
    let server = MockServer::start().await;
    mount_github(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let api = api_for(&server, &temp_dir);
    let progress = api.sync_now().await.unwrap();
    assert!(progress.errors.is_empty(), "{:?}", progress.errors);
    (api, server, temp_dir)
}

async fn wait_for_job(api: &TfmodApi, job_id: &str) -> tfmod_core::SyncJob {
    for _ in 0..200 {
        let job = api.get_sync_job(job_id).unwrap();
        if job.status != JobStatus::Running {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not finish", job_id);
}

#[tokio::test]
async fn test_fresh_index_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let api = TfmodApi::open(temp_dir.path().join("index.db")).unwrap();

    assert_eq!(api.org(), "cloudnationhq");
    assert!(api.list_modules().await.unwrap().is_empty());
    assert!(api.list_sync_jobs().is_empty());

    let err = api.get_module_info("vnet").await.unwrap_err();
    assert!(err.is_not_found());
    let err = api.search_modules("  ", 5).await.unwrap_err();
    assert!(matches!(err, TfmodError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_full_sync_indexes_candidates() {
    let (api, _server, _temp) = synced_api().await;

    let names: Vec<String> = api
        .list_modules()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    // kv is dropped for its blocked archive; docs and old are not candidates
    assert_eq!(
        names,
        vec!["terraform-azure-vnet", "terraform-azure-vnet//modules/subnet"]
    );

    let info = api.get_module_info("vnet").await.unwrap();
    assert_eq!(info.module.name, "terraform-azure-vnet");
    assert!(info.module.has_examples);
    assert!(info.module.readme_content.contains("Virtual network"));
    assert_eq!(info.module.last_updated, "2024-05-01T10:00:00Z");
    let variables: Vec<&str> = info.variables.iter().map(|v| v.name.as_str()).collect();
    assert!(variables.contains(&"address_space"));
    assert_eq!(info.outputs.len(), 1);
    assert!(info
        .resources
        .iter()
        .any(|r| r.resource_type == "azurerm_virtual_network"));
    assert_eq!(info.structure.resources_with_ignore_changes, 1);
    assert!(info.files.iter().all(|f| !f.file_path.starts_with(".github")));
    assert!(info.files.iter().all(|f| !f.file_path.starts_with("modules/")));

    let sub = api.get_module_info("terraform-azure-vnet//modules/subnet").await.unwrap();
    assert_eq!(sub.files.len(), 1);
    assert_eq!(sub.files[0].file_path, "modules/subnet/main.tf");
}

#[tokio::test]
async fn test_queries_after_sync() {
    let (api, _server, _temp) = synced_api().await;

    let module = api.resolve_module("VNET").await.unwrap();
    assert_eq!(module.name, "terraform-azure-vnet");

    let definition = api
        .extract_variable_definition("vnet", "address_space")
        .await
        .unwrap();
    assert!(definition.definition.starts_with("variable \"address_space\""));
    assert!(definition.definition.contains("10.0.0.0/16"));

    let file = api.get_file_content("vnet", "outputs.tf").await.unwrap();
    assert_eq!(file.file.content, VNET_OUTPUTS);

    let examples = api.list_module_examples("vnet").await.unwrap();
    assert_eq!(examples.examples.len(), 1);
    assert_eq!(examples.examples[0].name, "default");
    let example = api.get_example_content("vnet", "default").await.unwrap();
    assert_eq!(example.files[0].file_path, "examples/default/main.tf");

    let hits = api
        .search_code(CodeSearch::new("virtual_network_name"))
        .await
        .unwrap();
    assert!(hits
        .iter()
        .any(|h| h.module_name == "terraform-azure-vnet//modules/subnet"));

    let page = api
        .compare_pattern(PatternQuery {
            pattern: "resource \"azurerm_subnet\"".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.matches[0].module_name, "terraform-azure-vnet//modules/subnet");

    let report = api
        .analyze_relationships(RelationshipRequest {
            module_name: Some("vnet".into()),
            query: Some("address_space".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(report.module.as_deref(), Some("terraform-azure-vnet"));
    let rel = report.groups[0]
        .relationships
        .iter()
        .find(|r| r.reference_name == "var.address_space")
        .unwrap();
    assert_eq!(rel.reference_type, "variable");
    assert_eq!(rel.attribute_path, "address_space");
    assert_eq!(rel.file_path, "main.tf");
}

#[tokio::test]
async fn test_incremental_sync_skips_unchanged() {
    let (api, _server, _temp) = synced_api().await;

    let progress = api.sync_updates_now().await.unwrap();
    assert_eq!(progress.total_repos, 2);
    assert_eq!(progress.processed_repos, 2);
    // vnet is unchanged; kv is retried because it was never stored
    assert_eq!(progress.skipped_repos, 1);
    assert!(progress.updated_repos.is_empty());
    assert!(progress.errors.is_empty());
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let (api, _server, _temp) = synced_api().await;
    let before = api.get_module_info("vnet").await.unwrap();

    api.sync_now().await.unwrap();
    let after = api.get_module_info("vnet").await.unwrap();

    assert_eq!(before.files.len(), after.files.len());
    assert_eq!(before.variables.len(), after.variables.len());
    assert_eq!(before.resources.len(), after.resources.len());
    assert_eq!(api.list_modules().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_detached_sync_job_completes() {
    let server = MockServer::start().await;
    mount_github(&server).await;
    let temp_dir = TempDir::new().unwrap();
    let api = api_for(&server, &temp_dir);

    let job_id = api.sync_modules();
    assert!(job_id.starts_with("full_sync-"));

    let job = wait_for_job(&api, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());
    assert_eq!(job.progress.total_repos, 2);
    assert_eq!(job.progress.processed_repos, 2);
    assert!(job.error.is_none());

    assert_eq!(api.list_sync_jobs().len(), 1);
    assert!(api.get_sync_job("full_sync-0").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_detached_sync_job_fails_on_listing_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().unwrap();
    let api = api_for(&server, &temp_dir);

    let job_id = api.sync_updates_modules();
    assert!(job_id.starts_with("incremental_sync-"));

    let job = wait_for_job(&api, &job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("500"));
}
