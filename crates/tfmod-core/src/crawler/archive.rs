//! Streaming tarball ingestion.
//!
//! Archives are gzip-compressed tar streams whose entries all live under one
//! synthetic top-level directory. Entries are read one at a time and routed
//! either to the root module or to a `modules/<key>/` submodule.

use crate::config::SyncConfig;
use crate::models::{ModuleFile, ModuleUpsert};
use crate::network::GitHubRepo;
use crate::store::Store;
use crate::{Result, TfmodError};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// One regular file read from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    /// Path relative to the repository root.
    pub path: String,
    pub content: String,
}

/// What ingesting one archive produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub has_examples: bool,
    /// Submodule ids in discovery order.
    pub submodule_ids: Vec<i64>,
    pub files_written: usize,
}

fn archive_error(message: impl Into<String>, source: std::io::Error) -> TfmodError {
    TfmodError::Archive {
        message: message.into(),
        source: Some(source),
    }
}

/// Drop the synthetic top-level directory; `None` for entries without one.
pub fn normalize_archive_path(name: &str) -> Option<&str> {
    let (_, rest) = name.split_once('/')?;
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// True when any segment of the path is an ignored directory name.
pub fn should_skip_path(path: &str) -> bool {
    path.split('/')
        .any(|segment| SyncConfig::IGNORED_PATH_SEGMENTS.contains(&segment))
}

/// Submodule key for a `modules/<key>/...` path.
pub fn submodule_key(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(SyncConfig::SUBMODULE_DIR)?.strip_prefix('/')?;
    let (key, _) = rest.split_once('/')?;
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

pub fn is_example_path(path: &str) -> bool {
    path.strip_prefix(SyncConfig::EXAMPLES_DIR)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Visit every kept regular file of a gzipped tarball in archive order.
pub fn for_each_file(
    data: &[u8],
    mut visit: impl FnMut(ArchiveFile) -> Result<()>,
) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(data));
    let entries = archive
        .entries()
        .map_err(|e| archive_error("Failed to open archive", e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error("Failed to read archive", e))?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }

        let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some(path) = normalize_archive_path(&raw_path) else {
            continue;
        };
        if should_skip_path(path) {
            continue;
        }
        let path = path.to_string();

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| archive_error(format!("Failed to read file {}", path), e))?;

        visit(ArchiveFile {
            path,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })?;
    }

    Ok(())
}

/// Read every kept file of an archive into memory.
pub fn read_archive(data: &[u8]) -> Result<Vec<ArchiveFile>> {
    let mut files = Vec::new();
    for_each_file(data, |file| {
        files.push(file);
        Ok(())
    })?;
    Ok(files)
}

/// Name of the synthetic submodule for `key` under `repo`.
pub fn submodule_name(repo_name: &str, key: &str) -> String {
    format!("{}//{}/{}", repo_name, SyncConfig::SUBMODULE_DIR, key)
}

fn ensure_submodule(store: &dyn Store, repo: &GitHubRepo, key: &str) -> Result<i64> {
    let id = store.upsert_module(&ModuleUpsert {
        name: submodule_name(&repo.name, key),
        full_name: repo.full_name.clone(),
        description: format!("Submodule {} of {}", key, repo.name),
        repo_url: repo.html_url.clone(),
        last_updated: repo.updated_at.clone(),
        ..Default::default()
    })?;
    if let Err(e) = store.clear_module_data(id) {
        warn!("Failed to clear old data for submodule {} of {}: {}", key, repo.name, e);
    }
    Ok(id)
}

/// Write the files of an archive through the store.
///
/// A submodule record is created the first time one of its files is seen and
/// reused for the rest of the archive. File write failures are logged and
/// skipped; archive read failures abort.
pub fn ingest_archive(
    store: &dyn Store,
    module_id: i64,
    repo: &GitHubRepo,
    data: &[u8],
) -> Result<IngestOutcome> {
    let mut outcome = IngestOutcome::default();
    let mut submodules: HashMap<String, i64> = HashMap::new();

    for_each_file(data, |file| {
        let target = match submodule_key(&file.path) {
            Some(key) => match submodules.get(key) {
                Some(id) => *id,
                None => match ensure_submodule(store, repo, key) {
                    Ok(id) => {
                        submodules.insert(key.to_string(), id);
                        outcome.submodule_ids.push(id);
                        id
                    }
                    Err(e) => {
                        warn!("Failed to create submodule {} for {}: {}", key, repo.name, e);
                        module_id
                    }
                },
            },
            None => module_id,
        };

        if is_example_path(&file.path) {
            outcome.has_examples = true;
        }

        let record = ModuleFile::new(target, &file.path, file.content);
        match store.insert_file(&record) {
            Ok(()) => outcome.files_written += 1,
            Err(e) => warn!("Failed to insert file {}: {}", record.file_path, e),
        }
        Ok(())
    })?;

    debug!(
        "Ingested {} files for {} ({} submodules)",
        outcome.files_written,
        repo.name,
        outcome.submodule_ids.len()
    );
    Ok(outcome)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    /// Gzipped tarball with every entry under `acme-repo-abc123/`.
    pub(crate) fn build_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut dir = tar::Header::new_gnu();
        dir.set_entry_type(EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_cksum();
        builder
            .append_data(&mut dir, "acme-repo-abc123/", std::io::empty())
            .unwrap();

        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(EntryType::Regular);
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(
                    &mut header,
                    format!("acme-repo-abc123/{}", path),
                    content.as_bytes(),
                )
                .unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    fn repo() -> GitHubRepo {
        GitHubRepo {
            name: "terraform-azure-vnet".into(),
            full_name: "acme/terraform-azure-vnet".into(),
            description: "Virtual network".into(),
            updated_at: "2024-03-01T00:00:00Z".into(),
            html_url: "https://github.com/acme/terraform-azure-vnet".into(),
            size: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_archive_path() {
        assert_eq!(normalize_archive_path("repo-sha/main.tf"), Some("main.tf"));
        assert_eq!(
            normalize_archive_path("repo-sha/modules/a/main.tf"),
            Some("modules/a/main.tf")
        );
        assert_eq!(normalize_archive_path("repo-sha"), None);
        assert_eq!(normalize_archive_path("repo-sha/"), None);
    }

    #[test]
    fn test_should_skip_path() {
        assert!(should_skip_path(".github/workflows/ci.yml"));
        assert!(should_skip_path("examples/x/.terraform/lock"));
        assert!(should_skip_path("a/node_modules/b.js"));
        assert!(!should_skip_path("github/main.tf"));
        assert!(!should_skip_path("modules/a/main.tf"));
    }

    #[test]
    fn test_submodule_key_and_examples() {
        assert_eq!(submodule_key("modules/subnet/main.tf"), Some("subnet"));
        assert_eq!(submodule_key("modules/subnet"), None);
        assert_eq!(submodule_key("modulesx/a/b.tf"), None);
        assert!(is_example_path("examples/default/main.tf"));
        assert!(!is_example_path("examples.md"));
    }

    #[test]
    fn test_read_archive_filters_entries() {
        let data = build_archive(&[
            ("main.tf", "resource \"a_b\" \"c\" {}\n"),
            (".github/workflows/ci.yml", "on: push\n"),
            ("README.md", "# hi\n"),
        ]);
        let files = read_archive(&data).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["main.tf", "README.md"]);
    }

    #[test]
    fn test_corrupt_archive_is_error() {
        let err = read_archive(b"not a tarball").unwrap_err();
        assert!(matches!(err, TfmodError::Archive { .. }));
    }

    #[test]
    fn test_ingest_routes_submodules() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(temp_dir.path().join("test.db")).unwrap();
        let repo = repo();
        let root = store
            .upsert_module(&ModuleUpsert {
                name: repo.name.clone(),
                ..Default::default()
            })
            .unwrap();

        let data = build_archive(&[
            ("main.tf", "# root\n"),
            ("modules/subnet/main.tf", "# subnet\n"),
            ("modules/subnet/variables.tf", "# vars\n"),
            ("modules/nsg/main.tf", "# nsg\n"),
            ("examples/default/main.tf", "# example\n"),
        ]);
        let outcome = ingest_archive(&store, root, &repo, &data).unwrap();

        assert!(outcome.has_examples);
        assert_eq!(outcome.files_written, 5);
        assert_eq!(outcome.submodule_ids.len(), 2);

        let subnet = store
            .get_module("terraform-azure-vnet//modules/subnet")
            .unwrap()
            .unwrap();
        assert_eq!(subnet.id, outcome.submodule_ids[0]);
        assert_eq!(subnet.description, "Submodule subnet of terraform-azure-vnet");
        assert_eq!(subnet.full_name, repo.full_name);
        assert_eq!(subnet.last_updated, repo.updated_at);

        let sub_files = store.module_files(subnet.id).unwrap();
        let paths: Vec<_> = sub_files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["modules/subnet/main.tf", "modules/subnet/variables.tf"]);

        let root_files = store.module_files(root).unwrap();
        let paths: Vec<_> = root_files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["examples/default/main.tf", "main.tf"]);
    }
}
