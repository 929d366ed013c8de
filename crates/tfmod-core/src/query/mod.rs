//! Read-only queries over the indexed modules.
//!
//! Each submodule adds an `impl QueryEngine` block for one family of
//! operations. Nothing here writes to the store.

mod catalog;
mod patterns;
mod prompt;
mod relationships;
mod resolve;

pub use catalog::{expand_query_variants, extract_variable_block, CodeSearch};
pub use patterns::{block_end, paginate, text_match_ranges, PatternQuery, PatternShape, StructuralPattern};
pub use prompt::{extract_limit, PromptInterpretation};
pub use relationships::RelationshipRequest;

use crate::store::Store;
use std::fmt;
use std::sync::Arc;

/// Query engine over a shared store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn Store>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::alias::{derive_aliases, derive_tags};
    use crate::indexer::index_file;
    use crate::models::{ModuleFile, ModuleUpsert};
    use crate::store::SqliteStore;
    use tempfile::TempDir;

    pub(crate) fn create_test_engine() -> (QueryEngine, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(temp_dir.path().join("query.db")).unwrap();
        (QueryEngine::new(Arc::new(store)), temp_dir)
    }

    /// Store a module with its files, index and derived terms.
    pub(crate) fn seed_module(engine: &QueryEngine, name: &str, files: &[(&str, &str)]) -> i64 {
        let store = engine.store();
        let id = store
            .upsert_module(&ModuleUpsert {
                name: name.to_string(),
                full_name: format!("acme/{}", name),
                description: format!("Terraform module {}", name),
                repo_url: format!("https://github.com/acme/{}", name),
                last_updated: "2024-01-01T00:00:00Z".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mut resource_types = Vec::new();
        for (path, content) in files {
            let file = ModuleFile::new(id, path, content.to_string());
            store.insert_file(&file).unwrap();
            if let Ok(index) = index_file(id, &file) {
                resource_types.extend(index.resources.iter().map(|r| r.resource_type.clone()));
                store.insert_file_index(&index).unwrap();
            }
        }

        let tags = derive_tags(name, resource_types.iter().map(String::as_str));
        store.replace_tags(id, &tags).unwrap();
        store.replace_aliases(id, &derive_aliases(name, &tags)).unwrap();
        id
    }
}
