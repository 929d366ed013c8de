//! Persistent repository for modules and everything derived from them.
//!
//! The sync controller writes through [`Store`] and the query engine reads
//! through it; [`SqliteStore`] is the bundled implementation.

pub mod fts;
pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::indexer::FileIndex;
use crate::models::{
    BlockKind, BlockRecord, DataSource, Module, ModuleFile, ModuleUpsert, Output, Relationship,
    Resource, StructureSummary, Variable, WeightedTerm,
};
use crate::Result;

/// Structural filter over the block index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFilter {
    pub kind: Option<BlockKind>,
    pub type_label: Option<String>,
    /// Match `type_label` as a prefix instead of exactly.
    pub label_prefix: bool,
    /// Attribute paths that must all be present.
    pub has: Vec<String>,
}

impl BlockFilter {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.type_label.is_none() && self.has.is_empty()
    }

    /// Check a block against every part of the filter.
    pub fn matches(&self, block: &BlockRecord) -> bool {
        if let Some(kind) = self.kind {
            if block.block_type != kind {
                return false;
            }
        }
        if let Some(label) = &self.type_label {
            let ok = if self.label_prefix {
                block.type_label.starts_with(label.as_str())
            } else {
                block.type_label == *label
            };
            if !ok {
                return false;
            }
        }
        self.has.iter().all(|p| block.has_path(p))
    }
}

/// Repository interface consumed by the sync controller and query engine.
pub trait Store: Send + Sync {
    /// Insert or fully replace a module's mutable fields; returns its id.
    fn upsert_module(&self, module: &ModuleUpsert) -> Result<i64>;
    fn get_module(&self, name: &str) -> Result<Option<Module>>;
    fn get_module_by_id(&self, id: i64) -> Result<Option<Module>>;
    /// All modules ordered by name.
    fn list_modules(&self) -> Result<Vec<Module>>;
    /// Full-text search over name, description and readme.
    fn search_modules(&self, query: &str, limit: usize) -> Result<Vec<Module>>;
    fn update_readme(&self, module_id: i64, readme: &str) -> Result<()>;
    fn set_has_examples(&self, module_id: i64, has_examples: bool) -> Result<()>;
    /// Delete every derived row of a module.
    fn clear_module_data(&self, module_id: i64) -> Result<()>;
    fn delete_module(&self, module_id: i64) -> Result<()>;
    /// Delete modules named `<parent>//...`.
    fn delete_child_modules(&self, parent_name: &str) -> Result<()>;

    fn insert_file(&self, file: &ModuleFile) -> Result<()>;
    /// Files of a module ordered by path.
    fn module_files(&self, module_id: i64) -> Result<Vec<ModuleFile>>;
    fn get_file(&self, module_id: i64, file_path: &str) -> Result<Option<ModuleFile>>;
    /// Full-text search over file name, path and content with a prepared
    /// FTS5 expression.
    fn search_files(&self, fts_expression: &str, limit: usize) -> Result<Vec<ModuleFile>>;

    /// Persist everything derived from one file.
    fn insert_file_index(&self, index: &FileIndex) -> Result<()>;
    fn module_variables(&self, module_id: i64) -> Result<Vec<Variable>>;
    fn module_outputs(&self, module_id: i64) -> Result<Vec<Output>>;
    fn module_resources(&self, module_id: i64) -> Result<Vec<Resource>>;
    fn module_data_sources(&self, module_id: i64) -> Result<Vec<DataSource>>;

    /// Blocks across all modules, ordered by module name, file, offset.
    fn query_blocks(&self, filter: &BlockFilter) -> Result<Vec<BlockRecord>>;
    fn module_blocks(&self, module_id: i64) -> Result<Vec<BlockRecord>>;
    fn block_exists(&self, module_id: i64, file_path: &str, filter: &BlockFilter) -> Result<bool>;

    /// Case-insensitive substring match on attribute path, reference name,
    /// block labels or block type; `limit` 0 is unlimited.
    fn query_relationships(&self, module_id: i64, needle: &str, limit: usize)
        -> Result<Vec<Relationship>>;
    /// Substring match on attribute path or reference name across modules.
    fn query_relationships_any(&self, needle: &str, limit: usize) -> Result<Vec<Relationship>>;

    fn replace_tags(&self, module_id: i64, tags: &[WeightedTerm]) -> Result<()>;
    fn module_tags(&self, module_id: i64) -> Result<Vec<WeightedTerm>>;
    fn replace_aliases(&self, module_id: i64, aliases: &[WeightedTerm]) -> Result<()>;
    fn module_aliases(&self, module_id: i64) -> Result<Vec<WeightedTerm>>;
    /// Best module for an exact alias.
    fn resolve_alias(&self, alias: &str) -> Result<Option<Module>>;
    /// Best module for an alias prefix.
    fn resolve_alias_prefix(&self, prefix: &str) -> Result<Option<Module>>;

    /// Counts over a module's block index.
    fn summarize_structure(&self, module_id: i64) -> Result<StructureSummary> {
        Ok(summarize_blocks(&self.module_blocks(module_id)?))
    }
}

/// Structural summary of a set of blocks.
pub fn summarize_blocks(blocks: &[BlockRecord]) -> StructureSummary {
    use crate::config::QueryConfig;
    use std::collections::{BTreeSet, HashMap};

    let mut summary = StructureSummary::default();
    let mut type_counts: HashMap<&str, usize> = HashMap::new();
    let mut dynamic_labels = BTreeSet::new();

    for block in blocks {
        match block.block_type {
            BlockKind::Resource => {
                summary.resource_blocks += 1;
                if block.has_path("lifecycle.ignore_changes") {
                    summary.resources_with_ignore_changes += 1;
                }
                if !block.type_label.is_empty() {
                    *type_counts.entry(block.type_label.as_str()).or_default() += 1;
                }
            }
            BlockKind::Lifecycle => summary.lifecycle_blocks += 1,
            BlockKind::Dynamic => {
                if !block.type_label.is_empty() {
                    dynamic_labels.insert(block.type_label.clone());
                }
            }
        }
    }

    let mut types: Vec<(String, usize)> = type_counts
        .into_iter()
        .map(|(t, c)| (t.to_string(), c))
        .collect();
    types.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    types.truncate(QueryConfig::SUMMARY_TOP_TYPES);

    summary.top_resource_types = types;
    summary.dynamic_labels = dynamic_labels.into_iter().collect();
    summary
}
