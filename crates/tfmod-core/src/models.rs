//! Records persisted by the store and returned by the query engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An indexed module repository, or a synthetic submodule of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    /// Unique name; submodules use `<parent>//modules/<key>`.
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub repo_url: String,
    /// Upstream last-modified marker, compared verbatim on incremental passes.
    pub last_updated: String,
    pub synced_at: String,
    pub readme_content: String,
    pub has_examples: bool,
}

impl Module {
    pub fn is_submodule(&self) -> bool {
        is_submodule_name(&self.name)
    }
}

pub fn is_submodule_name(name: &str) -> bool {
    name.contains("//")
}

/// Mutable metadata written by a module upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleUpsert {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub repo_url: String,
    pub last_updated: String,
    pub readme_content: String,
    pub has_examples: bool,
}

/// Classified file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Terraform,
    Markdown,
    Yaml,
    Json,
    Other,
}

impl FileType {
    /// Classify a path by extension.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".tf") {
            FileType::Terraform
        } else if lower.ends_with(".md") {
            FileType::Markdown
        } else if lower.ends_with(".yml") || lower.ends_with(".yaml") {
            FileType::Yaml
        } else if lower.ends_with(".json") {
            FileType::Json
        } else {
            FileType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Terraform => "terraform",
            FileType::Markdown => "markdown",
            FileType::Yaml => "yaml",
            FileType::Json => "json",
            FileType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "terraform" => FileType::Terraform,
            "markdown" => FileType::Markdown,
            "yaml" => FileType::Yaml,
            "json" => FileType::Json,
            _ => FileType::Other,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file stored for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFile {
    pub id: i64,
    pub module_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
    pub content: String,
    pub size_bytes: i64,
}

impl ModuleFile {
    /// Build an unsaved file record from a path relative to the module root.
    pub fn new(module_id: i64, file_path: &str, content: String) -> Self {
        let file_name = file_path
            .rsplit('/')
            .next()
            .unwrap_or(file_path)
            .to_string();
        Self {
            id: 0,
            module_id,
            file_name,
            file_path: file_path.to_string(),
            file_type: FileType::from_path(file_path),
            size_bytes: content.len() as i64,
            content,
        }
    }
}

/// File listing entry without content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_name: String,
    pub file_path: String,
    pub file_type: FileType,
    pub size_bytes: i64,
}

impl From<&ModuleFile> for FileEntry {
    fn from(file: &ModuleFile) -> Self {
        Self {
            file_name: file.file_name.clone(),
            file_path: file.file_path.clone(),
            file_type: file.file_type,
            size_bytes: file.size_bytes,
        }
    }
}

/// A file search hit with its owning module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHit {
    pub module_name: String,
    pub file: ModuleFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: i64,
    pub module_id: i64,
    pub name: String,
    /// Raw source text of the `type` expression.
    pub var_type: String,
    pub description: String,
    /// Raw source text of the `default` expression.
    pub default_value: String,
    pub required: bool,
    pub sensitive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub id: i64,
    pub module_id: i64,
    pub name: String,
    pub description: String,
    pub sensitive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub module_id: i64,
    pub resource_type: String,
    pub resource_name: String,
    pub provider: String,
    pub source_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: i64,
    pub module_id: i64,
    pub data_type: String,
    pub data_name: String,
    pub provider: String,
    pub source_file: String,
}

/// Indexed block kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Resource,
    Dynamic,
    Lifecycle,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Resource => "resource",
            BlockKind::Dynamic => "dynamic",
            BlockKind::Lifecycle => "lifecycle",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "resource" => Some(BlockKind::Resource),
            "dynamic" => Some(BlockKind::Dynamic),
            "lifecycle" => Some(BlockKind::Lifecycle),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte-range index entry for a structural block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: i64,
    pub module_id: i64,
    pub file_path: String,
    pub block_type: BlockKind,
    /// Resource type or dynamic label; empty for lifecycle.
    pub type_label: String,
    pub start_byte: usize,
    pub end_byte: usize,
    /// Newline-joined attribute and nested-block paths under the block.
    pub attr_paths: String,
}

impl BlockRecord {
    pub fn has_path(&self, path: &str) -> bool {
        self.attr_paths.lines().any(|p| p == path)
    }
}

/// A classified reference found inside an attribute expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub module_id: i64,
    pub file_path: String,
    pub block_type: String,
    pub block_labels: String,
    pub attribute_path: String,
    pub reference_type: String,
    pub reference_name: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// A weighted short name or topic tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub value: String,
    pub weight: i64,
    pub source: String,
}

impl WeightedTerm {
    pub fn new(value: impl Into<String>, weight: i64, source: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weight,
            source: source.into(),
        }
    }
}

/// Module-level counts over the block index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSummary {
    pub resource_blocks: usize,
    pub lifecycle_blocks: usize,
    pub resources_with_ignore_changes: usize,
    /// Most frequent resource types with their block counts.
    pub top_resource_types: Vec<(String, usize)>,
    pub dynamic_labels: Vec<String>,
}

/// Full module detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module: Module,
    pub variables: Vec<Variable>,
    pub outputs: Vec<Output>,
    pub resources: Vec<Resource>,
    pub data_sources: Vec<DataSource>,
    pub files: Vec<FileEntry>,
    pub structure: StructureSummary,
}

/// One example directory of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSummary {
    pub name: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleExamples {
    pub module_name: String,
    pub examples: Vec<ExampleSummary>,
}

/// Files of one example, `main.tf` first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleContent {
    pub module_name: String,
    pub example_name: String,
    pub files: Vec<ModuleFile>,
}

/// Source text of a single `variable` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub module_name: String,
    pub variable_name: String,
    pub definition: String,
}

/// A structural or text match from the pattern matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub module_name: String,
    /// Module name, suffixed `#n` when one file yields several fallback matches.
    pub display_name: String,
    pub file_path: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub snippet: String,
}

/// A page of pattern matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternPage {
    pub pattern: String,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub matches: Vec<PatternMatch>,
}

/// Relationships of one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRelationships {
    pub module_name: String,
    pub relationships: Vec<Relationship>,
}

/// Outcome of a relationship analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipReport {
    /// Resolved module, or `None` for a cross-module query.
    pub module: Option<String>,
    pub query: String,
    pub limit: usize,
    /// The store returned exactly `limit` rows, so more may exist.
    pub truncated: bool,
    pub groups: Vec<ModuleRelationships>,
}

impl RelationshipReport {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.relationships.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_classification() {
        assert_eq!(FileType::from_path("main.tf"), FileType::Terraform);
        assert_eq!(FileType::from_path("docs/README.md"), FileType::Markdown);
        assert_eq!(FileType::from_path(".ci/build.yaml"), FileType::Yaml);
        assert_eq!(FileType::from_path("a.yml"), FileType::Yaml);
        assert_eq!(FileType::from_path("schema.json"), FileType::Json);
        assert_eq!(FileType::from_path("LICENSE"), FileType::Other);
        assert_eq!(FileType::from_path("main.tfvars"), FileType::Other);
    }

    #[test]
    fn test_module_file_new() {
        let file = ModuleFile::new(7, "modules/subnet/main.tf", "x = 1".into());
        assert_eq!(file.file_name, "main.tf");
        assert_eq!(file.file_type, FileType::Terraform);
        assert_eq!(file.size_bytes, 5);
        assert_eq!(file.module_id, 7);
    }

    #[test]
    fn test_block_has_path_is_exact() {
        let block = BlockRecord {
            id: 0,
            module_id: 1,
            file_path: "main.tf".into(),
            block_type: BlockKind::Resource,
            type_label: "azurerm_subnet".into(),
            start_byte: 0,
            end_byte: 10,
            attr_paths: "name\ntags\nlifecycle.ignore_changes".into(),
        };
        assert!(block.has_path("tags"));
        assert!(block.has_path("lifecycle.ignore_changes"));
        assert!(!block.has_path("tag"));
    }

    #[test]
    fn test_submodule_name() {
        assert!(is_submodule_name("terraform-azure-vnet//modules/subnet"));
        assert!(!is_submodule_name("terraform-azure-vnet"));
    }
}
