//! Structural indexing of terraform files.
//!
//! A parsed file yields declared entities (top-level only), the block index
//! used by pattern search, and the relationship index used by reference
//! queries. A file that fails to parse yields nothing.

pub mod blocks;
pub mod entities;
pub mod relationships;

pub use blocks::{collect_attr_paths, index_blocks};
pub use entities::provider_from_type;
pub use relationships::{classify_root, index_relationships};

use crate::hcl;
use crate::models::{BlockRecord, DataSource, ModuleFile, Output, Relationship, Resource, Variable};
use crate::Result;

/// Everything derived from one file.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    pub variables: Vec<Variable>,
    pub outputs: Vec<Output>,
    pub resources: Vec<Resource>,
    pub data_sources: Vec<DataSource>,
    pub blocks: Vec<BlockRecord>,
    pub relationships: Vec<Relationship>,
}

impl FileIndex {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.outputs.is_empty()
            && self.resources.is_empty()
            && self.data_sources.is_empty()
            && self.blocks.is_empty()
            && self.relationships.is_empty()
    }
}

/// Parse and index one stored file.
pub fn index_file(module_id: i64, file: &ModuleFile) -> Result<FileIndex> {
    let body = hcl::parse_file(&file.file_path, &file.content)?;
    let content = file.content.as_str();

    Ok(FileIndex {
        variables: entities::extract_variables(module_id, &body, content),
        outputs: entities::extract_outputs(module_id, &body, content),
        resources: entities::extract_resources(module_id, &body, &file.file_name),
        data_sources: entities::extract_data_sources(module_id, &body, &file.file_name),
        blocks: index_blocks(module_id, &file.file_path, &body),
        relationships: index_relationships(module_id, &file.file_path, &body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_file() {
        let file = ModuleFile::new(
            4,
            "main.tf",
            r#"
variable "subnet_id" {
  type = string
}

resource "azurerm_redis_cache" "this" {
  subnet_id = var.subnet_id
  lifecycle {
    ignore_changes = [tags]
  }
}
"#
            .to_string(),
        );
        let index = index_file(4, &file).unwrap();
        assert_eq!(index.variables.len(), 1);
        assert_eq!(index.resources.len(), 1);
        assert_eq!(index.blocks.len(), 2);
        assert_eq!(index.relationships.len(), 1);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_index_provider_defined_functions() {
        let file = ModuleFile::new(
            4,
            "main.tf",
            r#"
resource "azurerm_key_vault_secret" "expiry" {
  name            = var.name
  expiration_date = provider::time::rfc3339_parse(var.expires_at).unix
}

output "expires" {
  value = provider::time::rfc3339_parse(var.expires_at)
}
"#
            .to_string(),
        );
        let index = index_file(4, &file).unwrap();
        assert_eq!(index.resources.len(), 1);
        assert_eq!(index.outputs.len(), 1);
        assert_eq!(index.blocks.len(), 1);
        let names: Vec<&str> = index
            .relationships
            .iter()
            .map(|r| r.reference_name.as_str())
            .collect();
        assert_eq!(names, vec!["var.name", "var.expires_at", "var.expires_at"]);
    }

    #[test]
    fn test_deeply_nested_file_is_skipped() {
        let content = format!(
            "resource \"azurerm_subnet\" \"a\" {{\n  tags = {}1{}\n}}\n",
            "[".repeat(20_000),
            "]".repeat(20_000)
        );
        let file = ModuleFile::new(4, "deep.tf", content);
        match index_file(4, &file) {
            Err(crate::TfmodError::Parse { path, .. }) => assert_eq!(path, "deep.tf"),
            other => panic!("expected a parse error, got {:?}", other.map(|i| i.is_empty())),
        }
    }

    #[test]
    fn test_parse_failure_is_error() {
        let file = ModuleFile::new(4, "broken.tf", "resource \"a\" \"b\" {".into());
        assert!(index_file(4, &file).is_err());
    }
}
