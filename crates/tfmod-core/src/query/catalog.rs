//! Module listing, search and file lookups.

use super::QueryEngine;
use crate::config::{QueryConfig, SyncConfig};
use crate::models::{
    BlockKind, ExampleContent, ExampleSummary, FileEntry, FileHit, Module, ModuleExamples,
    ModuleFile, ModuleInfo, VariableDefinition,
};
use crate::store::fts::any_phrase;
use crate::store::BlockFilter;
use crate::{Result, TfmodError};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Lowercased search variants: the query itself, with `-`, `_` and `/`
/// read as spaces, and with those spaces removed.
pub fn expand_query_variants(query: &str) -> Vec<String> {
    let base = query.trim().to_lowercase();
    if base.is_empty() {
        return Vec::new();
    }
    let spaced = base
        .replace(['-', '_', '/'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let joined = spaced.replace(' ', "");

    let mut seen = HashSet::new();
    [base, spaced, joined]
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

/// Text of `variable "<name>" { ... }` through its closing brace.
pub fn extract_variable_block(content: &str, variable_name: &str) -> Option<String> {
    let needle = format!("variable \"{}\"", variable_name);
    let start = content.find(&needle)?;

    let mut depth: i64 = 0;
    let mut opened = false;
    for (i, b) in content.bytes().enumerate().skip(start) {
        match b {
            b'{' => {
                depth += 1;
                opened = true;
            }
            b'}' => {
                depth -= 1;
                if opened && depth == 0 {
                    return Some(content[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Arguments of a code search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CodeSearch {
    pub query: String,
    /// 0 uses the default page size.
    pub limit: usize,
    /// Block kind a hit file must contain: resource, dynamic or lifecycle.
    pub kind: Option<String>,
    /// Resource type prefix a hit file's block must carry.
    pub type_prefix: Option<String>,
    /// Attribute paths the block must contain.
    pub has: Vec<String>,
}

impl CodeSearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    fn block_filter(&self) -> Result<BlockFilter> {
        let kind = match self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => Some(BlockKind::from_keyword(k).ok_or_else(|| {
                TfmodError::invalid_input("kind", format!("unknown block kind '{}'", k))
            })?),
            None => None,
        };
        Ok(BlockFilter {
            kind,
            type_label: self
                .type_prefix
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            label_prefix: true,
            has: self.has.iter().filter(|h| !h.trim().is_empty()).cloned().collect(),
        })
    }
}

fn default_limit(limit: usize, default: usize) -> usize {
    if limit == 0 {
        default
    } else {
        limit
    }
}

impl QueryEngine {
    /// Every module, ordered by name.
    pub fn list_modules(&self) -> Result<Vec<Module>> {
        self.store.list_modules()
    }

    /// Full-text module search over every query variant, merged by id in
    /// first-seen order.
    pub fn search_modules(&self, query: &str, limit: usize) -> Result<Vec<Module>> {
        let variants = expand_query_variants(query);
        if variants.is_empty() {
            return Err(TfmodError::invalid_input("query", "must not be empty"));
        }
        let limit = default_limit(limit, QueryConfig::DEFAULT_MODULE_SEARCH_LIMIT);

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for variant in &variants {
            for module in self.store.search_modules(variant, limit)? {
                if merged.len() >= limit {
                    return Ok(merged);
                }
                if seen.insert(module.id) {
                    merged.push(module);
                }
            }
        }
        merged.truncate(limit);
        Ok(merged)
    }

    /// Full-text file search, optionally restricted to files holding a
    /// matching indexed block.
    pub fn search_code(&self, search: &CodeSearch) -> Result<Vec<FileHit>> {
        let variants = expand_query_variants(&search.query);
        if variants.is_empty() {
            return Err(TfmodError::invalid_input("query", "must not be empty"));
        }
        let limit = default_limit(search.limit, QueryConfig::DEFAULT_CODE_SEARCH_LIMIT);
        let filter = search.block_filter()?;

        let expression = any_phrase(variants.iter().map(String::as_str));
        let files = self.store.search_files(&expression, limit)?;

        let mut names: HashMap<i64, Option<String>> = HashMap::new();
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for file in files {
            if hits.len() >= limit {
                break;
            }
            if seen.contains(&file.id) {
                continue;
            }
            if !filter.is_empty()
                && !self.store.block_exists(file.module_id, &file.file_path, &filter)?
            {
                continue;
            }
            if !names.contains_key(&file.module_id) {
                let name = self.store.get_module_by_id(file.module_id)?.map(|m| m.name);
                names.insert(file.module_id, name);
            }
            let Some(Some(module_name)) = names.get(&file.module_id) else {
                continue;
            };
            seen.insert(file.id);
            hits.push(FileHit {
                module_name: module_name.clone(),
                file,
            });
        }
        Ok(hits)
    }

    /// Module detail with entities, file listing and structural summary.
    pub fn get_module_info(&self, name: &str) -> Result<ModuleInfo> {
        let module = self.resolve(name)?;
        let files = self
            .store
            .module_files(module.id)?
            .iter()
            .map(FileEntry::from)
            .collect();

        Ok(ModuleInfo {
            variables: self.store.module_variables(module.id)?,
            outputs: self.store.module_outputs(module.id)?,
            resources: self.store.module_resources(module.id)?,
            data_sources: self.store.module_data_sources(module.id)?,
            structure: self.store.summarize_structure(module.id)?,
            files,
            module,
        })
    }

    /// One stored file of a module by exact path.
    pub fn get_file_content(&self, module_name: &str, file_path: &str) -> Result<FileHit> {
        let module = self.resolve(module_name)?;
        let file = self
            .store
            .get_file(module.id, file_path.trim())?
            .ok_or_else(|| {
                TfmodError::not_found("File", format!("{} in {}", file_path, module.name))
            })?;
        Ok(FileHit {
            module_name: module.name,
            file,
        })
    }

    /// Source of one variable block from the module's `variables.tf`.
    pub fn extract_variable_definition(
        &self,
        module_name: &str,
        variable_name: &str,
    ) -> Result<VariableDefinition> {
        let variable_name = variable_name.trim();
        if variable_name.is_empty() {
            return Err(TfmodError::invalid_input("variable_name", "must not be empty"));
        }
        let module = self.resolve(module_name)?;
        let file = self.store.get_file(module.id, "variables.tf")?.ok_or_else(|| {
            TfmodError::not_found("File", format!("variables.tf in {}", module.name))
        })?;
        let definition = extract_variable_block(&file.content, variable_name).ok_or_else(|| {
            TfmodError::not_found("Variable", format!("{} in {}", variable_name, module.name))
        })?;

        Ok(VariableDefinition {
            module_name: module.name,
            variable_name: variable_name.to_string(),
            definition,
        })
    }

    /// Example directories of a module with their file names.
    pub fn list_module_examples(&self, module_name: &str) -> Result<ModuleExamples> {
        let module = self.resolve(module_name)?;
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for file in self.store.module_files(module.id)? {
            let mut parts = file.file_path.split('/');
            let (Some(root), Some(example), Some(_)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if root != SyncConfig::EXAMPLES_DIR {
                continue;
            }
            grouped
                .entry(example.to_string())
                .or_default()
                .push(file.file_name);
        }

        Ok(ModuleExamples {
            module_name: module.name,
            examples: grouped
                .into_iter()
                .map(|(name, files)| ExampleSummary { name, files })
                .collect(),
        })
    }

    /// Files of one example, `main.tf` first.
    pub fn get_example_content(
        &self,
        module_name: &str,
        example_name: &str,
    ) -> Result<ExampleContent> {
        let module = self.resolve(module_name)?;
        let example_name = example_name.trim().trim_matches('/');
        let prefix = format!("{}/{}/", SyncConfig::EXAMPLES_DIR, example_name);

        let (mut files, rest): (Vec<ModuleFile>, Vec<ModuleFile>) = self
            .store
            .module_files(module.id)?
            .into_iter()
            .filter(|f| !example_name.is_empty() && f.file_path.starts_with(&prefix))
            .partition(|f| f.file_path.strip_prefix(&prefix) == Some("main.tf"));
        files.extend(rest);

        if files.is_empty() {
            return Err(TfmodError::not_found(
                "Example",
                format!("{} in {}", example_name, module.name),
            ));
        }
        Ok(ExampleContent {
            module_name: module.name,
            example_name: example_name.to_string(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{create_test_engine, seed_module};
    use super::*;

    const VARIABLES: &str = r#"variable "name" {
  type = string
}

variable "network" {
  type = object({
    address_space = list(string)
  })
  default = null
}
"#;

    const MAIN: &str = r#"resource "azurerm_storage_account" "this" {
  name = var.name
  tags = var.tags

  lifecycle {
    ignore_changes = [tags]
  }
}

resource "azurerm_storage_container" "this" {
  name = "logs"
}
"#;

    #[test]
    fn test_expand_query_variants() {
        assert_eq!(
            expand_query_variants(" Key-Vault "),
            vec!["key-vault", "key vault", "keyvault"]
        );
        assert_eq!(expand_query_variants("redis"), vec!["redis"]);
        assert_eq!(
            expand_query_variants("private_endpoint/subnet"),
            vec!["private_endpoint/subnet", "private endpoint subnet", "privateendpointsubnet"]
        );
        assert!(expand_query_variants("  ").is_empty());
    }

    #[test]
    fn test_extract_variable_block() {
        let block = extract_variable_block(VARIABLES, "network").unwrap();
        assert!(block.starts_with("variable \"network\" {"));
        assert!(block.ends_with("default = null\n}"));
        assert!(block.contains("address_space"));
        assert_eq!(
            extract_variable_block(VARIABLES, "name").unwrap(),
            "variable \"name\" {\n  type = string\n}"
        );
        assert!(extract_variable_block(VARIABLES, "missing").is_none());
    }

    #[test]
    fn test_search_modules_merges_variants() {
        let (engine, _temp) = create_test_engine();
        let kv = seed_module(&engine, "terraform-azure-kv", &[]);
        engine.store().update_readme(kv, "Manages a key vault").unwrap();
        seed_module(&engine, "terraform-azure-keyvault-secrets", &[]);

        let names: Vec<String> = engine
            .search_modules("key-vault", 0)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert!(names.contains(&"terraform-azure-kv".to_string()));

        let limited = engine.search_modules("terraform", 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert!(engine.search_modules(" ", 0).is_err());
    }

    #[test]
    fn test_search_code_with_structural_filters() {
        let (engine, _temp) = create_test_engine();
        seed_module(
            &engine,
            "terraform-azure-sa",
            &[("main.tf", MAIN), ("variables.tf", VARIABLES), ("README.md", "storage account docs")],
        );

        let hits = engine.search_code(&CodeSearch::new("storage_account")).unwrap();
        assert!(hits.iter().any(|h| h.file.file_path == "main.tf"));
        assert!(hits.iter().all(|h| h.module_name == "terraform-azure-sa"));

        let structural = engine
            .search_code(&CodeSearch {
                query: "storage".into(),
                kind: Some("resource".into()),
                type_prefix: Some("azurerm_storage".into()),
                has: vec!["lifecycle.ignore_changes".into()],
                ..Default::default()
            })
            .unwrap();
        let paths: Vec<_> = structural.iter().map(|h| h.file.file_path.as_str()).collect();
        assert_eq!(paths, vec!["main.tf"]);

        let none = engine
            .search_code(&CodeSearch {
                query: "storage".into(),
                kind: Some("dynamic".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());

        let err = engine
            .search_code(&CodeSearch {
                query: "storage".into(),
                kind: Some("module".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, TfmodError::InvalidInput { .. }));
    }

    #[test]
    fn test_module_info() {
        let (engine, _temp) = create_test_engine();
        seed_module(
            &engine,
            "terraform-azure-sa",
            &[("main.tf", MAIN), ("variables.tf", VARIABLES)],
        );

        let info = engine.get_module_info("sa").unwrap();
        assert_eq!(info.module.name, "terraform-azure-sa");
        assert_eq!(info.variables.len(), 2);
        assert_eq!(info.resources.len(), 2);
        assert_eq!(info.files.len(), 2);
        assert_eq!(info.structure.resource_blocks, 2);
        assert_eq!(info.structure.lifecycle_blocks, 1);
        assert_eq!(info.structure.resources_with_ignore_changes, 1);

        assert!(engine.get_module_info("cosmosdb").unwrap_err().is_not_found());
    }

    #[test]
    fn test_file_and_variable_lookups() {
        let (engine, _temp) = create_test_engine();
        seed_module(
            &engine,
            "terraform-azure-sa",
            &[("main.tf", MAIN), ("variables.tf", VARIABLES)],
        );

        let hit = engine.get_file_content("terraform-azure-sa", "main.tf").unwrap();
        assert_eq!(hit.file.content, MAIN);
        assert!(engine
            .get_file_content("terraform-azure-sa", "outputs.tf")
            .unwrap_err()
            .is_not_found());

        let def = engine.extract_variable_definition("sa", "name").unwrap();
        assert_eq!(def.module_name, "terraform-azure-sa");
        assert_eq!(def.definition, "variable \"name\" {\n  type = string\n}");
        assert!(engine
            .extract_variable_definition("sa", "missing")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_examples() {
        let (engine, _temp) = create_test_engine();
        seed_module(
            &engine,
            "terraform-azure-sa",
            &[
                ("main.tf", MAIN),
                ("examples/README.md", "# examples"),
                ("examples/default/variables.tf", VARIABLES),
                ("examples/default/main.tf", MAIN),
                ("examples/private/main.tf", MAIN),
            ],
        );

        let listing = engine.list_module_examples("sa").unwrap();
        assert_eq!(
            listing.examples,
            vec![
                ExampleSummary {
                    name: "default".into(),
                    files: vec!["main.tf".into(), "variables.tf".into()],
                },
                ExampleSummary {
                    name: "private".into(),
                    files: vec!["main.tf".into()],
                },
            ]
        );

        let content = engine.get_example_content("sa", "default").unwrap();
        let paths: Vec<_> = content.files.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["examples/default/main.tf", "examples/default/variables.tf"]);

        assert!(engine
            .get_example_content("sa", "missing")
            .unwrap_err()
            .is_not_found());
    }
}
