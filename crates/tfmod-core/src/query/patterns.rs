//! Structural and literal pattern matching across modules.
//!
//! A recognised pattern is answered from the persisted block index. When the
//! index yields nothing every `.tf` file is parsed and the same block
//! extraction runs in memory; files without a structural hit fall back to a
//! literal substring search.

use super::QueryEngine;
use crate::config::QueryConfig;
use crate::hcl::parse_file;
use crate::indexer::index_blocks;
use crate::models::{BlockKind, Module, ModuleFile, PatternMatch, PatternPage};
use crate::store::BlockFilter;
use crate::{Result, TfmodError};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Block shape named by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternShape {
    /// `resource "<type prefix>"`
    Resource(String),
    /// `dynamic "<label>"`
    Dynamic(String),
    Lifecycle,
}

/// A recognised pattern with its `has:` filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralPattern {
    pub shape: PatternShape,
    pub has: Vec<String>,
}

impl StructuralPattern {
    /// Recognise `resource "..."`, `dynamic "..."` or `lifecycle`.
    pub fn parse(pattern: &str) -> Option<Self> {
        let trimmed = pattern.trim();
        let shape = if let Some(want) = quoted_arg(trimmed, "resource") {
            PatternShape::Resource(want)
        } else if let Some(want) = quoted_arg(trimmed, "dynamic") {
            PatternShape::Dynamic(want)
        } else if trimmed.starts_with("lifecycle") {
            PatternShape::Lifecycle
        } else {
            return None;
        };
        Some(Self {
            shape,
            has: has_filters(trimmed),
        })
    }

    pub fn kind(&self) -> BlockKind {
        match self.shape {
            PatternShape::Resource(_) => BlockKind::Resource,
            PatternShape::Dynamic(_) => BlockKind::Dynamic,
            PatternShape::Lifecycle => BlockKind::Lifecycle,
        }
    }

    pub fn filter(&self) -> BlockFilter {
        let (type_label, label_prefix) = match &self.shape {
            PatternShape::Resource(prefix) => (Some(prefix.clone()), true),
            PatternShape::Dynamic(label) => (Some(label.clone()), false),
            PatternShape::Lifecycle => (None, false),
        };
        BlockFilter {
            kind: Some(self.kind()),
            type_label,
            label_prefix,
            has: self.has.clone(),
        }
    }
}

/// Text between the first pair of quotes after `<keyword> `.
fn quoted_arg(pattern: &str, keyword: &str) -> Option<String> {
    let rest = pattern.strip_prefix(keyword)?.strip_prefix(' ')?;
    let open = rest.find('"')?;
    let after = &rest[open + 1..];
    let close = after.find('"')?;
    let want = after[..close].trim();
    (!want.is_empty()).then(|| want.to_string())
}

fn has_filters(pattern: &str) -> Vec<String> {
    pattern
        .split_whitespace()
        .filter_map(|t| t.strip_prefix("has:"))
        .map(str::to_string)
        .collect()
}

/// Arguments of a pattern comparison.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternQuery {
    pub pattern: String,
    /// File name filter, e.g. `main.tf`.
    pub file_type: Option<String>,
    /// Page size; 0 returns every match.
    pub limit: usize,
    pub offset: usize,
    /// Return whole blocks instead of their first line.
    pub show_full_blocks: bool,
}

/// Slice `[offset, offset + limit)` clamped to the available items.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    let take = if limit == 0 { usize::MAX } else { limit };
    items.into_iter().skip(offset).take(take).collect()
}

/// End of the line holding the brace that closes the first block opened at
/// or after `from`.
pub fn block_end(content: &str, from: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth: i64 = 0;
    let mut opened = false;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match b {
            b'{' => {
                depth += 1;
                opened = true;
            }
            b'}' => {
                depth -= 1;
                if opened && depth == 0 {
                    let end = content[i + 1..]
                        .find('\n')
                        .map(|n| i + 1 + n)
                        .unwrap_or(content.len());
                    return Some(end);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte ranges around each literal occurrence of `pattern`.
///
/// Each range starts at the occurrence's line and runs to the line closing
/// the next block, or to the end of the line when no block follows. Ranges
/// starting inside an earlier range are dropped.
pub fn text_match_ranges(content: &str, pattern: &str) -> Vec<(usize, usize)> {
    if pattern.is_empty() {
        return Vec::new();
    }

    let mut ranges = Vec::new();
    let mut covered = 0;
    for (idx, _) in content.match_indices(pattern) {
        let start = content[..idx].rfind('\n').map(|n| n + 1).unwrap_or(0);
        if !ranges.is_empty() && start < covered {
            continue;
        }
        let end = block_end(content, idx).unwrap_or_else(|| {
            content[idx..]
                .find('\n')
                .map(|n| idx + n)
                .unwrap_or(content.len())
        });
        ranges.push((start, end));
        covered = end;
    }
    ranges
}

/// Trimmed text of a byte range, clamped to the content.
fn slice_trimmed(content: &str, start: usize, end: usize) -> String {
    let end = end.min(content.len());
    let start = start.min(end);
    content.get(start..end).unwrap_or_default().trim().to_string()
}

fn file_filter_matches(file_path: &str, filter: &str) -> bool {
    file_path == filter || file_path.ends_with(&format!("/{}", filter))
}

impl QueryEngine {
    /// Every match of `pattern`, in module, file and occurrence order.
    pub fn find_pattern_matches(
        &self,
        pattern: &str,
        file_type: Option<&str>,
    ) -> Result<Vec<PatternMatch>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(TfmodError::invalid_input("pattern", "must not be empty"));
        }
        let file_type = file_type.map(str::trim).filter(|f| !f.is_empty());
        let structural = StructuralPattern::parse(pattern);

        if let Some(structural) = &structural {
            let indexed = self.indexed_matches(structural, file_type)?;
            if !indexed.is_empty() {
                return Ok(indexed);
            }
            debug!("Block index has no rows for '{}', parsing files", pattern);
        }

        let mut results = Vec::new();
        for module in self.store.list_modules()? {
            for file in self.store.module_files(module.id)? {
                if file_type.is_some_and(|f| file.file_name != f) {
                    continue;
                }
                if !file.file_name.ends_with(".tf") {
                    continue;
                }

                let mut ranges = structural
                    .as_ref()
                    .map(|s| ast_match_ranges(&file, s))
                    .unwrap_or_default();
                if ranges.is_empty() {
                    ranges = text_match_ranges(&file.content, pattern);
                }

                let several = ranges.len() > 1;
                for (n, (start, end)) in ranges.into_iter().enumerate() {
                    let display_name = if several {
                        format!("{} #{}", module.name, n + 1)
                    } else {
                        module.name.clone()
                    };
                    results.push(PatternMatch {
                        module_name: module.name.clone(),
                        display_name,
                        file_path: file.file_path.clone(),
                        start_byte: start,
                        end_byte: end,
                        snippet: slice_trimmed(&file.content, start, end),
                    });
                }
            }
        }
        Ok(results)
    }

    fn indexed_matches(
        &self,
        pattern: &StructuralPattern,
        file_type: Option<&str>,
    ) -> Result<Vec<PatternMatch>> {
        let blocks = self.store.query_blocks(&pattern.filter())?;
        let mut modules: HashMap<i64, Option<Module>> = HashMap::new();
        let mut files: HashMap<(i64, String), Option<ModuleFile>> = HashMap::new();
        let mut results = Vec::new();

        for block in blocks {
            if file_type.is_some_and(|f| !file_filter_matches(&block.file_path, f)) {
                continue;
            }

            let module = match modules.get(&block.module_id) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.store.get_module_by_id(block.module_id)?;
                    modules.insert(block.module_id, loaded.clone());
                    loaded
                }
            };
            let Some(module) = module else { continue };

            let key = (block.module_id, block.file_path.clone());
            if !files.contains_key(&key) {
                let loaded = self.store.get_file(block.module_id, &block.file_path)?;
                files.insert(key.clone(), loaded);
            }
            let Some(Some(file)) = files.get(&key) else { continue };

            results.push(PatternMatch {
                module_name: module.name.clone(),
                display_name: module.name,
                file_path: block.file_path.clone(),
                start_byte: block.start_byte,
                end_byte: block.end_byte.min(file.content.len()),
                snippet: slice_trimmed(&file.content, block.start_byte, block.end_byte),
            });
        }
        Ok(results)
    }

    /// Run a pattern comparison and return one page of it.
    pub fn compare_pattern(&self, query: &PatternQuery) -> Result<PatternPage> {
        let limit = if query.limit == 0 && query.show_full_blocks {
            QueryConfig::DEFAULT_FULL_BLOCK_LIMIT
        } else {
            query.limit
        };

        let all = self.find_pattern_matches(&query.pattern, query.file_type.as_deref())?;
        let total = all.len();
        let mut matches = paginate(all, query.offset, limit);
        if !query.show_full_blocks {
            for m in &mut matches {
                if let Some(first) = m.snippet.lines().next() {
                    m.snippet = first.to_string();
                }
            }
        }

        Ok(PatternPage {
            pattern: query.pattern.trim().to_string(),
            total,
            offset: query.offset.min(total),
            limit,
            matches,
        })
    }
}

/// Byte ranges of blocks in one file matching a structural pattern, found by
/// parsing the file. Unparseable files yield nothing.
fn ast_match_ranges(file: &ModuleFile, pattern: &StructuralPattern) -> Vec<(usize, usize)> {
    let body = match parse_file(&file.file_path, &file.content) {
        Ok(body) => body,
        Err(e) => {
            debug!("Skipping structural match in {}: {}", file.file_path, e);
            return Vec::new();
        }
    };
    let filter = pattern.filter();
    index_blocks(file.module_id, &file.file_path, &body)
        .into_iter()
        .filter(|b| filter.matches(b))
        .map(|b| (b.start_byte, b.end_byte))
        .collect()
}
