//! Reference relationship queries.

use super::QueryEngine;
use crate::config::QueryConfig;
use crate::models::{Module, ModuleRelationships, Relationship, RelationshipReport};
use crate::{Result, TfmodError};
use serde::Deserialize;
use tracing::warn;

/// Arguments of a relationship analysis; structured fields win over
/// anything derived from `prompt`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationshipRequest {
    pub module_name: Option<String>,
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub prompt: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn effective_limit(limit: usize) -> usize {
    if limit == 0 {
        QueryConfig::DEFAULT_RELATIONSHIP_LIMIT
    } else {
        limit
    }
}

impl QueryEngine {
    /// Relationships of one module whose attribute path, reference, labels
    /// or block type contain `query`, in file and offset order.
    pub fn module_relationships(
        &self,
        module: &Module,
        query: &str,
        limit: usize,
    ) -> Result<RelationshipReport> {
        let limit = effective_limit(limit);
        let mut relationships = self.store.query_relationships(module.id, query, limit + 1)?;
        let truncated = relationships.len() > limit;
        relationships.truncate(limit);
        let groups = if relationships.is_empty() {
            Vec::new()
        } else {
            vec![ModuleRelationships {
                module_name: module.name.clone(),
                relationships,
            }]
        };

        Ok(RelationshipReport {
            module: Some(module.name.clone()),
            query: query.to_string(),
            limit,
            truncated,
            groups,
        })
    }

    /// Relationships across every module whose attribute path or reference
    /// contains `query`, grouped by module in first-seen order.
    pub fn relationships_across(&self, query: &str, limit: usize) -> Result<RelationshipReport> {
        let limit = effective_limit(limit);
        let mut relationships = self.store.query_relationships_any(query, limit + 1)?;
        let truncated = relationships.len() > limit;
        relationships.truncate(limit);

        let mut buckets: Vec<(i64, Vec<Relationship>)> = Vec::new();
        for rel in relationships {
            match buckets.iter_mut().find(|(id, _)| *id == rel.module_id) {
                Some((_, items)) => items.push(rel),
                None => buckets.push((rel.module_id, vec![rel])),
            }
        }

        let mut groups = Vec::with_capacity(buckets.len());
        for (module_id, relationships) in buckets {
            match self.store.get_module_by_id(module_id)? {
                Some(module) => groups.push(ModuleRelationships {
                    module_name: module.name,
                    relationships,
                }),
                None => warn!("Dropping relationships of missing module {}", module_id),
            }
        }

        Ok(RelationshipReport {
            module: None,
            query: query.to_string(),
            limit,
            truncated,
            groups,
        })
    }

    /// Answer a relationship request built from structured fields, a
    /// free-text prompt, or both.
    pub fn analyze_relationships(&self, request: &RelationshipRequest) -> Result<RelationshipReport> {
        let module_name = non_blank(request.module_name.as_deref());
        let mut query = non_blank(request.query.as_deref());
        let mut limit = request.limit.unwrap_or(0);
        let mut module = None;

        if let Some(prompt) = non_blank(request.prompt.as_deref()) {
            let parsed = self.interpret_prompt(&prompt)?;
            if module_name.is_none() {
                module = parsed.module;
            }
            if query.is_none() {
                query = Some(parsed.query);
            }
            if limit == 0 && parsed.limit > 0 {
                limit = parsed.limit;
            }
        }

        let Some(query) = query else {
            return Err(TfmodError::invalid_input(
                "query",
                "missing; provide a query or say what to look for in the prompt",
            ));
        };

        if module.is_none() {
            if let Some(name) = &module_name {
                module = Some(self.resolve(name)?);
            }
        }

        match module {
            Some(module) => self.module_relationships(&module, &query, limit),
            None => self.relationships_across(&query, limit),
        }
    }
}
