//! Code search, pattern comparison and relationship handlers.

use super::{get_bool_param, get_str_list_param, get_str_param, get_usize_param, require_str_param};
use crate::server::AppState;
use serde_json::{json, Value};
use tfmod_core::{CodeSearch, PatternQuery, RelationshipRequest, Result};

fn optional_str(params: &Value, snake: &str, camel: &str) -> Option<String> {
    get_str_param(params, snake, camel)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub async fn search_code(state: &AppState, params: &Value) -> Result<Value> {
    let search = CodeSearch {
        query: require_str_param(params, "query", "query")?,
        limit: get_usize_param(params, "limit", "limit")?.unwrap_or(0),
        kind: optional_str(params, "kind", "kind"),
        type_prefix: optional_str(params, "type_prefix", "typePrefix"),
        has: get_str_list_param(params, "has", "has")?,
    };
    let query = search.query.clone();
    let hits = state.api.search_code(search).await?;
    Ok(json!({"query": query, "total": hits.len(), "hits": hits}))
}

pub async fn compare_pattern(state: &AppState, params: &Value) -> Result<Value> {
    let query = PatternQuery {
        pattern: require_str_param(params, "pattern", "pattern")?,
        file_type: optional_str(params, "file_type", "fileType"),
        limit: get_usize_param(params, "limit", "limit")?.unwrap_or(0),
        offset: get_usize_param(params, "offset", "offset")?.unwrap_or(0),
        show_full_blocks: get_bool_param(params, "show_full_blocks", "showFullBlocks")
            .unwrap_or(false),
    };
    let page = state.api.compare_pattern(query).await?;
    Ok(serde_json::to_value(page)?)
}

/// Accepts structured fields, a `prompt`, or a bare string as the prompt.
pub async fn analyze_relationships(state: &AppState, params: &Value) -> Result<Value> {
    let request = match params {
        Value::String(prompt) => RelationshipRequest {
            prompt: Some(prompt.clone()),
            ..Default::default()
        },
        _ => RelationshipRequest {
            module_name: optional_str(params, "module_name", "moduleName"),
            query: optional_str(params, "query", "query"),
            limit: get_usize_param(params, "limit", "limit")?,
            prompt: optional_str(params, "prompt", "prompt"),
        },
    };
    let report = state.api.analyze_relationships(request).await?;

    let total = report.total();
    let mut value = serde_json::to_value(report)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("total".to_string(), json!(total));
    }
    Ok(value)
}
