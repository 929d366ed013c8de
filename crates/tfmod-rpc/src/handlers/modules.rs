//! Module catalog handlers.

use super::{get_usize_param, require_str_param};
use crate::server::AppState;
use serde_json::{json, Value};
use tfmod_core::Result;

pub async fn list_modules(state: &AppState, _params: &Value) -> Result<Value> {
    let modules = state.api.list_modules().await?;
    Ok(json!({"total": modules.len(), "modules": modules}))
}

pub async fn search_modules(state: &AppState, params: &Value) -> Result<Value> {
    let query = require_str_param(params, "query", "query")?;
    let limit = get_usize_param(params, "limit", "limit")?.unwrap_or(0);
    let modules = state.api.search_modules(&query, limit).await?;
    Ok(json!({"query": query, "modules": modules}))
}

pub async fn get_module_info(state: &AppState, params: &Value) -> Result<Value> {
    let module_name = require_str_param(params, "module_name", "moduleName")?;
    let info = state.api.get_module_info(&module_name).await?;
    Ok(serde_json::to_value(info)?)
}

pub async fn get_file_content(state: &AppState, params: &Value) -> Result<Value> {
    let module_name = require_str_param(params, "module_name", "moduleName")?;
    let file_path = require_str_param(params, "file_path", "filePath")?;
    let hit = state.api.get_file_content(&module_name, &file_path).await?;
    Ok(serde_json::to_value(hit)?)
}

pub async fn extract_variable_definition(state: &AppState, params: &Value) -> Result<Value> {
    let module_name = require_str_param(params, "module_name", "moduleName")?;
    let variable_name = require_str_param(params, "variable_name", "variableName")?;
    let definition = state
        .api
        .extract_variable_definition(&module_name, &variable_name)
        .await?;
    Ok(serde_json::to_value(definition)?)
}

pub async fn list_module_examples(state: &AppState, params: &Value) -> Result<Value> {
    let module_name = require_str_param(params, "module_name", "moduleName")?;
    let examples = state.api.list_module_examples(&module_name).await?;
    Ok(serde_json::to_value(examples)?)
}

pub async fn get_example_content(state: &AppState, params: &Value) -> Result<Value> {
    let module_name = require_str_param(params, "module_name", "moduleName")?;
    let example_name = require_str_param(params, "example_name", "exampleName")?;
    let content = state
        .api
        .get_example_content(&module_name, &example_name)
        .await?;
    Ok(serde_json::to_value(content)?)
}
