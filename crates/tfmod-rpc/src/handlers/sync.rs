//! Sync job handlers.

use super::get_str_param;
use crate::server::AppState;
use serde_json::{json, Value};
use tfmod_core::Result;

pub async fn sync_modules(state: &AppState, _params: &Value) -> Result<Value> {
    let job_id = state.api.sync_modules();
    Ok(json!({"job_id": job_id, "status": "running"}))
}

pub async fn sync_updates_modules(state: &AppState, _params: &Value) -> Result<Value> {
    let job_id = state.api.sync_updates_modules();
    Ok(json!({"job_id": job_id, "status": "running"}))
}

/// One job when `job_id` is given, otherwise every job newest first.
pub async fn sync_status(state: &AppState, params: &Value) -> Result<Value> {
    match get_str_param(params, "job_id", "jobId").map(str::trim) {
        Some(job_id) if !job_id.is_empty() => {
            let job = state.api.get_sync_job(job_id)?;
            Ok(serde_json::to_value(job)?)
        }
        _ => {
            let jobs = state.api.list_sync_jobs();
            Ok(json!({"jobs": jobs}))
        }
    }
}
