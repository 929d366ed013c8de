//! Query methods.
//!
//! The store is synchronous, so every query runs on the blocking pool with
//! its own clone of the engine.

use crate::error::{Result, TfmodError};
use crate::models::{
    ExampleContent, FileHit, Module, ModuleExamples, ModuleInfo, PatternPage, RelationshipReport,
    VariableDefinition,
};
use crate::query::{CodeSearch, PatternQuery, QueryEngine, RelationshipRequest};
use crate::TfmodApi;

impl TfmodApi {
    async fn run_query<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&QueryEngine) -> Result<T> + Send + 'static,
    {
        let engine = self.query.clone();
        tokio::task::spawn_blocking(move || query(&engine))
            .await
            .map_err(|e| TfmodError::Other(format!("Query task failed: {}", e)))?
    }

    /// Resolve a module name, alias, alias prefix or free-text hint.
    pub async fn resolve_module(&self, name_or_alias: &str) -> Result<Module> {
        let name = name_or_alias.to_string();
        self.run_query(move |q| q.resolve(&name)).await
    }

    pub async fn list_modules(&self) -> Result<Vec<Module>> {
        self.run_query(|q| q.list_modules()).await
    }

    pub async fn search_modules(&self, query: &str, limit: usize) -> Result<Vec<Module>> {
        let query = query.to_string();
        self.run_query(move |q| q.search_modules(&query, limit)).await
    }

    /// Module record with its declarations, file list and structure summary.
    pub async fn get_module_info(&self, module_name: &str) -> Result<ModuleInfo> {
        let name = module_name.to_string();
        self.run_query(move |q| q.get_module_info(&name)).await
    }

    pub async fn search_code(&self, search: CodeSearch) -> Result<Vec<FileHit>> {
        self.run_query(move |q| q.search_code(&search)).await
    }

    pub async fn get_file_content(&self, module_name: &str, file_path: &str) -> Result<FileHit> {
        let (name, path) = (module_name.to_string(), file_path.to_string());
        self.run_query(move |q| q.get_file_content(&name, &path)).await
    }

    pub async fn extract_variable_definition(
        &self,
        module_name: &str,
        variable_name: &str,
    ) -> Result<VariableDefinition> {
        let (name, variable) = (module_name.to_string(), variable_name.to_string());
        self.run_query(move |q| q.extract_variable_definition(&name, &variable))
            .await
    }

    /// Every occurrence of a structural or text pattern across modules.
    pub async fn compare_pattern(&self, query: PatternQuery) -> Result<PatternPage> {
        self.run_query(move |q| q.compare_pattern(&query)).await
    }

    pub async fn analyze_relationships(
        &self,
        request: RelationshipRequest,
    ) -> Result<RelationshipReport> {
        self.run_query(move |q| q.analyze_relationships(&request))
            .await
    }

    pub async fn list_module_examples(&self, module_name: &str) -> Result<ModuleExamples> {
        let name = module_name.to_string();
        self.run_query(move |q| q.list_module_examples(&name)).await
    }

    pub async fn get_example_content(
        &self,
        module_name: &str,
        example_name: &str,
    ) -> Result<ExampleContent> {
        let (name, example) = (module_name.to_string(), example_name.to_string());
        self.run_query(move |q| q.get_example_content(&name, &example))
            .await
    }
}
