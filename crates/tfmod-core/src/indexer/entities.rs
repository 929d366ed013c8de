//! Declared entities from top-level blocks.

use crate::hcl::{Attribute, Body};
use crate::models::{DataSource, Output, Resource, Variable};

/// Token before the first `_` of a resource type.
pub fn provider_from_type(resource_type: &str) -> String {
    resource_type
        .split('_')
        .next()
        .unwrap_or(resource_type)
        .to_string()
}

fn raw_text(attr: &Attribute, content: &str) -> String {
    attr.span.text(content).trim().to_string()
}

fn literal_description(body: &Body) -> String {
    body.attribute("description")
        .and_then(|a| a.literal_string.clone())
        .unwrap_or_default()
}

fn is_true(attr: &Attribute, content: &str) -> bool {
    if let Some(b) = attr.literal_bool {
        return b;
    }
    raw_text(attr, content).eq_ignore_ascii_case("true")
}

pub fn extract_variables(module_id: i64, body: &Body, content: &str) -> Vec<Variable> {
    body.blocks
        .iter()
        .filter(|b| b.ident == "variable" && !b.labels.is_empty())
        .map(|block| {
            let mut variable = Variable {
                module_id,
                name: block.labels[0].clone(),
                required: true,
                description: literal_description(&block.body),
                ..Default::default()
            };
            if let Some(attr) = block.body.attribute("type") {
                variable.var_type = raw_text(attr, content);
            }
            if let Some(attr) = block.body.attribute("default") {
                variable.required = false;
                variable.default_value = raw_text(attr, content);
            }
            if let Some(attr) = block.body.attribute("sensitive") {
                variable.sensitive = is_true(attr, content);
            }
            variable
        })
        .collect()
}

pub fn extract_outputs(module_id: i64, body: &Body, content: &str) -> Vec<Output> {
    body.blocks
        .iter()
        .filter(|b| b.ident == "output" && !b.labels.is_empty())
        .map(|block| Output {
            id: 0,
            module_id,
            name: block.labels[0].clone(),
            description: literal_description(&block.body),
            sensitive: block
                .body
                .attribute("sensitive")
                .map(|a| is_true(a, content))
                .unwrap_or(false),
        })
        .collect()
}

pub fn extract_resources(module_id: i64, body: &Body, file_name: &str) -> Vec<Resource> {
    body.blocks
        .iter()
        .filter(|b| b.ident == "resource" && b.labels.len() >= 2)
        .map(|block| Resource {
            id: 0,
            module_id,
            resource_type: block.labels[0].clone(),
            resource_name: block.labels[1].clone(),
            provider: provider_from_type(&block.labels[0]),
            source_file: file_name.to_string(),
        })
        .collect()
}

pub fn extract_data_sources(module_id: i64, body: &Body, file_name: &str) -> Vec<DataSource> {
    body.blocks
        .iter()
        .filter(|b| b.ident == "data" && b.labels.len() >= 2)
        .map(|block| DataSource {
            id: 0,
            module_id,
            data_type: block.labels[0].clone(),
            data_name: block.labels[1].clone(),
            provider: provider_from_type(&block.labels[0]),
            source_file: file_name.to_string(),
        })
        .collect()
}
