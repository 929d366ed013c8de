//! Classified references found in attribute expressions.

use crate::hcl::{Block, Body, Span, Traversal};
use crate::models::Relationship;
use std::collections::HashSet;

/// Reference kind for a traversal root.
///
/// Any other root containing `_` is assumed to be a resource type; this also
/// catches unrelated multi-word identifiers.
pub fn classify_root(root: &str) -> &'static str {
    match root {
        "var" => "variable",
        "local" => "local",
        "module" => "module_output",
        "data" => "data_source",
        "path" => "path",
        "terraform" => "terraform",
        "each" => "each",
        "self" => "self",
        "count" => "count",
        r if r.contains('_') => "resource",
        _ => "reference",
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}.{}", prefix, name),
    }
}

/// Relationships for every top-level block of a file.
pub fn index_relationships(module_id: i64, file_path: &str, body: &Body) -> Vec<Relationship> {
    body.blocks
        .iter()
        .flat_map(|block| block_relationships(module_id, file_path, block))
        .collect()
}

fn block_relationships(module_id: i64, file_path: &str, block: &Block) -> Vec<Relationship> {
    let block_labels = block.labels.join(".");
    let mut out = Vec::new();
    walk(&block.body, "", &mut |attr_path, traversals: &[Traversal], span| {
        let mut seen = HashSet::new();
        for traversal in traversals {
            let reference = traversal.render();
            if !seen.insert(reference.clone()) {
                continue;
            }
            out.push(Relationship {
                id: 0,
                module_id,
                file_path: file_path.to_string(),
                block_type: block.ident.clone(),
                block_labels: block_labels.clone(),
                attribute_path: attr_path.to_string(),
                reference_type: classify_root(&traversal.root).to_string(),
                reference_name: reference,
                start_byte: span.start,
                end_byte: span.end,
            });
        }
    });
    out
}

fn walk(
    body: &Body,
    prefix: &str,
    emit: &mut dyn FnMut(&str, &[Traversal], Span),
) {
    for attr in &body.attributes {
        if attr.references.is_empty() {
            continue;
        }
        emit(&join_path(prefix, &attr.key), &attr.references, attr.span);
    }
    for child in &body.blocks {
        let segment = if child.labels.is_empty() {
            child.ident.clone()
        } else {
            join_path(&child.ident, &child.labels.join("."))
        };
        walk(&child.body, &join_path(prefix, &segment), emit);
    }
}
