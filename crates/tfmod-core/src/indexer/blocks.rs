//! Byte-range index of resource, dynamic and lifecycle blocks.

use crate::hcl::{Block, Body};
use crate::models::{BlockKind, BlockRecord};

/// Attribute keys and nested block-type paths under `body`, dot-joined.
pub fn collect_attr_paths(body: &Body, prefix: &str) -> Vec<String> {
    let join = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    let mut out: Vec<String> = body.attributes.iter().map(|a| join(&a.key)).collect();
    for nested in &body.blocks {
        let path = join(&nested.ident);
        let children = collect_attr_paths(&nested.body, &path);
        out.push(path);
        out.extend(children);
    }
    out
}

/// Type label recorded for an indexed block.
pub fn type_label(block: &Block, kind: BlockKind) -> String {
    match kind {
        BlockKind::Resource if block.labels.len() >= 2 => block.labels[0].clone(),
        BlockKind::Dynamic if !block.labels.is_empty() => block.labels[0].clone(),
        _ => String::new(),
    }
}

/// Visit every indexable block at any depth, outermost first.
pub fn walk_indexable<'a>(body: &'a Body, visit: &mut dyn FnMut(&'a Block, BlockKind)) {
    for block in &body.blocks {
        if let Some(kind) = BlockKind::from_keyword(&block.ident) {
            visit(block, kind);
        }
        walk_indexable(&block.body, visit);
    }
}

/// Block index rows for one file.
pub fn index_blocks(module_id: i64, file_path: &str, body: &Body) -> Vec<BlockRecord> {
    let mut records = Vec::new();
    walk_indexable(body, &mut |block, kind| {
        records.push(BlockRecord {
            id: 0,
            module_id,
            file_path: file_path.to_string(),
            block_type: kind,
            type_label: type_label(block, kind),
            start_byte: block.span.start,
            end_byte: block.span.end,
            attr_paths: collect_attr_paths(&block.body, "").join("\n"),
        });
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hcl::parse_file;

    const SRC: &str = r#"resource "azurerm_storage_account" "x" {
  name = "sa"
  tags = { a = 1 }

  network_rules {
    default_action = "Deny"
  }

  dynamic "blob_properties" {
    for_each = var.blob
    content {
      versioning_enabled = true
    }
  }

  lifecycle {
    ignore_changes = [tags]
  }
}
"#;

    #[test]
    fn test_collect_attr_paths() {
        let body = parse_file("main.tf", SRC).unwrap();
        let paths = collect_attr_paths(&body.blocks[0].body, "");
        assert_eq!(
            paths,
            vec![
                "name",
                "tags",
                "network_rules",
                "network_rules.default_action",
                "dynamic",
                "dynamic.for_each",
                "dynamic.content",
                "dynamic.content.versioning_enabled",
                "lifecycle",
                "lifecycle.ignore_changes",
            ]
        );
    }

    #[test]
    fn test_index_blocks_recursive() {
        let body = parse_file("main.tf", SRC).unwrap();
        let blocks = index_blocks(9, "main.tf", &body);
        assert_eq!(blocks.len(), 3);

        assert_eq!(blocks[0].block_type, BlockKind::Resource);
        assert_eq!(blocks[0].type_label, "azurerm_storage_account");
        assert_eq!(blocks[0].start_byte, 0);
        assert_eq!(&SRC[blocks[0].end_byte - 1..blocks[0].end_byte], "}");
        assert!(blocks[0].has_path("lifecycle.ignore_changes"));

        assert_eq!(blocks[1].block_type, BlockKind::Dynamic);
        assert_eq!(blocks[1].type_label, "blob_properties");
        assert!(blocks[1].has_path("content.versioning_enabled"));

        assert_eq!(blocks[2].block_type, BlockKind::Lifecycle);
        assert_eq!(blocks[2].type_label, "");
        assert_eq!(
            &SRC[blocks[2].start_byte..blocks[2].end_byte],
            "lifecycle {\n    ignore_changes = [tags]\n  }"
        );
    }

    #[test]
    fn test_resource_with_single_label_has_empty_type() {
        let src = "resource \"odd\" {\n}\n";
        let body = parse_file("main.tf", src).unwrap();
        let blocks = index_blocks(1, "main.tf", &body);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].type_label, "");
    }
}
