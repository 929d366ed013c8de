//! HCL native syntax parsing.
//!
//! Files are parsed with `hcl-edit` and flattened into the structural view
//! indexing needs: bodies, blocks, attributes, byte spans and free
//! references. Nothing is evaluated.
//!
//! The parser recurses once per nesting level, so input is screened for
//! nesting depth first; a stack overflow would abort the process rather than
//! fail the one file.

pub mod references;
pub mod syntax;

pub use references::{free_references, Traversal, TraversalKey};
pub use syntax::{Attribute, Block, Body, Span};

use crate::error::{Result, TfmodError};
use syntax::Converter;

/// Deepest bracket, interpolation or prefix-operator nesting accepted.
pub const MAX_NESTING: usize = 64;

/// Parse a file's content into its top-level body.
///
/// Spans index into `content`, including any leading byte order mark.
pub fn parse_file(path: &str, content: &str) -> Result<Body> {
    let source = content.strip_prefix('\u{feff}').unwrap_or(content);
    let base = content.len() - source.len();

    if let Some(offset) = find_excess_nesting(source, MAX_NESTING) {
        return Err(TfmodError::Parse {
            path: path.to_string(),
            message: format!(
                "nesting deeper than {} levels at byte {}",
                MAX_NESTING,
                offset + base
            ),
        });
    }

    let body = hcl_edit::parser::parse_body(source).map_err(|e| TfmodError::Parse {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    Ok(Converter::new(base).body(&body))
}

enum Frame {
    Bracket,
    Interpolation,
    Quoted,
    Heredoc(String),
}

impl Frame {
    fn counts(&self) -> bool {
        matches!(self, Frame::Bracket | Frame::Interpolation)
    }
}

/// Byte offset where nesting first exceeds `limit`, if it does.
///
/// Counts brackets and template interpolations outside comments and string
/// text, plus runs of prefix operators. Unbalanced input is tolerated; the
/// parser reports it.
fn find_excess_nesting(src: &str, limit: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut stack: Vec<Frame> = Vec::new();
    let mut depth = 0usize;
    let mut prefix_run = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        match stack.last() {
            Some(Frame::Quoted) => {
                match (b, next) {
                    (b'\\', _) => i += 1,
                    (b'"', _) => {
                        stack.pop();
                    }
                    (b'$' | b'%', Some(n)) if n == b && bytes.get(i + 2) == Some(&b'{') => i += 2,
                    (b'$' | b'%', Some(b'{')) => {
                        stack.push(Frame::Interpolation);
                        depth += 1;
                        i += 1;
                    }
                    _ => {}
                }
                i += 1;
                continue;
            }
            Some(Frame::Heredoc(marker)) => {
                let at_line_start = i == 0 || bytes[i - 1] == b'\n';
                if at_line_start {
                    let line_end = src[i..].find('\n').map_or(src.len(), |p| i + p);
                    if src[i..line_end].trim() == marker {
                        stack.pop();
                        i = line_end;
                        continue;
                    }
                }
                match (b, next) {
                    (b'$' | b'%', Some(n)) if n == b && bytes.get(i + 2) == Some(&b'{') => i += 2,
                    (b'$' | b'%', Some(b'{')) => {
                        stack.push(Frame::Interpolation);
                        depth += 1;
                        i += 1;
                    }
                    _ => {}
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        match (b, next) {
            (b'#', _) | (b'/', Some(b'/')) => {
                i = src[i..].find('\n').map_or(src.len(), |p| i + p);
                continue;
            }
            (b'/', Some(b'*')) => {
                i = src[i + 2..].find("*/").map_or(src.len(), |p| i + 2 + p + 2);
                continue;
            }
            (b'"', _) => stack.push(Frame::Quoted),
            (b'<', Some(b'<')) => {
                if let Some((marker, body_start)) = heredoc_start(src, i) {
                    stack.push(Frame::Heredoc(marker));
                    prefix_run = 0;
                    i = body_start;
                    continue;
                }
            }
            (b'(' | b'[' | b'{', _) => {
                stack.push(Frame::Bracket);
                depth += 1;
            }
            (b')' | b']', _) => {
                if matches!(stack.last(), Some(Frame::Bracket)) {
                    stack.pop();
                    depth -= 1;
                }
            }
            (b'}', _) => {
                if matches!(stack.last(), Some(Frame::Bracket | Frame::Interpolation)) {
                    stack.pop();
                    depth -= 1;
                }
            }
            _ => {}
        }

        match b {
            b'!' | b'-' => prefix_run += 1,
            b' ' | b'\t' | b'\r' | b'\n' => {}
            _ => prefix_run = 0,
        }

        if depth > limit || prefix_run > limit {
            return Some(i);
        }
        debug_assert_eq!(depth, stack.iter().filter(|f| f.counts()).count());
        i += 1;
    }
    None
}

/// Marker and body offset of a heredoc opening at `i` (`<<EOT` or `<<-EOT`).
fn heredoc_start(src: &str, i: usize) -> Option<(String, usize)> {
    let rest = &src[i + 2..];
    let rest_trimmed = rest.strip_prefix('-').unwrap_or(rest);
    let marker_len = rest_trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(rest_trimmed.len());
    if marker_len == 0 {
        return None;
    }
    let marker = &rest_trimmed[..marker_len];
    let after = &rest_trimmed[marker_len..];
    let newline = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))?;
    Some((marker.to_string(), src.len() - newline.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_error_carries_path() {
        let err = parse_file("main.tf", "resource {").unwrap_err();
        match err {
            TfmodError::Parse { path, .. } => assert_eq!(path, "main.tf"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_empty_file() {
        let body = parse_file("empty.tf", "\n# nothing here\n").unwrap();
        assert!(body.blocks.is_empty());
        assert!(body.attributes.is_empty());
    }

    #[test]
    fn test_provider_defined_function() {
        let src = "locals {\n  x = provider::time::rfc3339_parse(var.timestamp)\n}\n";
        let body = parse_file("main.tf", src).unwrap();
        let attr = body.blocks[0].body.attribute("x").unwrap();
        assert_eq!(attr.references[0].render(), "var.timestamp");
        assert_eq!(
            attr.span.text(src),
            "provider::time::rfc3339_parse(var.timestamp)"
        );
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        for (open, close) in [("[", "]"), ("(", ")"), ("{ a = ", "}")] {
            let src = format!(
                "locals {{\n  x = {}1{}\n}}\n",
                open.repeat(20_000),
                close.repeat(20_000)
            );
            match parse_file("deep.tf", &src) {
                Err(TfmodError::Parse { message, .. }) => {
                    assert!(message.contains("nesting deeper than"), "{}", message)
                }
                other => panic!("expected a parse error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_deep_template_and_prefix_nesting_rejected() {
        let interpolations = format!(
            "locals {{\n  x = {}1{}\n}}\n",
            "\"${".repeat(5_000),
            "}\"".repeat(5_000)
        );
        assert!(parse_file("deep.tf", &interpolations).is_err());

        let heredoc = format!(
            "locals {{\n  x = <<EOT\n${{{}1{}}}\nEOT\n}}\n",
            "[".repeat(5_000),
            "]".repeat(5_000)
        );
        assert!(parse_file("deep.tf", &heredoc).is_err());

        let negations = format!("locals {{\n  x = {}true\n}}\n", "!".repeat(20_000));
        assert!(parse_file("deep.tf", &negations).is_err());
    }

    #[test]
    fn test_text_brackets_do_not_count() {
        let mut src = String::new();
        for _ in 0..100 {
            src.push_str("# {\n// [\n");
        }
        src.push_str(&format!(
            "locals {{\n  pattern = \"{}\"\n  policy = <<-EOT\n    {}\n  EOT\n}}\n",
            "[".repeat(100),
            "{".repeat(100)
        ));
        let body = parse_file("main.tf", &src).unwrap();
        assert_eq!(body.blocks[0].body.attributes.len(), 2);
    }

    #[test]
    fn test_byte_order_mark_offsets() {
        let src = "\u{feff}variable \"name\" {\n  default = \"x\"\n}\n";
        let body = parse_file("variables.tf", src).unwrap();
        let block = &body.blocks[0];
        assert_eq!(block.span.text(src).lines().next(), Some("variable \"name\" {"));
        let attr = block.body.attribute("default").unwrap();
        assert_eq!(attr.span.text(src), "\"x\"");
        assert_eq!(attr.literal_string.as_deref(), Some("x"));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let src = format!("locals {{\n  x = {}1{}\n}}\n", "[".repeat(16), "]".repeat(16));
        assert!(parse_file("main.tf", &src).is_ok());
    }
}
