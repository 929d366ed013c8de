//! Structural view of a parsed HCL body.
//!
//! Built once from the `hcl-edit` tree: block and attribute names, byte
//! spans into the original file content, and each attribute's free
//! references. Nothing is evaluated.

use super::references::{free_references, Traversal};
use hcl_edit::expr::Expression;
use hcl_edit::structure::{self, BlockLabel, Structure};
use hcl_edit::template::Element;
use hcl_edit::Span as _;
use serde::Serialize;

/// Half-open byte range into the parsed source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Slice `src`, clamping out-of-range offsets.
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        let end = self.end.min(src.len());
        let start = self.start.min(end);
        src.get(start..end).unwrap_or("")
    }
}

/// Attributes and blocks of one body, each in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub attributes: Vec<Attribute>,
    pub blocks: Vec<Block>,
}

impl Body {
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub ident: String,
    pub labels: Vec<String>,
    pub body: Body,
    /// From the block type keyword through the closing brace.
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    /// Range of the value expression.
    pub span: Span,
    /// Value of a quoted string without interpolation.
    pub literal_string: Option<String>,
    pub literal_bool: Option<bool>,
    /// Free references in evaluation order.
    pub references: Vec<Traversal>,
}

/// Converts `hcl-edit` nodes, shifting spans by `base` bytes.
pub(super) struct Converter {
    base: usize,
}

impl Converter {
    pub(super) fn new(base: usize) -> Self {
        Self { base }
    }

    fn span(&self, range: Option<std::ops::Range<usize>>) -> Span {
        range
            .map(|r| Span::new(r.start + self.base, r.end + self.base))
            .unwrap_or_default()
    }

    pub(super) fn body(&self, body: &structure::Body) -> Body {
        let mut out = Body::default();
        for item in body.iter() {
            match item {
                Structure::Attribute(attr) => out.attributes.push(self.attribute(attr)),
                Structure::Block(block) => out.blocks.push(self.block(block)),
            }
        }
        out
    }

    fn block(&self, block: &structure::Block) -> Block {
        Block {
            ident: block.ident.as_str().to_string(),
            labels: block.labels.iter().map(label_text).collect(),
            body: self.body(&block.body),
            span: self.span(block.span()),
        }
    }

    fn attribute(&self, attr: &structure::Attribute) -> Attribute {
        Attribute {
            key: attr.key.as_str().to_string(),
            span: self.span(attr.value.span()),
            literal_string: literal_string(&attr.value),
            literal_bool: literal_bool(&attr.value),
            references: free_references(&attr.value),
        }
    }
}

fn label_text(label: &BlockLabel) -> String {
    match label {
        BlockLabel::Ident(ident) => ident.as_str().to_string(),
        BlockLabel::String(value) => value.as_str().to_string(),
    }
}

fn literal_string(expr: &Expression) -> Option<String> {
    match expr {
        Expression::String(value) => Some(value.as_str().to_string()),
        Expression::StringTemplate(template) => {
            let mut out = String::new();
            for element in template.iter() {
                match element {
                    Element::Literal(text) => out.push_str(text.as_str()),
                    _ => return None,
                }
            }
            Some(out)
        }
        Expression::Parenthesis(inner) => literal_string(inner.inner()),
        _ => None,
    }
}

fn literal_bool(expr: &Expression) -> Option<bool> {
    match expr {
        Expression::Bool(value) => {
            let value: &bool = value;
            Some(*value)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_text_clamps() {
        let src = "abcdef";
        assert_eq!(Span::new(1, 3).text(src), "bc");
        assert_eq!(Span::new(4, 100).text(src), "ef");
        assert_eq!(Span::new(10, 2).text(src), "");
    }
}
