//! Free references of an expression.
//!
//! A reference is a variable root followed by its static steps, e.g.
//! `var.settings["sku"]`. Names bound by `for` expressions and template
//! `for` directives are not free.

use hcl_edit::expr::{Expression, ObjectKey, TraversalOperator};
use hcl_edit::template::{Directive, Element, Template};

/// Index key kept in a rendered reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalKey {
    Attr(String),
    Number(String),
    Str(String),
}

/// A free reference: a root name plus static steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    pub root: String,
    pub steps: Vec<TraversalKey>,
}

impl Traversal {
    /// Render as `root.attr[0]["key"]`.
    pub fn render(&self) -> String {
        let mut out = self.root.clone();
        for step in &self.steps {
            match step {
                TraversalKey::Attr(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                TraversalKey::Number(n) => {
                    out.push('[');
                    out.push_str(n);
                    out.push(']');
                }
                TraversalKey::Str(s) => {
                    out.push_str("[\"");
                    out.push_str(&s.replace('\\', "\\\\").replace('"', "\\\""));
                    out.push_str("\"]");
                }
            }
        }
        out
    }
}

/// Free references in evaluation order.
pub fn free_references(expr: &Expression) -> Vec<Traversal> {
    let mut walker = Walker::default();
    walker.expr(expr);
    walker.out
}

#[derive(Default)]
struct Walker {
    bound: Vec<Vec<String>>,
    out: Vec<Traversal>,
}

impl Walker {
    fn is_bound(&self, name: &str) -> bool {
        self.bound.iter().flatten().any(|b| b == name)
    }

    fn push_root(&mut self, root: &str, steps: Vec<TraversalKey>) {
        if !self.is_bound(root) {
            self.out.push(Traversal {
                root: root.to_string(),
                steps,
            });
        }
    }

    fn expr(&mut self, expr: &Expression) {
        match expr {
            Expression::Variable(name) => self.push_root(name.as_str(), Vec::new()),
            Expression::Traversal(traversal) => {
                let mut consumed = 0;
                if let Expression::Variable(root) = &traversal.expr {
                    let mut steps = Vec::new();
                    for op in traversal.operators.iter() {
                        match static_key(op) {
                            Some(key) => steps.push(key),
                            None => break,
                        }
                        consumed += 1;
                    }
                    self.push_root(root.as_str(), steps);
                } else {
                    self.expr(&traversal.expr);
                }
                for op in traversal.operators.iter().skip(consumed) {
                    let op: &TraversalOperator = op;
                    if let TraversalOperator::Index(index) = op {
                        self.expr(index);
                    }
                }
            }
            Expression::Array(array) => {
                for item in array.iter() {
                    self.expr(item);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object.iter() {
                    // Bare identifier keys are literal names.
                    match key {
                        ObjectKey::Ident(_) | ObjectKey::Expression(Expression::Variable(_)) => {}
                        ObjectKey::Expression(key) => self.expr(key),
                    }
                    self.expr(value.expr());
                }
            }
            Expression::StringTemplate(template) => {
                for element in template.iter() {
                    self.element(element);
                }
            }
            Expression::HeredocTemplate(heredoc) => self.template(&heredoc.template),
            Expression::Parenthesis(inner) => self.expr(inner.inner()),
            Expression::Conditional(cond) => {
                self.expr(&cond.cond_expr);
                self.expr(&cond.true_expr);
                self.expr(&cond.false_expr);
            }
            Expression::FuncCall(call) => {
                for arg in call.args.iter() {
                    self.expr(arg);
                }
            }
            Expression::UnaryOp(op) => self.expr(&op.expr),
            Expression::BinaryOp(op) => {
                self.expr(&op.lhs_expr);
                self.expr(&op.rhs_expr);
            }
            Expression::ForExpr(for_expr) => {
                let intro = &for_expr.intro;
                self.expr(&intro.collection_expr);
                let mut scope = vec![intro.value_var.as_str().to_string()];
                if let Some(key_var) = &intro.key_var {
                    scope.push(key_var.as_str().to_string());
                }
                self.bound.push(scope);
                if let Some(key_expr) = &for_expr.key_expr {
                    self.expr(key_expr);
                }
                self.expr(&for_expr.value_expr);
                if let Some(cond) = &for_expr.cond {
                    self.expr(&cond.expr);
                }
                self.bound.pop();
            }
            _ => {}
        }
    }

    fn template(&mut self, template: &Template) {
        for element in template.iter() {
            self.element(element);
        }
    }

    fn element(&mut self, element: &Element) {
        match element {
            Element::Literal(_) => {}
            Element::Interpolation(interp) => self.expr(&interp.expr),
            Element::Directive(directive) => self.directive(directive),
        }
    }

    fn directive(&mut self, directive: &Directive) {
        match directive {
            Directive::If(if_directive) => {
                self.expr(&if_directive.if_expr.cond_expr);
                self.template(&if_directive.if_expr.template);
                if let Some(else_expr) = &if_directive.else_expr {
                    self.template(&else_expr.template);
                }
            }
            Directive::For(for_directive) => {
                let intro = &for_directive.for_expr;
                self.expr(&intro.collection_expr);
                let mut scope = vec![intro.value_var.as_str().to_string()];
                if let Some(key_var) = &intro.key_var {
                    scope.push(key_var.as_str().to_string());
                }
                self.bound.push(scope);
                self.template(&intro.template);
                self.bound.pop();
            }
        }
    }
}

/// Step kept in a rendered reference; dynamic indexes and splats end it.
fn static_key(op: &TraversalOperator) -> Option<TraversalKey> {
    match op {
        TraversalOperator::GetAttr(name) => Some(TraversalKey::Attr(name.as_str().to_string())),
        TraversalOperator::LegacyIndex(index) => {
            let index: &u64 = index;
            Some(TraversalKey::Number(index.to_string()))
        }
        TraversalOperator::Index(Expression::Number(n)) => {
            n.as_u64().map(|v| TraversalKey::Number(v.to_string()))
        }
        TraversalOperator::Index(Expression::String(s)) => {
            Some(TraversalKey::Str(s.as_str().to_string()))
        }
        _ => None,
    }
}
