//! Free-text relationship prompts.
//!
//! A heuristic splitter, not a grammar: the rightmost module-like window of
//! the prompt names the module and the words around it become the query.

use super::QueryEngine;
use crate::models::Module;
use crate::{Result, TfmodError};
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

static LIMIT_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:top|first|limit)\s+(\d{1,3})\b").unwrap());

const MAX_WINDOW: usize = 3;

const STOPWORDS: &[&str] = &[
    "show", "me", "please", "the", "a", "an", "module", "modules", "relationship",
    "relationships", "in", "within", "inside", "for", "of", "on", "about", "across", "with",
    "to", "and", "all", "any", "find", "list", "see", "need", "want", "how", "do", "does",
    "display", "get", "showing", "tell", "explain", "look", "into", "where", "which", "top",
    "first", "limit", "results", "matches",
];

/// Module, query and limit read from a prompt.
#[derive(Debug, Clone)]
pub struct PromptInterpretation {
    pub module: Option<Module>,
    pub query: String,
    /// 0 when the prompt names no limit.
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    original: String,
    lower: String,
}

/// Remove every "top/first/limit N" phrase; the first positive N wins.
pub fn extract_limit(prompt: &str) -> (usize, String) {
    let limit = LIMIT_PHRASE
        .captures_iter(prompt)
        .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .find(|n| *n > 0)
        .unwrap_or(0);
    let cleaned = LIMIT_PHRASE.replace_all(prompt, "").into_owned();
    (limit, cleaned)
}

fn tokenize(input: &str) -> Vec<Token> {
    input
        .split(|c: char| !(c.is_alphanumeric() || c == '/' || c == '_' || c == '-'))
        .filter(|part| !part.is_empty())
        .map(|part| Token {
            original: part.to_string(),
            lower: part.to_lowercase(),
        })
        .collect()
}

/// Space, hyphen, underscore and concatenated joins of a window.
fn candidate_forms(window: &[Token]) -> Vec<String> {
    let parts: Vec<&str> = window.iter().map(|t| t.lower.as_str()).collect();
    let mut forms = vec![parts.join(" ")];
    if parts.len() > 1 {
        forms.push(parts.join("-"));
        forms.push(parts.join("_"));
    }
    forms.push(parts.concat());

    let mut seen = HashSet::new();
    forms
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty() && seen.insert(f.clone()))
        .collect()
}

fn derive_query(tokens: &[Token], window: Option<&Range<usize>>) -> String {
    let mut focus: Vec<&Token> = Vec::new();
    if let Some(window) = window {
        if window.start > 0 {
            focus.extend(&tokens[..window.start]);
        } else if window.end < tokens.len() {
            focus.extend(&tokens[window.end..]);
        }
    }
    if focus.is_empty() {
        focus = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| !window.is_some_and(|w| w.contains(i)))
            .map(|(_, t)| t)
            .collect();
    }

    let mut words: Vec<&str> = focus
        .iter()
        .filter(|t| !STOPWORDS.contains(&t.lower.as_str()))
        .filter(|t| t.lower.parse::<i64>().is_err())
        .map(|t| t.original.as_str())
        .collect();
    if words.is_empty() {
        words = focus.iter().map(|t| t.original.as_str()).collect();
    }
    words.join(" ").trim().to_string()
}

fn prompt_error(message: &str) -> TfmodError {
    TfmodError::invalid_input("prompt", message)
}

impl QueryEngine {
    /// Read a module, a query and a limit out of a free-text prompt.
    pub fn interpret_prompt(&self, prompt: &str) -> Result<PromptInterpretation> {
        let original = prompt.trim();
        if original.is_empty() {
            return Err(prompt_error("prompt is empty"));
        }

        let (limit, cleaned) = extract_limit(original);
        let tokens = tokenize(&cleaned);
        if tokens.is_empty() {
            return Err(prompt_error("could not find useful words"));
        }

        let found = self.find_module_window(&tokens)?;
        let window = found.as_ref().map(|(_, w)| w.clone());
        let query = derive_query(&tokens, window.as_ref());
        if query.is_empty() {
            return Err(prompt_error("could not identify what to search for"));
        }

        let module = found.map(|(m, _)| m);
        debug!(
            "Prompt '{}' read as module={:?} query='{}' limit={}",
            original,
            module.as_ref().map(|m| m.name.as_str()),
            query,
            limit
        );
        Ok(PromptInterpretation {
            module,
            query,
            limit,
        })
    }

    /// Largest, rightmost token window that resolves to a module.
    fn find_module_window(&self, tokens: &[Token]) -> Result<Option<(Module, Range<usize>)>> {
        let mut tried = HashSet::new();
        for size in (1..=MAX_WINDOW.min(tokens.len())).rev() {
            for start in (0..=tokens.len() - size).rev() {
                let range = start..start + size;
                for form in candidate_forms(&tokens[range.clone()]) {
                    if !tried.insert(form.clone()) {
                        continue;
                    }
                    match self.resolve(&form) {
                        Ok(module) => return Ok(Some((module, range))),
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(None)
    }
}
