//! Derived topic tags and weighted short names for modules.

use crate::models::WeightedTerm;
use std::collections::HashMap;

pub const DERIVED_SOURCE: &str = "derived";

const NAME_STOPLIST: &[&str] = &["terraform", "azure", "modules"];

fn into_sorted_terms(weights: HashMap<String, i64>) -> Vec<WeightedTerm> {
    let mut terms: Vec<WeightedTerm> = weights
        .into_iter()
        .map(|(value, weight)| WeightedTerm::new(value, weight, DERIVED_SOURCE))
        .collect();
    terms.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.value.cmp(&b.value)));
    terms
}

/// Tags from resource type segments (weight 2 each) and module name tokens
/// (weight 1 each); repeated tokens accumulate.
pub fn derive_tags<'a>(
    module_name: &str,
    resource_types: impl IntoIterator<Item = &'a str>,
) -> Vec<WeightedTerm> {
    let mut weights: HashMap<String, i64> = HashMap::new();

    for resource_type in resource_types {
        for part in resource_type.split('_').skip(1) {
            if part.len() > 3 {
                *weights.entry(part.to_lowercase()).or_default() += 2;
            }
        }
    }

    let name = module_name
        .replace("terraform-", "")
        .replace("azure-", "")
        .replace("//", "-")
        .to_lowercase();
    for token in name.split('-').map(str::trim) {
        if token.is_empty() || NAME_STOPLIST.contains(&token) || token.len() <= 3 {
            continue;
        }
        *weights.entry(token.to_string()).or_default() += 1;
    }

    into_sorted_terms(weights)
}

/// Name tokens after stripping the module prefix.
pub fn name_tokens(module_name: &str) -> Vec<String> {
    let mut name = module_name;
    for prefix in ["terraform-azure-", "terraform-", "azure-"] {
        name = name.strip_prefix(prefix).unwrap_or(name);
    }
    name.replace("//modules/", "-")
        .split('-')
        .map(str::trim)
        .filter(|t| !t.is_empty() && !NAME_STOPLIST.contains(t))
        .map(str::to_string)
        .collect()
}

/// Aliases from name tokens and tags; each alias keeps its highest weight.
pub fn derive_aliases(module_name: &str, tags: &[WeightedTerm]) -> Vec<WeightedTerm> {
    let tokens = name_tokens(module_name);
    let mut weights: HashMap<String, i64> = HashMap::new();
    let mut add = |alias: &str, weight: i64| {
        let alias = alias.to_lowercase();
        if alias.chars().count() < 2 {
            return;
        }
        let entry = weights.entry(alias).or_insert(weight);
        if *entry < weight {
            *entry = weight;
        }
    };

    add(&tokens.join("-"), 3);
    if let Some(first) = tokens.first() {
        add(first, 3);
    }
    if tokens.len() > 1 {
        if let Some(last) = tokens.last() {
            add(last, 2);
        }
    }
    for token in &tokens {
        add(token, 2);
    }
    if tokens.len() > 1 {
        let initialism: String = tokens.iter().filter_map(|t| t.chars().next()).collect();
        add(&initialism, 1);
    }
    for tag in tags {
        add(&tag.value, 1);
    }

    into_sorted_terms(weights)
}
