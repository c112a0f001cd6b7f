//! Placeholder scanning and parsing.
//!
//! Two grammars share the `{{ }}` brackets:
//! - secret references `{{name:namespace:key}}`
//! - query references `{{jq <expr>}}`
//!
//! Matching is purely syntactic; nothing here touches a store.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Candidate secret placeholders: anything bracketed without braces or whitespace.
/// Candidates are parsed afterwards, so `{{name:key}}` is found but fails to parse.
static SECRET_CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}\s]+\}\}").unwrap());

static SECRET_PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{\{([^{}:\s]+):([^{}:\s]+):([^{}:\s]+)\}\}$").unwrap()
});

/// Candidate query placeholders, looser than the grammar so that
/// `{{jq}}` and `{{ jq .a }}` are found and then rejected by the parser.
static QUERY_CANDIDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*jq(?:\s[^{}]*)?\}\}").unwrap());

static QUERY_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{jq\s+([^{}]*\S)\s*\}\}$").unwrap());

/// A parsed `{{name:namespace:key}}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub key: &'a str,
}

/// Canonical placeholder text for a secret key.
pub fn secret_placeholder(name: &str, namespace: &str, key: &str) -> String {
    format!("{{{{{}:{}:{}}}}}", name, namespace, key)
}

/// All secret-placeholder candidates in encounter order, duplicates kept.
pub fn find_secret_placeholders(text: &str) -> Vec<&str> {
    SECRET_CANDIDATE_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

/// All query-placeholder candidates in encounter order, duplicates kept.
pub fn find_query_placeholders(text: &str) -> Vec<&str> {
    QUERY_CANDIDATE_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

/// Byte ranges of the well-formed secret placeholders in `text`.
pub fn secret_placeholder_spans(text: &str) -> Vec<Range<usize>> {
    SECRET_CANDIDATE_RE
        .find_iter(text)
        .filter(|m| parse_secret_placeholder(m.as_str()).is_some())
        .map(|m| m.range())
        .collect()
}

/// Drop exact-string duplicates, keeping first-occurrence order.
pub fn dedupe<'a>(found: Vec<&'a str>) -> Vec<&'a str> {
    let mut seen = std::collections::HashSet::new();
    found.into_iter().filter(|p| seen.insert(*p)).collect()
}

/// Split `{{name:namespace:key}}`. `None` on any other shape.
pub fn parse_secret_placeholder(raw: &str) -> Option<SecretRef<'_>> {
    let caps = SECRET_PLACEHOLDER_RE.captures(raw)?;
    Some(SecretRef {
        name: caps.get(1)?.as_str(),
        namespace: caps.get(2)?.as_str(),
        key: caps.get(3)?.as_str(),
    })
}

/// Extract the trimmed expression from `{{jq <expr>}}`.
pub fn parse_query_placeholder(raw: &str) -> Option<&str> {
    let caps = QUERY_PLACEHOLDER_RE.captures(raw)?;
    let expr = caps.get(1)?.as_str().trim();
    if expr.is_empty() {
        return None;
    }
    Some(expr)
}
