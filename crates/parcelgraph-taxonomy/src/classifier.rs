//! Use-code classification.
//!
//! Resolution order is fixed:
//!
//! 1. **code**: any embedded code candidate equal to an entry's code
//!    (parenthesized candidates first, then left to right),
//! 2. **exact**: normalized raw text equal to a normalized descriptor,
//! 3. **substring**: normalized raw text containing or contained by a
//!    normalized descriptor; the longest descriptor wins.
//!
//! A code hit always beats text similarity, even when another entry's
//! descriptor is a perfect textual match.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::taxonomy::{UseCodeEntry, UseCodeTaxonomy};

fn parenthesized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\s*([A-Za-z0-9]+(?:-[A-Za-z0-9]+)*)\s*\)").unwrap())
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*").unwrap())
}

fn leading_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[A-Za-z]{0,3}\d+[A-Za-z]?\s*[-:.]?\s+").unwrap())
}

/// Upper-case, collapse every non-alphanumeric run to one space, trim.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_uppercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Code candidates embedded in a raw value, upper-cased and deduplicated.
///
/// Parenthesized segments come first (`"Single Family (0100)"`), then every
/// alphanumeric token containing a digit, left to right (`"0100 SFR"`,
/// `"R1 Residential"`). A hyphenated token is tried whole before its parts
/// (`"R-1"`, then `"R"`, `"1"`).
pub fn extract_code_candidates(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: &str| {
        if !candidate.chars().any(|c| c.is_ascii_digit()) {
            return;
        }
        let upper = candidate.to_ascii_uppercase();
        if !out.contains(&upper) {
            out.push(upper);
        }
    };

    for caps in parenthesized_re().captures_iter(raw) {
        push(&caps[1]);
    }
    for m in token_re().find_iter(raw) {
        push(m.as_str());
        if m.as_str().contains('-') {
            for part in m.as_str().split('-') {
                push(part);
            }
        }
    }
    out
}

/// The textual forms of a raw value tried by the exact and substring steps:
/// the whole value, and the value with parenthesized segments and a leading
/// code token removed.
fn text_variants(raw: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(2);
    let full = normalize_label(raw);
    if !full.is_empty() {
        variants.push(full);
    }

    let without_parens = parenthesized_re().replace_all(raw, " ");
    let stripped = leading_code_re().replace(&without_parens, "");
    let text_only = normalize_label(&stripped);
    if !text_only.is_empty() && !variants.contains(&text_only) {
        variants.push(text_only);
    }
    variants
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Code,
    Exact,
    Substring,
}

/// A successful classification together with the rule that produced it.
#[derive(Debug, Clone)]
pub struct Classification<'a> {
    pub entry: &'a UseCodeEntry,
    pub matched_by: MatchKind,
    /// The code or normalized descriptor that matched.
    pub matched: String,
}

/// Pure classifier over a loaded taxonomy.
#[derive(Debug, Clone, Copy)]
pub struct UseCodeClassifier<'t> {
    taxonomy: &'t UseCodeTaxonomy,
}

impl<'t> UseCodeClassifier<'t> {
    pub fn new(taxonomy: &'t UseCodeTaxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &'t UseCodeTaxonomy {
        self.taxonomy
    }

    /// Resolve a raw scraped value; `None` means no rule matched.
    pub fn classify(&self, raw: &str) -> Option<&'t UseCodeEntry> {
        self.classify_detailed(raw).map(|c| c.entry)
    }

    pub fn classify_detailed(&self, raw: &str) -> Option<Classification<'t>> {
        if raw.trim().is_empty() {
            return None;
        }

        for candidate in extract_code_candidates(raw) {
            if let Some(entry) = self.taxonomy.by_code(&candidate) {
                return Some(Classification {
                    entry,
                    matched_by: MatchKind::Code,
                    matched: candidate,
                });
            }
        }

        let variants = text_variants(raw);

        for variant in &variants {
            if let Some(entry) = self.taxonomy.by_normalized_descriptor(variant) {
                return Some(Classification {
                    entry,
                    matched_by: MatchKind::Exact,
                    matched: variant.clone(),
                });
            }
        }

        let mut best: Option<(usize, &str)> = None;
        for descriptor in self.taxonomy.indexed_descriptors() {
            let hit = variants.iter().any(|v| {
                v.contains(descriptor.normalized.as_str()) || descriptor.normalized.contains(v.as_str())
            });
            if !hit {
                continue;
            }
            // strictly longer only, so ties keep table order
            let longer = best.map_or(true, |(_, current)| descriptor.normalized.len() > current.len());
            if longer {
                best = Some((descriptor.entry, descriptor.normalized.as_str()));
            }
        }

        best.map(|(index, normalized)| Classification {
            entry: self.taxonomy.entry_at(index),
            matched_by: MatchKind::Substring,
            matched: normalized.to_string(),
        })
    }
}
