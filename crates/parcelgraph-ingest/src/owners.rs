//! Owner deduplication and owner → sale linking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const CURRENT_OWNERS_KEY: &str = "current";

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Owner mentions
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonOwner {
    #[serde(default, alias = "first", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, alias = "middle", skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(default, alias = "last", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, alias = "prefix", skip_serializing_if = "Option::is_none")]
    pub prefix_name: Option<String>,
    #[serde(default, alias = "suffix", skip_serializing_if = "Option::is_none")]
    pub suffix_name: Option<String>,
}

impl PersonOwner {
    /// First, middle, last and suffix, space-joined.
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name, &self.suffix_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyOwner {
    pub name: String,
}

/// One owner as mentioned in the owner history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OwnerMention {
    Person(PersonOwner),
    Company(CompanyOwner),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Person,
    Company,
}

impl OwnerKind {
    /// Stem prefix of this kind's entity files.
    pub fn file_prefix(self) -> &'static str {
        match self {
            OwnerKind::Person => "person",
            OwnerKind::Company => "company",
        }
    }
}

/// Global identity of an owner: `(kind, dedup_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerKey {
    pub kind: OwnerKind,
    pub dedup_key: String,
}

impl OwnerMention {
    pub fn kind(&self) -> OwnerKind {
        match self {
            OwnerMention::Person(_) => OwnerKind::Person,
            OwnerMention::Company(_) => OwnerKind::Company,
        }
    }

    /// `None` when the mention carries no usable name.
    pub fn key(&self) -> Option<OwnerKey> {
        let dedup_key = match self {
            OwnerMention::Person(p) => person_dedup_key(&p.full_name()),
            OwnerMention::Company(c) => company_dedup_key(&c.name),
        };
        if dedup_key.is_empty() {
            return None;
        }
        Some(OwnerKey {
            kind: self.kind(),
            dedup_key,
        })
    }

    /// Parse one loosely typed mention; malformed or nameless mentions yield `None`.
    pub fn from_json(value: &Value) -> Option<OwnerMention> {
        let mention: OwnerMention = match serde_json::from_value(value.clone()) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed owner mention");
                return None;
            }
        };
        if mention.key().is_none() {
            tracing::debug!(kind = ?mention.kind(), "skipping owner mention without a name");
            return None;
        }
        Some(mention)
    }
}

/// Lower-cased, whitespace-collapsed.
pub fn person_dedup_key(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lower-cased, punctuation dropped (except `&`), whitespace-collapsed.
pub fn company_dedup_key(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() || c == '&' {
            cleaned.extend(c.to_lowercase());
        } else if c != '.' && c != '\'' {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Owner history
// ============================================================================

/// Owners grouped by the date they took title, plus the current owners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerHistory {
    pub by_date: BTreeMap<NaiveDate, Vec<OwnerMention>>,
    pub current: Vec<OwnerMention>,
}

impl OwnerHistory {
    /// Parse `{"YYYY-MM-DD": [mention...], "current": [mention...]}`.
    ///
    /// Keys that are neither a date nor `current` are skipped, as are
    /// non-array buckets and malformed mentions.
    pub fn from_json(value: &Value) -> Self {
        let mut history = OwnerHistory::default();
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Null => return history,
            _ => {
                tracing::warn!("owner history is not an object; ignoring it");
                return history;
            }
        };

        for (key, bucket) in obj {
            let Value::Array(items) = bucket else {
                tracing::warn!(bucket = %key, "owner bucket is not an array; skipping");
                continue;
            };
            let mentions: Vec<OwnerMention> = items.iter().filter_map(OwnerMention::from_json).collect();

            if key.trim().eq_ignore_ascii_case(CURRENT_OWNERS_KEY) {
                history.current.extend(mentions);
                continue;
            }
            match NaiveDate::parse_from_str(key.trim(), DATE_FORMAT) {
                Ok(date) => history.by_date.entry(date).or_default().extend(mentions),
                Err(_) => tracing::warn!(bucket = %key, "owner bucket key is not a date; skipping"),
            }
        }
        history
    }

    /// Every mention in first-seen order: dated buckets ascending, then current.
    pub fn mentions(&self) -> impl Iterator<Item = &OwnerMention> {
        self.by_date.values().flatten().chain(self.current.iter())
    }
}

// ============================================================================
// Sales
// ============================================================================

/// The parts of a sale the linker needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleEvent {
    pub ordinal: u32,
    pub date: Option<NaiveDate>,
}

/// Parse an ISO date, tolerating a trailing time component.
pub fn parse_sale_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
}

/// Latest dated sale (first in list order among ties), else the first sale.
pub fn most_recent_sale(sales: &[SaleEvent]) -> Option<&SaleEvent> {
    let mut best: Option<&SaleEvent> = None;
    for sale in sales.iter().filter(|s| s.date.is_some()) {
        if best.map_or(true, |b| sale.date > b.date) {
            best = Some(sale);
        }
    }
    best.or_else(|| sales.first())
}

// ============================================================================
// Linker
// ============================================================================

/// A deduplicated owner with its assigned entity file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerEntity {
    pub key: OwnerKey,
    /// The first mention seen for this key.
    pub mention: OwnerMention,
    /// `person_<N>` / `company_<N>`, numbered per kind in first-seen order.
    pub file_stem: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRule {
    /// The owner's date bucket equals the sale date.
    DateMatch,
    /// The sale is the most recent one and the owner is a current owner.
    CurrentOwner,
}

/// Buyer edge from a sale to an owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyerLink {
    pub sale_ordinal: u32,
    /// Index into [`OwnerLinks::owners`].
    pub owner: usize,
    pub rule: LinkRule,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerLinks {
    pub owners: Vec<OwnerEntity>,
    pub buyers: Vec<BuyerLink>,
}

impl OwnerLinks {
    pub fn owner(&self, link: &BuyerLink) -> &OwnerEntity {
        &self.owners[link.owner]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OwnerTransactionLinker;

impl OwnerTransactionLinker {
    pub fn new() -> Self {
        Self
    }

    pub fn link(&self, history: &OwnerHistory, sales: &[SaleEvent]) -> OwnerLinks {
        let mut links = OwnerLinks::default();
        let mut index: HashMap<OwnerKey, usize> = HashMap::new();
        let mut per_kind: HashMap<OwnerKind, usize> = HashMap::new();

        for mention in history.mentions() {
            let Some(key) = mention.key() else { continue };
            if index.contains_key(&key) {
                continue;
            }
            let n = per_kind.entry(key.kind).or_insert(0);
            *n += 1;
            let file_stem = format!("{}_{}", key.kind.file_prefix(), n);
            index.insert(key.clone(), links.owners.len());
            links.owners.push(OwnerEntity {
                key,
                mention: mention.clone(),
                file_stem,
            });
        }

        let mut linked: HashSet<(u32, usize)> = HashSet::new();
        let mut push = |links: &mut OwnerLinks, sale: u32, owner: usize, rule: LinkRule| {
            if linked.insert((sale, owner)) {
                links.buyers.push(BuyerLink {
                    sale_ordinal: sale,
                    owner,
                    rule,
                });
            }
        };

        for sale in sales {
            let Some(date) = sale.date else { continue };
            let Some(bucket) = history.by_date.get(&date) else {
                continue;
            };
            for mention in bucket {
                if let Some(owner) = mention.key().and_then(|k| index.get(&k).copied()) {
                    push(&mut links, sale.ordinal, owner, LinkRule::DateMatch);
                }
            }
        }

        if let Some(latest) = most_recent_sale(sales) {
            for mention in &history.current {
                if let Some(owner) = mention.key().and_then(|k| index.get(&k).copied()) {
                    push(&mut links, latest.ordinal, owner, LinkRule::CurrentOwner);
                }
            }
        }

        tracing::debug!(
            owners = links.owners.len(),
            buyer_edges = links.buyers.len(),
            "linked owners to sales"
        );
        links
    }
}
