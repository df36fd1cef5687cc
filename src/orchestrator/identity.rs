//! Identity keys for result deduplication.
//!
//! Two records describe the same entity when their normalized name and
//! normalized domain match exactly. There is no fuzzy matching.
//!
//! # Examples
//!
//! ```
//! use switchyard::orchestrator::identity::{normalize_domain, normalize_name};
//!
//! assert_eq!(normalize_name("  Stripe,  Inc. "), "stripe");
//! assert_eq!(normalize_domain("https://www.Stripe.com:443/about?x=1").as_deref(), Some("stripe.com"));
//! ```

use url::Url;

use crate::types::ResultRecord;

/// Trailing name tokens that denote a legal entity form and are ignored.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "ltd",
    "limited",
    "corp",
    "corporation",
    "co",
    "plc",
    "gmbh",
    "ag",
    "sa",
    "bv",
];

/// Metadata keys consulted for a domain when `website` is absent.
const DOMAIN_METADATA_KEYS: &[&str] = &["website", "url", "domain", "homepage"];

/// Normalize an entity name.
///
/// 1. Lowercase.
/// 2. Split on whitespace, which also collapses runs of it.
/// 3. Trim punctuation from both ends of every token; drop tokens left empty.
/// 4. Drop one trailing legal-entity suffix (`inc`, `llc`, `ltd`, ...) when
///    at least one other token remains.
pub fn normalize_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() > 1
        && tokens
            .last()
            .is_some_and(|last| LEGAL_SUFFIXES.contains(last))
    {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Extract a bare, lowercased host from a website, URL or domain string.
///
/// Scheme, port, path, query, fragment and a leading `www.` are removed.
/// Returns `None` when no host can be extracted.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = match Url::parse(raw) {
        Ok(url) if url.host_str().is_some() => url,
        // Bare domains such as "stripe.com/about" have no scheme.
        _ => Url::parse(&format!("https://{raw}")).ok()?,
    };

    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_owned())
    }
}

/// The domain of a record: its `website`, else the first string-valued
/// metadata entry under `website`, `url`, `domain` or `homepage` that
/// yields a host.
pub fn record_domain(record: &ResultRecord) -> Option<String> {
    if let Some(domain) = record.website.as_deref().and_then(normalize_domain) {
        return Some(domain);
    }
    DOMAIN_METADATA_KEYS
        .iter()
        .filter_map(|key| record.metadata.get(*key))
        .filter_map(|value| value.as_str())
        .find_map(normalize_domain)
}

/// Deduplication key for a record: `name|domain`, or the name alone when no
/// domain is available. `None` when neither name nor domain survives
/// normalization.
pub fn identity_key(record: &ResultRecord) -> Option<String> {
    let name = normalize_name(&record.name);
    match record_domain(record) {
        Some(domain) => Some(format!("{name}|{domain}")),
        None if name.is_empty() => None,
        None => Some(name),
    }
}
