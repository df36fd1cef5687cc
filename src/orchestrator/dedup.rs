//! Result aggregation: merge, deduplicate, rank.
//!
//! Records from successful outcomes are grouped by identity key. The first
//! record seen for a key is the representative; later records with the same
//! key fold into it. The merged list is sorted by confidence (stable, so
//! ties keep first-seen order) and truncated.

use std::collections::HashMap;

use crate::types::{Outcome, ResultRecord, clamp_confidence};

use super::identity::identity_key;

/// Merge `outcomes` into at most `max_results` deduplicated records.
///
/// Only successful outcomes contribute. Merging a record into its
/// representative:
///
/// - confidence becomes the maximum of the two
/// - metadata keys missing on the representative are copied in; existing
///   keys are kept
/// - the contributing provider is appended to `found_by_providers`
///
/// Confidence is clamped into `[0, 1]` (NaN becomes 0) whatever the
/// provider reported. Records without an identity key are dropped with a
/// warning.
pub fn aggregate(outcomes: &[Outcome], max_results: usize) -> Vec<ResultRecord> {
    let records = outcomes.iter().flat_map(|o| o.records().iter().cloned());
    let mut merged = merge_records(records);

    merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    merged.truncate(max_results);
    merged
}

/// Deduplicate records in first-seen order, without sorting.
pub fn merge_records(records: impl IntoIterator<Item = ResultRecord>) -> Vec<ResultRecord> {
    let mut merged: Vec<ResultRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(key) = identity_key(&record) else {
            tracing::warn!(
                provider = %record.source_provider,
                name = %record.name,
                "dropping record without identity key"
            );
            continue;
        };

        match index.get(&key) {
            Some(&i) => merge_into(&mut merged[i], record),
            None => {
                index.insert(key, merged.len());
                merged.push(into_representative(record));
            }
        }
    }

    merged
}

fn into_representative(mut record: ResultRecord) -> ResultRecord {
    record.confidence = clamp_confidence(record.confidence);
    record.found_by_providers = vec![record.source_provider.clone()];
    record
}

fn merge_into(representative: &mut ResultRecord, other: ResultRecord) {
    representative.confidence = representative
        .confidence
        .max(clamp_confidence(other.confidence));
    for (key, value) in other.metadata {
        representative.metadata.entry(key).or_insert(value);
    }
    if representative.website.is_none() {
        representative.website = other.website;
    }
    representative.found_by_providers.push(other.source_provider);
}
