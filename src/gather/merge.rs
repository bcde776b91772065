//! Merging per-gatherer facts into one table.

use crate::models::{Facts, GatherResult};

/// Fold gatherer results into a single fact table.
///
/// Results are applied in declaration order; on a key collision the
/// gatherer declared later wins, no matter which process finished first.
/// Failed gatherers contribute nothing.
pub fn merge(results: &[GatherResult]) -> Facts {
    let mut ordered: Vec<&GatherResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.index);

    let mut merged = Facts::new();
    for result in ordered {
        for (key, value) in &result.facts {
            merged.insert(key.clone(), value.clone());
        }
    }

    merged
}
