//! Global deduplication across grid cells.
//!
//! A single box can be covered by several cells, and a query covering can
//! overlap several of those cells. Dedup ensures each id appears at most once
//! in the candidate list.

use crate::cell_index::CellEntry;
use rustc_hash::FxHashSet;

/// Deduplicate entries by id, keeping the first occurrence.
pub fn dedup_keep_first(entries: impl IntoIterator<Item = CellEntry>) -> Vec<CellEntry> {
    let mut seen: FxHashSet<u64> = FxHashSet::default();
    let mut result = Vec::new();

    for entry in entries {
        if seen.insert(entry.id) {
            result.push(entry);
        }
    }

    result
}
