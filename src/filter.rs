//! Live substring filter over the catalog.
//!
//! Matching runs against the rendered table cells rather than the typed
//! values, so `102` can hit a size, a CRC or part of a date alike.

use crate::catalog::ArchiveEntry;

/// Indices of the entries matching `query`, in listing order.
pub fn filter_indices(entries: &[ArchiveEntry], query: &str) -> Vec<usize> {
    if query.is_empty() {
        return (0..entries.len()).collect();
    }

    let query = query.to_lowercase();
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| matches(entry, &query))
        .map(|(index, _)| index)
        .collect()
}

/// Entries matching `query`, in listing order.
pub fn filter<'a>(entries: &'a [ArchiveEntry], query: &str) -> Vec<&'a ArchiveEntry> {
    filter_indices(entries, query)
        .into_iter()
        .map(|index| &entries[index])
        .collect()
}

/// `query` must already be lowercase.
fn matches(entry: &ArchiveEntry, query: &str) -> bool {
    entry
        .columns()
        .iter()
        .any(|cell| cell.to_lowercase().contains(query))
}
