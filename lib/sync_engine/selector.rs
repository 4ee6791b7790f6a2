use std::collections::BTreeSet;

use crate::pak_index::{DirectoryIndex, SegmentId};

/// Resolves path-prefix filters against the directory index to the set of
/// archive segments that must be fetched.
///
/// Prefix matching stops at the first matching filter per path; filters are
/// not required to be disjoint. The result is sorted ascending and
/// deduplicated regardless of index iteration order. An empty filter list
/// selects nothing, never "all segments".
pub fn select_segments(index: &DirectoryIndex, filters: &[String]) -> BTreeSet<SegmentId> {
    let mut required = BTreeSet::new();
    if filters.is_empty() {
        return required;
    }

    for entry in index.entries() {
        if filters.iter().any(|filter| entry.path.starts_with(filter)) {
            required.insert(entry.segment);
        }
    }

    required
}
