use crate::{ChangeDetail, TrackedField, Version};

/// Fields compared between two versions, in reporting order.
pub const TRACKED_FIELDS: [TrackedField; 3] = [
    TrackedField::Name,
    TrackedField::Description,
    TrackedField::Status,
];

/// Field-level diff of two snapshots of the same ticket.
///
/// Details follow `TRACKED_FIELDS` order; equal fields are omitted, so an
/// empty result means there is no actionable change.
pub fn compare_versions(older: &Version, newer: &Version) -> Vec<ChangeDetail> {
    TRACKED_FIELDS
        .iter()
        .copied()
        .filter_map(|field| {
            let previous = older.field(field);
            let current = newer.field(field);
            (previous != current).then(|| ChangeDetail::modified(field, previous, current))
        })
        .collect()
}

/// `(older, newer)` from a most-recent-first history, if it has two entries.
pub fn latest_pair(versions: &[Version]) -> Option<(&Version, &Version)> {
    match versions {
        [newer, older, ..] => Some((older, newer)),
        _ => None,
    }
}
