use std::cmp::Reverse;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::Version;

/// Comparable form of a version timestamp.
///
/// Parsed instants always sort after opaque strings; opaque strings compare
/// lexicographically among themselves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimestampKey {
    Opaque(String),
    Instant(DateTime<Utc>),
}

impl TimestampKey {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::Instant(parsed.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
            return Self::Instant(naive.and_utc());
        }
        Self::Opaque(trimmed.to_owned())
    }
}

/// Orders a history most recent first.
///
/// Two versions that both carry a timestamp compare by timestamp, newest
/// first. Any pair where one side lacks a timestamp compares by id, highest
/// first. That pairwise rule is not transitive on mixed histories, so the
/// order is built in two passes: every version is placed by id, then the
/// timestamped versions are reordered by timestamp among the positions they
/// already occupy. Remaining ties keep payload order through
/// `Version::sequence`.
pub fn sort_versions_by_recency(versions: &mut [Version]) {
    versions.sort_by_key(|version| (Reverse(version.id), version.sequence));

    let slots: Vec<usize> = versions
        .iter()
        .enumerate()
        .filter(|(_, version)| version.timestamp.is_some())
        .map(|(slot, _)| slot)
        .collect();
    if slots.len() < 2 {
        return;
    }

    let mut stamped: Vec<Version> = slots
        .iter()
        .map(|&slot| std::mem::take(&mut versions[slot]))
        .collect();
    stamped.sort_by_cached_key(|version| {
        (
            Reverse(version.timestamp.as_deref().map(TimestampKey::parse)),
            Reverse(version.id),
            version.sequence,
        )
    });

    for (slot, version) in slots.into_iter().zip(stamped) {
        versions[slot] = version;
    }
}
