use serde::{Deserialize, Serialize};

mod diff;
mod ordering;

pub use diff::{TRACKED_FIELDS, compare_versions, latest_pair};
pub use ordering::{TimestampKey, sort_versions_by_recency};

pub type TicketId = i64;
pub type ProjectId = i64;

/// Revision of the analysis/view-model schema exposed to UI callers.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Current state of a ticket as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub name: String,
    pub description: String,
    pub status: String,
    pub creator: String,
    pub project: String,
}

/// Immutable snapshot of a ticket at one point in its history.
///
/// `sequence` is never read from or written to the wire. The version store
/// assigns it at ingestion time (position in the fetched payload, offset by a
/// process-wide counter) and uses it as the final tiebreak when ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip)]
    pub sequence: u64,
}

impl Version {
    pub fn field(&self, field: TrackedField) -> &str {
        match field {
            TrackedField::Name => &self.name,
            TrackedField::Description => &self.description,
            TrackedField::Status => &self.status,
        }
    }
}

/// Pointer to a ticket change awaiting review.
///
/// The backend never sends `read`; it is a client-side annotation that
/// defaults to `false` on every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub ticket_id: TicketId,
    pub ticket_name: String,
    pub description: String,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Name,
    Description,
    Status,
}

impl TrackedField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Status => "status",
        }
    }
}

impl std::str::FromStr for TrackedField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "name" => Ok(Self::Name),
            "description" => Ok(Self::Description),
            "status" => Ok(Self::Status),
            other => Err(format!(
                "invalid field '{other}', expected one of: name, description, status"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetail {
    pub field: TrackedField,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
}

impl ChangeDetail {
    pub fn modified(field: TrackedField, previous: &str, current: &str) -> Self {
        Self {
            field,
            change_type: ChangeType::Modified,
            previous_value: Some(previous.to_owned()),
            current_value: Some(current.to_owned()),
        }
    }

    /// One-line, human readable rendering of the change.
    pub fn summary(&self) -> String {
        let previous = self.previous_value.as_deref().unwrap_or_default();
        let current = self.current_value.as_deref().unwrap_or_default();
        match (self.field, self.change_type) {
            (TrackedField::Description, _) => "Description updated".to_owned(),
            (TrackedField::Name, ChangeType::Modified) => {
                format!("Title changed from \"{previous}\" to \"{current}\"")
            }
            (TrackedField::Status, ChangeType::Modified) => {
                format!("Status changed from {previous} to {current}")
            }
            (field, ChangeType::Added) => format!("{} set to \"{current}\"", field.as_str()),
            (field, ChangeType::Removed) => format!("{} cleared", field.as_str()),
        }
    }
}
