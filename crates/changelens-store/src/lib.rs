use async_trait::async_trait;
use changelens_core::{Notification, Project, ProjectId, Ticket, TicketId, Version};
use thiserror::Error;

mod coalesce;
mod http;
mod memory;
mod notifications;
mod versions;

pub use coalesce::{InflightGuard, RequestCoalescer};
pub use http::HttpTicketSource;
pub use memory::{MemoryTicketSource, SourceCallCounts};
pub use notifications::NotificationCache;
pub use versions::{NotificationDetails, VersionStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
}

/// Version history could not be retrieved. The cache entry for the ticket is
/// left exactly as it was before the call.
#[derive(Debug, Error)]
#[error("failed to fetch versions for ticket {ticket_id}: {source}")]
pub struct VersionFetchError {
    pub ticket_id: TicketId,
    #[source]
    pub source: StoreError,
}

/// Read access to the ticket backend.
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn ticket_versions(&self, ticket_id: TicketId) -> Result<Vec<Version>, StoreError>;

    async fn latest_notifications(&self) -> Result<Vec<Notification>, StoreError>;

    async fn ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError>;

    async fn project(&self, project_id: ProjectId) -> Result<Project, StoreError>;

    async fn project_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>, StoreError>;
}
