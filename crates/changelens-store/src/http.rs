use std::time::Duration;

use async_trait::async_trait;
use changelens_config::{BackendConfig, normalize_base_url};
use changelens_core::{Notification, Project, ProjectId, Ticket, TicketId, Version};
use serde::de::DeserializeOwned;

use crate::{StoreError, TicketSource};

#[derive(Debug, Clone)]
pub struct HttpTicketSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTicketSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, StoreError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "backend request");

        let value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;

        Ok(value)
    }
}

#[async_trait]
impl TicketSource for HttpTicketSource {
    async fn ticket_versions(&self, ticket_id: TicketId) -> Result<Vec<Version>, StoreError> {
        self.get_json(&format!("/tickets/{ticket_id}/versions"))
            .await
    }

    async fn latest_notifications(&self) -> Result<Vec<Notification>, StoreError> {
        self.get_json("/modifications/latest").await
    }

    async fn ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.get_json(&format!("/tickets/{ticket_id}")).await
    }

    async fn project(&self, project_id: ProjectId) -> Result<Project, StoreError> {
        self.get_json(&format!("/projects/{project_id}")).await
    }

    async fn project_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>, StoreError> {
        self.get_json(&format!("/projects/{project_id}/tickets"))
            .await
    }
}
