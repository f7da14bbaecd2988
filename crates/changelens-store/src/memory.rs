use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use changelens_core::{Notification, Project, ProjectId, Ticket, TicketId, Version};

use crate::{StoreError, TicketSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceCallCounts {
    pub versions: usize,
    pub notifications: usize,
}

/// In-process backend used by offline runs and tests.
///
/// Versions are returned in insertion order, not recency order, so callers
/// exercise the store's sorting. `set_available(false)` makes every call fail.
#[derive(Debug, Default)]
pub struct MemoryTicketSource {
    versions: Mutex<HashMap<TicketId, Vec<Version>>>,
    notifications: Mutex<Vec<Notification>>,
    tickets: Mutex<HashMap<TicketId, Ticket>>,
    projects: Mutex<HashMap<ProjectId, Project>>,
    latency: Option<Duration>,
    unavailable: AtomicBool,
    version_calls: AtomicUsize,
    notification_calls: AtomicUsize,
}

impl MemoryTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_versions(self, ticket_id: TicketId, versions: Vec<Version>) -> Self {
        self.set_versions(ticket_id, versions);
        self
    }

    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        self.set_notifications(notifications);
        self
    }

    pub fn with_project(self, project: Project, tickets: Vec<Ticket>) -> Self {
        {
            let mut stored = lock(&self.tickets);
            for ticket in tickets {
                stored.insert(ticket.id, ticket);
            }
        }
        lock(&self.projects).insert(project.id, project);
        self
    }

    pub fn set_versions(&self, ticket_id: TicketId, versions: Vec<Version>) {
        lock(&self.versions).insert(ticket_id, versions);
    }

    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        *lock(&self.notifications) = notifications;
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn call_counts(&self) -> SourceCallCounts {
        SourceCallCounts {
            versions: self.version_calls.load(Ordering::SeqCst),
            notifications: self.notification_calls.load(Ordering::SeqCst),
        }
    }

    async fn simulate_network(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory source switched offline".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketSource for MemoryTicketSource {
    async fn ticket_versions(&self, ticket_id: TicketId) -> Result<Vec<Version>, StoreError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        Ok(lock(&self.versions)
            .get(&ticket_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_notifications(&self) -> Result<Vec<Notification>, StoreError> {
        self.notification_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        Ok(lock(&self.notifications).clone())
    }

    async fn ticket(&self, ticket_id: TicketId) -> Result<Ticket, StoreError> {
        self.simulate_network().await?;
        lock(&self.tickets)
            .get(&ticket_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: "ticket",
                id: ticket_id,
            })
    }

    async fn project(&self, project_id: ProjectId) -> Result<Project, StoreError> {
        self.simulate_network().await?;
        lock(&self.projects)
            .get(&project_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                kind: "project",
                id: project_id,
            })
    }

    async fn project_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>, StoreError> {
        let project = self.project(project_id).await?;
        let mut tickets = lock(&self.tickets)
            .values()
            .filter(|ticket| ticket.project == project.name)
            .cloned()
            .collect::<Vec<_>>();
        tickets.sort_by_key(|ticket| ticket.id);
        Ok(tickets)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
