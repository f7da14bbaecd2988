use std::sync::Arc;

use anyhow::{Context, Result};
use changelens_config::{AnalysisProviderKind, ChangelensConfig, normalize_base_url};
use changelens_core::TicketId;
use changelens_infer::{
    AnalysisClient, AnalysisOverrides, AssistantClient, load_analysis_client_from_config,
};
use changelens_store::{HttpTicketSource, NotificationCache, TicketSource, VersionStore};

use crate::change_view::ChangeOrchestrator;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionOverrides {
    pub backend_url: Option<String>,
    pub analysis_provider: Option<AnalysisProviderKind>,
    pub analysis_endpoint: Option<String>,
}

/// Composition root: owns the caches and clients for one process.
///
/// Nothing here is global; components are handed out by reference.
pub struct Session {
    source: Arc<dyn TicketSource>,
    versions: Arc<VersionStore>,
    notifications: NotificationCache,
    analysis: Arc<AnalysisClient>,
    assistant: Option<AssistantClient>,
}

impl Session {
    pub fn from_config(config: &ChangelensConfig, overrides: SessionOverrides) -> Result<Self> {
        let mut backend = config.backend.clone();
        if let Some(url) = overrides.backend_url.as_deref().map(normalize_base_url)
            && !url.is_empty()
        {
            backend.base_url = url;
        }
        let source =
            HttpTicketSource::from_config(&backend).context("failed to build backend client")?;

        let analysis = load_analysis_client_from_config(
            &config.analysis,
            AnalysisOverrides {
                provider: overrides.analysis_provider,
                endpoint: overrides.analysis_endpoint.clone(),
            },
        )
        .context("failed to build analysis client")?;

        let assistant_endpoint = overrides
            .analysis_endpoint
            .unwrap_or_else(|| config.analysis.endpoint.clone());
        let assistant = AssistantClient::new(&assistant_endpoint, config.analysis.timeout())
            .context("failed to build assistant client")?;

        let mut session = Self::with_components(Arc::new(source), analysis);
        session.assistant = Some(assistant);
        Ok(session)
    }

    pub fn with_components(source: Arc<dyn TicketSource>, analysis: AnalysisClient) -> Self {
        Self {
            versions: Arc::new(VersionStore::new(Arc::clone(&source))),
            notifications: NotificationCache::new(Arc::clone(&source)),
            analysis: Arc::new(analysis),
            assistant: None,
            source,
        }
    }

    pub fn source(&self) -> &dyn TicketSource {
        self.source.as_ref()
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn notifications(&self) -> &NotificationCache {
        &self.notifications
    }

    pub fn analysis(&self) -> &AnalysisClient {
        &self.analysis
    }

    pub fn assistant(&self) -> Option<&AssistantClient> {
        self.assistant.as_ref()
    }

    pub fn orchestrator(&self) -> ChangeOrchestrator {
        ChangeOrchestrator::new(Arc::clone(&self.versions), Arc::clone(&self.analysis))
    }

    /// Invalidation hook for callers that just mutated a ticket: its history
    /// and the notification list are refetched on next access.
    pub fn invalidate_ticket(&self, ticket_id: TicketId) {
        self.versions.clear_cache(Some(ticket_id));
        self.notifications.clear_cache();
    }

    pub fn invalidate_all(&self) {
        self.versions.clear_cache(None);
        self.notifications.clear_cache();
    }
}
