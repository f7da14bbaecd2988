use std::sync::Arc;

use changelens_core::{
    ANALYSIS_SCHEMA_VERSION, ChangeDetail, Notification, Version, compare_versions, latest_pair,
};
use changelens_infer::{Analysis, AnalysisClient, AnalysisRequest};
use changelens_store::VersionStore;
use serde::Serialize;

use crate::view_slot::ViewSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePhase {
    Idle,
    FetchingVersions,
    ComparingVersions,
    RequestingAnalysis,
    Ready,
    Failed,
}

impl ChangePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingVersions => "fetching_versions",
            Self::ComparingVersions => "comparing_versions",
            Self::RequestingAnalysis => "requesting_analysis",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Composite read model for one notification: the two latest versions, their
/// field diff and the analysis of the description change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeView {
    pub schema_version: u32,
    pub notification: Notification,
    pub versions: Vec<Version>,
    pub change_details: Vec<ChangeDetail>,
    pub analysis: Option<Analysis>,
    pub phase: ChangePhase,
    pub transitions: Vec<ChangePhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChangeView {
    fn new(notification: Notification) -> Self {
        Self {
            schema_version: ANALYSIS_SCHEMA_VERSION,
            notification,
            versions: Vec::new(),
            change_details: Vec::new(),
            analysis: None,
            phase: ChangePhase::Idle,
            transitions: vec![ChangePhase::Idle],
            error: None,
        }
    }

    /// False when the two versions agree on every tracked field, or when
    /// there is not enough history to compare.
    pub fn has_actionable_change(&self) -> bool {
        !self.change_details.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        self.analysis.as_ref().is_some_and(Analysis::is_degraded)
    }

    fn enter(&mut self, phase: ChangePhase) {
        tracing::debug!(
            ticket_id = self.notification.ticket_id,
            from = self.phase.as_str(),
            to = phase.as_str(),
            "change view transition"
        );
        self.phase = phase;
        self.transitions.push(phase);
    }
}

/// Drives one notification through fetch, compare and analysis.
///
/// Steps run strictly in sequence; the only suspension points are the
/// version fetch and the analysis request.
#[derive(Clone)]
pub struct ChangeOrchestrator {
    versions: Arc<VersionStore>,
    analysis: Arc<AnalysisClient>,
}

impl ChangeOrchestrator {
    pub fn new(versions: Arc<VersionStore>, analysis: Arc<AnalysisClient>) -> Self {
        Self { versions, analysis }
    }

    pub async fn build_change_view(&self, notification: &Notification) -> ChangeView {
        let mut view = ChangeView::new(notification.clone());
        view.enter(ChangePhase::FetchingVersions);

        let history = match self
            .versions
            .get_versions(notification.ticket_id, false)
            .await
        {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(error = %err, "change view without versions");
                view.error = Some(err.to_string());
                view.enter(ChangePhase::Failed);
                return view;
            }
        };

        view.versions = history.into_iter().take(2).collect();
        if latest_pair(&view.versions).is_none() {
            view.enter(ChangePhase::Ready);
            return view;
        }

        view.enter(ChangePhase::ComparingVersions);
        let details = latest_pair(&view.versions)
            .map(|(older, newer)| compare_versions(older, newer))
            .unwrap_or_default();
        if details.is_empty() {
            view.enter(ChangePhase::Ready);
            return view;
        }
        view.change_details = details;

        self.request_analysis(view).await
    }

    /// Re-runs only the analysis step on versions already in `view`.
    ///
    /// Views without two versions are returned unchanged.
    pub async fn reanalyze(&self, view: &ChangeView) -> ChangeView {
        if latest_pair(&view.versions).is_none() {
            return view.clone();
        }
        self.request_analysis(view.clone()).await
    }

    /// Builds the view for `notification` and publishes it into `slot`
    /// unless the slot was closed or re-targeted meanwhile.
    pub async fn load_into(&self, slot: &ViewSlot, notification: &Notification) -> bool {
        let ticket = slot.begin(notification.ticket_id);
        let view = self.build_change_view(notification).await;
        slot.publish(ticket, view)
    }

    async fn request_analysis(&self, mut view: ChangeView) -> ChangeView {
        let request = match latest_pair(&view.versions) {
            Some((older, newer)) => AnalysisRequest::new(
                older.description.as_str(),
                newer.description.as_str(),
                view.change_details.clone(),
            ),
            None => return view,
        };

        view.enter(ChangePhase::RequestingAnalysis);
        let analysis = self.analysis.analyze_request(&request).await;
        tracing::debug!(
            ticket_id = view.notification.ticket_id,
            source = analysis.source.as_str(),
            "analysis attached"
        );
        if analysis.is_degraded() {
            tracing::info!(
                ticket_id = view.notification.ticket_id,
                "change view using basic analysis mode"
            );
        }
        view.analysis = Some(analysis);
        view.enter(ChangePhase::Ready);
        view
    }
}
