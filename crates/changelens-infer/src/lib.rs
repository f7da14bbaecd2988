use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use changelens_config::{AnalysisConfig, AnalysisProviderKind, normalize_base_url};
use changelens_core::{ChangeDetail, TrackedField};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod assistant;
mod heuristic;

pub use assistant::{AskRequest, AskResponse, AssistantClient, AssistantContext};
pub use heuristic::{
    FALLBACK_CHANGE_TYPE, FALLBACK_COST_REASON, FALLBACK_EFFORT_HOURS, FALLBACK_LEVEL,
    FALLBACK_RECOMMENDATIONS, HeuristicAnalysisProvider, preview,
};

const ANALYZE_SPEC_CHANGES_PATH: &str = "/api/ai-analyze/analyze-spec-changes";

#[derive(Debug, Error)]
pub enum InferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Failure of the remote analysis service. Never reaches callers of
/// [`AnalysisClient`]; it is logged and replaced by a heuristic result.
pub type AnalysisServiceError = InferError;

/// Semantic explanation of a ticket change.
///
/// Field names on the wire are the analysis service's snake_case names, so a
/// result deserialized from the service serializes back to the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "summary_changes")]
    pub summary_of_changes: String,
    #[serde(rename = "changes_details")]
    pub change_details: Vec<AnalysisChange>,
    pub recommendations: String,
    #[serde(rename = "effort_estimation")]
    pub effort_estimate: EffortEstimate,
    #[serde(rename = "cost_recalculation")]
    pub cost_impact: CostImpact,
    pub old_description: String,
    pub new_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisChange {
    #[serde(rename = "type")]
    pub change_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortEstimate {
    #[serde(rename = "effort_level")]
    pub level: String,
    /// Kept as the service's own number so integral hours re-serialize as
    /// integers.
    #[serde(rename = "estimated_hours")]
    pub hours: serde_json::Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostImpact {
    #[serde(rename = "impact_level")]
    pub level: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Remote,
    HeuristicFallback,
}

impl AnalysisSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::HeuristicFallback => "heuristic_fallback",
        }
    }
}

/// Analysis handed to UI callers, tagged with where it came from.
///
/// `degraded` is set whenever the result was synthesized locally, so the UI
/// can show a basic-mode indicator next to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub source: AnalysisSource,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl Analysis {
    pub fn remote(result: AnalysisResult) -> Self {
        Self {
            result,
            source: AnalysisSource::Remote,
            degraded: false,
            degraded_reason: None,
        }
    }

    pub fn fallback(result: AnalysisResult, reason: impl Into<String>) -> Self {
        Self {
            result,
            source: AnalysisSource::HeuristicFallback,
            degraded: true,
            degraded_reason: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Input of one analysis: both description texts plus the field-level diff
/// the heuristic path reports. Only the descriptions are sent remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub old_description: String,
    pub new_description: String,
    pub changes: Vec<ChangeDetail>,
}

impl AnalysisRequest {
    pub fn new(
        old_description: impl Into<String>,
        new_description: impl Into<String>,
        changes: Vec<ChangeDetail>,
    ) -> Self {
        Self {
            old_description: old_description.into(),
            new_description: new_description.into(),
            changes,
        }
    }

    /// Request for two bare descriptions; the diff is the description itself
    /// when the texts differ.
    pub fn from_descriptions(
        old_description: impl Into<String>,
        new_description: impl Into<String>,
    ) -> Self {
        let old_description = old_description.into();
        let new_description = new_description.into();
        let changes = if old_description == new_description {
            Vec::new()
        } else {
            vec![ChangeDetail::modified(
                TrackedField::Description,
                &old_description,
                &new_description,
            )]
        };
        Self {
            old_description,
            new_description,
            changes,
        }
    }
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferError>;

    fn provider_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct AnalyzeSpecChangesBody<'a> {
    old_desc: &'a str,
    new_desc: &'a str,
}

/// Client for the remote spec-change analysis endpoint. One call is one
/// request: no caching, no retries.
#[derive(Debug, Clone)]
pub struct RemoteAnalysisProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteAnalysisProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, InferError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: normalize_base_url(endpoint),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn analyze_url(&self) -> String {
        format!("{}{ANALYZE_SPEC_CHANGES_PATH}", self.endpoint)
    }

    async fn request_analysis(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferError> {
        let body = AnalyzeSpecChangesBody {
            old_desc: &request.old_description,
            new_desc: &request.new_description,
        };

        let response = self.client.post(self.analyze_url()).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(InferError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl AnalysisProvider for RemoteAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferError> {
        self.request_analysis(request).await
    }

    fn provider_name(&self) -> &str {
        AnalysisProviderKind::Remote.as_str()
    }
}

/// Analysis entry point for callers: never fails.
///
/// The primary provider is tried once; any error is logged and replaced by
/// the heuristic result, marked degraded.
pub struct AnalysisClient {
    primary: Option<Arc<dyn AnalysisProvider>>,
    fallback: HeuristicAnalysisProvider,
}

impl AnalysisClient {
    pub fn new(primary: Arc<dyn AnalysisProvider>, fallback: HeuristicAnalysisProvider) -> Self {
        Self {
            primary: Some(primary),
            fallback,
        }
    }

    /// Client that always answers with the heuristic.
    pub fn heuristic_only(fallback: HeuristicAnalysisProvider) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.primary
            .as_deref()
            .map_or(AnalysisProviderKind::Heuristic.as_str(), |provider| {
                provider.provider_name()
            })
    }

    pub async fn analyze(&self, old_description: &str, new_description: &str) -> Analysis {
        self.analyze_request(&AnalysisRequest::from_descriptions(
            old_description,
            new_description,
        ))
        .await
    }

    pub async fn analyze_request(&self, request: &AnalysisRequest) -> Analysis {
        let Some(primary) = self.primary.as_deref() else {
            return Analysis::fallback(
                self.fallback.synthesize(request),
                "remote analysis disabled by configuration",
            );
        };

        match primary.analyze(request).await {
            Ok(result) => Analysis::remote(result),
            Err(err) => {
                tracing::warn!(
                    provider = primary.provider_name(),
                    error = %err,
                    "analysis service unavailable, using heuristic fallback"
                );
                Analysis::fallback(self.fallback.synthesize(request), err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisOverrides {
    pub provider: Option<AnalysisProviderKind>,
    pub endpoint: Option<String>,
}

pub fn load_analysis_client_from_config(
    config: &AnalysisConfig,
    overrides: AnalysisOverrides,
) -> Result<AnalysisClient, InferError> {
    let fallback = HeuristicAnalysisProvider::new(config.preview_chars);
    let provider = overrides.provider.unwrap_or(config.provider);

    match provider {
        AnalysisProviderKind::Heuristic => Ok(AnalysisClient::heuristic_only(fallback)),
        AnalysisProviderKind::Remote => {
            let endpoint = normalize_optional(overrides.endpoint)
                .unwrap_or_else(|| config.endpoint.clone());
            let remote = RemoteAnalysisProvider::new(&endpoint, config.timeout())?;
            Ok(AnalysisClient::new(Arc::new(remote), fallback))
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
