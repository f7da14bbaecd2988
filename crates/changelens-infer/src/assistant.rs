use std::time::Duration;

use changelens_config::normalize_base_url;
use serde::{Deserialize, Serialize};

use crate::InferError;

const ASK_PATH: &str = "/api/ai-analyze/ask";
const DEFAULT_NUM_RESULTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub query: String,
    pub project_id: String,
    pub num_results: usize,
}

impl AskRequest {
    pub fn new(query: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            project_id: project_id.into(),
            num_results: DEFAULT_NUM_RESULTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantContext {
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub contexts: Vec<AssistantContext>,
}

/// Project-scoped question answering. Unlike analysis, failures propagate.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AssistantClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, InferError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: normalize_base_url(endpoint),
        })
    }

    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse, InferError> {
        let url = format!("{}{ASK_PATH}", self.endpoint);
        let response = self.client.post(&url).json(request).send().await?;
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
