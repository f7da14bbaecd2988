use async_trait::async_trait;
use changelens_config::{AnalysisProviderKind, DEFAULT_PREVIEW_CHARS};

use crate::{
    AnalysisChange, AnalysisProvider, AnalysisRequest, AnalysisResult, CostImpact,
    EffortEstimate, InferError,
};

pub const FALLBACK_CHANGE_TYPE: &str = "Modified feature";
pub const FALLBACK_LEVEL: &str = "Medium";
pub const FALLBACK_EFFORT_HOURS: u64 = 8;
pub const FALLBACK_COST_REASON: &str = "requires review of estimates";
pub const FALLBACK_RECOMMENDATIONS: &str =
    "Review the impact of this change on planning and resources before updating estimates.";

/// Local stand-in for the analysis service. Deterministic: the same request
/// always yields the same result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicAnalysisProvider {
    preview_chars: usize,
}

impl HeuristicAnalysisProvider {
    pub fn new(preview_chars: usize) -> Self {
        Self {
            preview_chars: preview_chars.max(1),
        }
    }

    pub fn synthesize(&self, request: &AnalysisRequest) -> AnalysisResult {
        let summary_of_changes = format!(
            "Description changed from \"{}\" to \"{}\".",
            preview(&request.old_description, self.preview_chars),
            preview(&request.new_description, self.preview_chars)
        );

        let change_details = request
            .changes
            .iter()
            .map(|change| AnalysisChange {
                change_type: FALLBACK_CHANGE_TYPE.to_owned(),
                description: change.summary(),
            })
            .collect();

        AnalysisResult {
            summary_of_changes,
            change_details,
            recommendations: FALLBACK_RECOMMENDATIONS.to_owned(),
            effort_estimate: EffortEstimate {
                level: FALLBACK_LEVEL.to_owned(),
                hours: FALLBACK_EFFORT_HOURS.into(),
            },
            cost_impact: CostImpact {
                level: FALLBACK_LEVEL.to_owned(),
                reason: FALLBACK_COST_REASON.to_owned(),
            },
            old_description: request.old_description.clone(),
            new_description: request.new_description.clone(),
        }
    }
}

impl Default for HeuristicAnalysisProvider {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

#[async_trait]
impl AnalysisProvider for HeuristicAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferError> {
        Ok(self.synthesize(request))
    }

    fn provider_name(&self) -> &str {
        AnalysisProviderKind::Heuristic.as_str()
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}
