//! Scoring adapter
//!
//! A scoring adapter turns a contribution profile into reward points and a
//! justification. This module owns the rubric prompt sent to the adapter
//! and the validation of what comes back; the adapter itself only moves
//! text.

pub mod chat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DevdropError, ScoringError};
use crate::model::ContributionProfile;

pub use chat::{ChatScorer, ChatScoringConfig};

/// Output contract stated to the scoring model.
pub const SYSTEM_PROMPT: &str = "You MUST respond with a valid JSON object containing exactly two \
fields: 'rewardPoints' (a non-negative number) and 'justification' (a string). Do not include any \
other text or formatting.";

const RUBRIC: &str = r#"## Evaluation Criteria:
- **Lines of Code (0-4 points)**
  - 1-50 lines -> 1 point
  - 51-200 lines -> 2 points
  - 201-500 lines -> 3 points
  - 501+ lines -> 4 points

- **Files Changed (0-3 points)**
  - 1-2 files -> 1 point
  - 3-10 files -> 2 points
  - 11+ files -> 3 points

- **Commit Message Quality (0-3 points)**
  - Descriptive (2+ words) -> 2 points
  - Basic (1 word) -> 1 point

- **Issue Reference & Resolution**
  - References an issue (e.g., "fixes #123") -> +10 points
  - Closes an issue (e.g., "closes #123") -> +20 points

- **Special Cases & Adjustments:**
  - Initial project scaffolding -> **Max 3 points**
  - File deletions only -> **Max 2 points**
  - Single-word commit messages (e.g., "fix", "test") -> **Max 2 points**
  - Test-only commits -> **Max 3 points**

## Expected JSON Response Format:
```json
{
    "rewardPoints": number,
    "justification": "Your reasoning for the score"
}
```"#;

/// One scoring call: the output contract plus the rubric prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub repository: String,
    pub contributor: String,
    pub system: String,
    pub prompt: String,
}

impl ScoringRequest {
    /// Embed the full profile as JSON evidence under the fixed rubric.
    pub fn for_profile(profile: &ContributionProfile) -> crate::Result<Self> {
        let evidence = serde_json::to_string_pretty(profile)?;
        let prompt = format!(
            "You are evaluating GitHub contributions for the user **{contributor}** in the \
             repository **{repository}**.\n\n## Contribution Data:\n```json\n{evidence}\n```\n\n{RUBRIC}\n",
            contributor = profile.contributor,
            repository = profile.repository,
        );
        Ok(Self {
            repository: profile.repository.clone(),
            contributor: profile.contributor.clone(),
            system: SYSTEM_PROMPT.to_string(),
            prompt,
        })
    }
}

/// Pluggable scoring backend.
#[async_trait]
pub trait ScoringAdapter: Send + Sync {
    /// Return the raw response text for `request`.
    async fn score(&self, request: &ScoringRequest) -> Result<String, ScoringError>;
}

/// A validated scoring response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoredEvaluation {
    #[serde(rename = "rewardPoints", alias = "total_points")]
    pub reward_points: f64,
    pub justification: String,
}

/// Parse a scoring response, retrying once on the slice between the first
/// `{` and the last `}` when the raw text is not a bare JSON object.
pub fn parse_scoring_response(raw: &str) -> crate::Result<ScoredEvaluation> {
    let trimmed = raw.trim();
    let parsed = match serde_json::from_str::<ScoredEvaluation>(trimmed) {
        Ok(parsed) => parsed,
        Err(first) => {
            let repaired = outermost_braces(trimmed).ok_or_else(|| {
                DevdropError::EvaluationParse(format!("no JSON object in response: {first}"))
            })?;
            serde_json::from_str::<ScoredEvaluation>(repaired)
                .map_err(|e| DevdropError::EvaluationParse(e.to_string()))?
        }
    };

    if !parsed.reward_points.is_finite() || parsed.reward_points < 0.0 {
        return Err(DevdropError::EvaluationParse(format!(
            "rewardPoints must be non-negative, got {}",
            parsed.reward_points
        )));
    }
    Ok(parsed)
}

fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
