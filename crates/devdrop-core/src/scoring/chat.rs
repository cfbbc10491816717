//! OpenAI-compatible chat completions scorer (Groq by default).

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ScoringAdapter, ScoringRequest};
use crate::error::ScoringError;

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// Chat completions endpoint settings
#[derive(Debug, Clone)]
pub struct ChatScoringConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ChatScoringConfig {
    fn default() -> Self {
        ChatScoringConfig {
            api_url: std::env::var("SCORING_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key: std::env::var("SCORING_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("SCORING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }
}

impl ChatScoringConfig {
    /// Reads `SCORING_API_URL`, `SCORING_API_KEY` and `SCORING_MODEL`.
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatScorer {
    config: ChatScoringConfig,
    http_client: reqwest::Client,
}

impl ChatScorer {
    pub fn new(config: ChatScoringConfig) -> Result<Self, ScoringError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("devdrop/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ChatScorer {
            config,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self, ScoringError> {
        Self::new(ChatScoringConfig::from_env())
    }
}

#[async_trait]
impl ScoringAdapter for ChatScorer {
    #[instrument(
        skip(self, request),
        fields(model = %self.config.model, contributor = %request.contributor)
    )]
    async fn score(&self, request: &ScoringRequest) -> Result<String, ScoringError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ScoringError::fatal("SCORING_API_KEY is not set"))?;

        let body = ChatBody {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("scoring endpoint returned {status}: {text}");
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                ScoringError::rate_limited(message)
            } else {
                ScoringError::new(message)
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScoringError::fatal("scoring response had no message content"))?;
        debug!(chars = content.len(), "scoring response received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_both_messages() {
        let body = ChatBody {
            model: "llama3-70b-8192",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "contract",
                },
                ChatMessage {
                    role: "user",
                    content: "prompt",
                },
            ],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "prompt");
    }

    #[tokio::test]
    async fn missing_key_fails_without_retry() {
        let scorer = ChatScorer::new(ChatScoringConfig {
            api_url: "http://localhost:1".into(),
            api_key: None,
            model: DEFAULT_MODEL.into(),
        })
        .unwrap();
        let request = ScoringRequest {
            repository: "r".into(),
            contributor: "c".into(),
            system: String::new(),
            prompt: String::new(),
        };
        let err = scorer.score(&request).await.unwrap_err();
        assert!(!err.retryable);
    }
}
