//! Error taxonomy for the evaluation pipeline.
//!
//! Adapters report failures through [`HostError`] and [`ScoringError`], each
//! carrying an explicit `retryable` flag. The orchestrator's retry policy
//! only ever consults [`DevdropError::is_retryable`].

use devdrop_state::StorageError;

/// Failure reported by a repository host adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
    /// HTTP status when the failure came from a response.
    pub status: Option<u16>,
    pub retryable: bool,
}

impl HostError {
    /// A failure classified from its text alone.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = is_rate_limit_message(&message);
        Self {
            message,
            status: None,
            retryable,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16, retryable: bool) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            retryable,
        }
    }

    /// A transient throttling failure.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retryable: true,
        }
    }
}

impl From<reqwest::Error> for HostError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let retryable = status == Some(429) || is_rate_limit_message(&err.to_string());
        HostError {
            message: err.to_string(),
            status,
            retryable,
        }
    }
}

/// Failure reported by a scoring adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScoringError {
    pub message: String,
    pub retryable: bool,
}

impl ScoringError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = is_rate_limit_message(&message);
        Self { message, retryable }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<reqwest::Error> for ScoringError {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.status().map(|s| s.as_u16()) == Some(429)
            || is_rate_limit_message(&err.to_string());
        ScoringError {
            message: err.to_string(),
            retryable,
        }
    }
}

/// Case-insensitive "rate limit" match for failures that only carry text.
pub fn is_rate_limit_message(message: &str) -> bool {
    message.to_lowercase().contains("rate limit")
}

/// Pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum DevdropError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("evaluation response could not be parsed: {0}")]
    EvaluationParse(String),

    #[error("no airdrop configured for repository: {0}")]
    NoAirdropConfigured(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DevdropError {
    /// Whether the failure is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            DevdropError::Host(e) => e.retryable,
            DevdropError::Scoring(e) => e.retryable,
            _ => false,
        }
    }

    /// Failures that must escape a batch's per-pair boundary.
    pub fn is_fatal_to_batch(&self) -> bool {
        matches!(self, DevdropError::Persistence(_))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, DevdropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_text_is_case_insensitive() {
        assert!(is_rate_limit_message("API Rate Limit exceeded for user"));
        assert!(is_rate_limit_message("rate limit"));
        assert!(!is_rate_limit_message("ratelimit"));
        assert!(!is_rate_limit_message("Not Found"));

        assert!(HostError::new("API rate limit exceeded for 10.0.0.1").retryable);
        assert!(!HostError::new("Bad credentials").retryable);
    }

    #[test]
    fn retryability_follows_the_flag() {
        let host = DevdropError::Host(HostError::with_status("Forbidden", 403, true));
        assert!(host.is_retryable());

        let host = DevdropError::Host(HostError::with_status("rate limit", 500, false));
        assert!(!host.is_retryable());

        assert!(DevdropError::Scoring(ScoringError::new("Rate limit reached")).is_retryable());
        assert!(!DevdropError::EvaluationParse("bad".into()).is_retryable());
        assert!(!DevdropError::Timeout {
            operation: "scoring".into(),
            secs: 120
        }
        .is_retryable());
    }

    #[test]
    fn only_persistence_escapes_the_batch() {
        let err = DevdropError::Persistence(StorageError::Backend("down".into()));
        assert!(err.is_fatal_to_batch());
        assert!(!DevdropError::RepositoryNotFound("x".into()).is_fatal_to_batch());
    }

    #[test]
    fn display_names_the_failure() {
        let err = DevdropError::NoAirdropConfigured("devdrop".into());
        assert!(err.to_string().contains("no airdrop configured"));
        let err = DevdropError::Timeout {
            operation: "scoring".into(),
            secs: 120,
        };
        assert_eq!(err.to_string(), "scoring timed out after 120s");
    }
}
