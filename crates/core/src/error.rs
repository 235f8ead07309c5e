//! Error types for the Wayfarer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use thiserror::Error;

use crate::capability::FailureKind;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Failures of the Reasoning Client: either the provider call failed or it
/// answered with something that is not a usable decision.
#[derive(Debug, Clone, Error)]
pub enum ReasoningError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Malformed decision: {0}")]
    MalformedDecision(String),
}

#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Upstream call failed: {0}")]
    Upstream(String),

    #[error("Upstream call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("No handler registered for capability '{0}'")]
    NotRegistered(String),
}

impl CapabilityError {
    /// The failure kind this error is folded into when recorded in context.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidArguments(_) | Self::NotRegistered(_) => FailureKind::InvalidArguments,
            Self::Upstream(_) | Self::Timeout { .. } => FailureKind::UpstreamError,
        }
    }
}
