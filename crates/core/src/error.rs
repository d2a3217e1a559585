//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; there is no catch-all type.

use thiserror::Error;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    /// The backend rejected the request because a tool message does not
    /// answer a preceding assistant tool call.
    #[error("Backend rejected tool history: {0}")]
    MalformedToolHistory(String),

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Unsupported message role: {0}")]
    UnknownRole(String),

    #[error("Tool messages must carry a tool_call_id")]
    MissingToolCallId,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors a single step of the control loop can report.
///
/// Only [`StepError::MalformedToolHistory`] is recoverable; the loop repairs
/// memory and continues. Every other variant ends the run in `Error` state.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Malformed tool history: {0}")]
    MalformedToolHistory(String),

    #[error("Reasoning backend failed: {0}")]
    Provider(ProviderError),

    #[error("Step timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Internal(String),
}

impl StepError {
    /// Whether the loop should repair history and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StepError::MalformedToolHistory(_))
    }
}

impl From<ProviderError> for StepError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MalformedToolHistory(detail) => StepError::MalformedToolHistory(detail),
            other => StepError::Provider(other),
        }
    }
}
