//! Error types for rondo.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::tools::ToolKind;

/// Primary error type for all rondo operations.
#[derive(Error, Debug)]
pub enum RondoError {
    #[error("Transport error (status {status:?}): {message}")]
    Transport {
        status: Option<u16>,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Stream closed before a terminal event")]
    IncompleteStream,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid arguments for call {call_id}: {message}")]
    InvalidArguments { call_id: String, message: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    HandlerExecution { tool_name: String, message: String },

    #[error("Unhandled {kind} tool call {call_id} ({tool_name})")]
    UnhandledToolCall {
        call_id: String,
        tool_name: String,
        kind: ToolKind,
    },

    #[error("Response failed ({code}): {message}")]
    ResponseFailed { code: String, message: String },

    #[error("Round limit exceeded (max_rounds={0})")]
    RoundLimitExceeded(usize),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Tool choice references unregistered tool: {0}")]
    UnknownToolChoice(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RondoError {
    /// Create a transport error with an HTTP status.
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error that has no HTTP status (socket closed, decode failure).
    pub fn transport_message(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
            source: None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { status, .. } => match status {
                Some(401 | 403) => ErrorCategory::Authentication,
                Some(429) => ErrorCategory::RateLimit,
                Some(500..=599) => ErrorCategory::Server,
                _ => ErrorCategory::Transport,
            },
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::IncompleteStream | Self::Protocol(_) => ErrorCategory::Protocol,
            Self::InvalidArguments { .. } | Self::HandlerExecution { .. } => {
                ErrorCategory::ToolExecution
            }
            Self::UnhandledToolCall { .. }
            | Self::DuplicateTool(_)
            | Self::UnknownToolChoice(_) => ErrorCategory::ToolRegistry,
            Self::ResponseFailed { .. } => ErrorCategory::Remote,
            Self::RoundLimitExceeded(_) | Self::InvalidState(_) => ErrorCategory::Session,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether the transport might succeed if the caller retries the round.
    ///
    /// The session never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether this error ends a session (as opposed to being folded into a
    /// failed tool output).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InvalidArguments { .. } | Self::HandlerExecution { .. }
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::ToolRegistry => RecoverySuggestion::RegisterTool,
            ErrorCategory::Cancellation => RecoverySuggestion::None,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RondoError>;
