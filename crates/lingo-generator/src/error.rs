//! Error types for the lesson generator.
//!
//! Structural defects in generated content are not errors: they travel as
//! validation warnings on a degraded draft. The types here cover what the
//! generator cannot recover from (configuration, exhausted budget with nothing
//! to return, cancellation) and the failures of a single provider call.

use std::path::PathBuf;

use serde::Serialize;

/// A specialized `Result` type for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Errors that can occur while configuring or running the generator.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error(
        "Invalid JSON in config file '{path}': {message}\n\n\
         Suggestion: Validate your lingo.json with a JSON linter"
    )]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// The lesson brief cannot be served.
    #[error(
        "Invalid lesson brief: {message}\n\n\
         Suggestion: Provide a topic and an exercise count between 1 and 50"
    )]
    InvalidBrief {
        /// Why the brief was rejected.
        message: String,
    },

    /// Every attempt failed without producing a usable draft.
    #[error(
        "Lesson generation failed after {attempts} attempt(s): {last_failure}\n\n\
         Suggestion: Check the provider configuration and try again"
    )]
    GenerationFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last attempt's failure.
        last_failure: String,
    },

    /// The caller cancelled generation between attempts.
    #[error("Lesson generation cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Number of attempts completed before cancellation.
        attempts: u32,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current phase.
        from: String,
        /// The attempted target phase.
        to: String,
    },
}

impl GeneratorError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidBrief` error.
    #[must_use]
    pub fn invalid_brief(message: impl Into<String>) -> Self {
        Self::InvalidBrief {
            message: message.into(),
        }
    }

    /// Creates a new `GenerationFailed` error.
    #[must_use]
    pub fn generation_failed(attempts: u32, last_failure: impl std::fmt::Display) -> Self {
        Self::GenerationFailed {
            attempts,
            last_failure: last_failure.to_string(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is fatal and requires immediate termination.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::InvalidBrief { .. }
                | Self::GenerationFailed { .. }
                | Self::InvalidStateTransition { .. }
        )
    }

    /// Returns `true` if generation stopped because the caller cancelled it.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// ============================================================================
// Provider Errors
// ============================================================================

/// Categories of provider failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The call did not finish within the attempt timeout.
    Timeout,
    /// The provider answered without any content.
    EmptyResponse,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::EmptyResponse => write!(f, "empty_response"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl ProviderErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key or credentials",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the provider may be experiencing issues",
            Self::Network => "Check your network connection and the provider base URL",
            Self::Timeout => "Increase generator.attemptTimeoutSecs in lingo.json",
            Self::EmptyResponse => "Retry; if it persists try a different model",
            Self::Other => "Check the provider's status page",
        }
    }
}

/// A single provider call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Provider error ({kind}): {message}\n\nSuggestion: {suggestion}")]
pub struct ProviderError {
    /// Failure category.
    pub kind: ProviderErrorKind,
    /// Detail from the provider or transport.
    pub message: String,
    /// Actionable suggestion for the user.
    pub suggestion: String,
}

impl ProviderError {
    /// Creates a provider error with the suggestion for its kind.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: kind.suggestion().to_string(),
        }
    }
}
