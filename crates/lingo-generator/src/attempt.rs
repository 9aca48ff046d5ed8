//! Generation state machine and attempt records.
//!
//! One [`GenerationState`] lives for one generator invocation. Each provider
//! round-trip leaves a [`GenerationAttempt`] in the history.

use std::fmt;

use chrono::{DateTime, Utc};
use lingo_core::LessonValidation;
use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, ProviderErrorKind, Result};

// ============================================================================
// GenerationPhase
// ============================================================================

/// Phase of the generation loop.
///
/// The phase transitions through these states:
/// - `Requesting` -> `Parsing` -> `Validating` -> `Accepted`
/// - Any failed attempt with budget left: -> `Retrying` -> `Requesting`
/// - Budget spent with a usable draft: -> `Exhausted`
/// - Budget spent without a draft: -> `Failed`
/// - Cancellation before a request: -> `Cancelled`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    /// Waiting on the provider.
    #[default]
    Requesting,
    /// Interpreting the provider's text as a lesson.
    Parsing,
    /// Running the validator over the parsed exercises.
    Validating,
    /// The attempt failed; another will follow.
    Retrying,
    /// Every exercise is valid.
    Accepted,
    /// Budget spent; the last usable draft is returned with warnings.
    Exhausted,
    /// Budget spent and no attempt produced a draft.
    Failed,
    /// The caller cancelled between attempts.
    Cancelled,
}

impl GenerationPhase {
    /// Returns `true` if this phase ends the invocation.
    ///
    /// # Examples
    ///
    /// ```
    /// use lingo_generator::GenerationPhase;
    ///
    /// assert!(GenerationPhase::Accepted.is_terminal());
    /// assert!(GenerationPhase::Exhausted.is_terminal());
    /// assert!(!GenerationPhase::Retrying.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Exhausted | Self::Failed | Self::Cancelled
        )
    }

    /// Returns `true` if the loop may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Requesting,
                Self::Parsing | Self::Retrying | Self::Exhausted | Self::Failed | Self::Cancelled
            ) | (
                Self::Parsing,
                Self::Validating | Self::Retrying | Self::Exhausted | Self::Failed
            ) | (
                Self::Validating,
                Self::Accepted | Self::Retrying | Self::Exhausted
            ) | (Self::Retrying, Self::Requesting | Self::Cancelled)
        )
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Requesting => "requesting",
            Self::Parsing => "parsing",
            Self::Validating => "validating",
            Self::Retrying => "retrying",
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AttemptFailure
// ============================================================================

/// Why an attempt did not produce an accepted lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// The provider call returned an error.
    Provider {
        /// Error category.
        error_kind: ProviderErrorKind,
        /// Provider detail.
        message: String,
    },
    /// The provider call exceeded the attempt timeout.
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// The response was absent or not JSON.
    Parse {
        /// Parser detail.
        message: String,
    },
    /// The response was JSON but broke the exercise contract.
    Contract {
        /// Contract detail.
        message: String,
    },
    /// The lesson parsed with a different number of exercises than requested.
    ExerciseCount {
        /// Number of exercises the brief asked for.
        expected: u32,
        /// Number of exercises the response contained.
        actual: usize,
    },
    /// The lesson parsed but some exercises are invalid.
    Invalid {
        /// Number of invalid exercises.
        invalid_exercises: usize,
        /// Number of hard violations across the lesson.
        errors: usize,
    },
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider { error_kind, message } => {
                write!(f, "provider error ({error_kind}): {message}")
            }
            Self::Timeout { timeout_ms } => {
                write!(f, "provider call timed out after {timeout_ms}ms")
            }
            Self::Parse { message } => write!(f, "unparseable response: {message}"),
            Self::Contract { message } => write!(f, "contract violation: {message}"),
            Self::ExerciseCount { expected, actual } => {
                write!(f, "expected {expected} exercise(s), got {actual}")
            }
            Self::Invalid {
                invalid_exercises,
                errors,
            } => write!(
                f,
                "{invalid_exercises} invalid exercise(s) with {errors} violation(s)"
            ),
        }
    }
}

// ============================================================================
// GenerationAttempt
// ============================================================================

/// Record of one provider round-trip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationAttempt {
    /// Attempt number (1-indexed).
    pub attempt: u32,

    /// Phase the attempt ended in.
    pub phase: GenerationPhase,

    /// Whether every exercise validated.
    pub accepted: bool,

    /// Failure, if the attempt was not accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<AttemptFailure>,

    /// Per-exercise validation, if the response parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<LessonValidation>,

    /// When the attempt started.
    pub started_at: DateTime<Utc>,

    /// When the attempt ended.
    pub ended_at: DateTime<Utc>,
}

impl GenerationAttempt {
    /// Starts a new attempt record at the current time.
    #[must_use]
    pub fn begin(attempt: u32) -> Self {
        let now = Utc::now();
        Self {
            attempt,
            phase: GenerationPhase::Requesting,
            accepted: false,
            failure: None,
            validation: None,
            started_at: now,
            ended_at: now,
        }
    }

    /// Closes the record with the phase the attempt ended in.
    pub fn finish(&mut self, phase: GenerationPhase) {
        self.phase = phase;
        self.accepted = phase == GenerationPhase::Accepted;
        self.ended_at = Utc::now();
    }
}

// ============================================================================
// GenerationState
// ============================================================================

/// Loop state for one generator invocation.
#[derive(Debug, Clone)]
pub struct GenerationState {
    phase: GenerationPhase,
    attempt: u32,
    max_attempts: u32,
    started_at: DateTime<Utc>,
}

impl GenerationState {
    /// Creates a state at attempt 0, ready to request.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            phase: GenerationPhase::Requesting,
            attempt: 0,
            max_attempts,
            started_at: Utc::now(),
        }
    }

    /// Number of attempts started so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns `true` if another attempt fits in the budget.
    #[must_use]
    pub const fn has_budget(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Counts a new attempt. The phase must be `Requesting`.
    pub fn begin_attempt(&mut self) -> Result<u32> {
        if self.phase != GenerationPhase::Requesting || !self.has_budget() {
            return Err(GeneratorError::invalid_transition(
                self.phase,
                format!("attempt {}", self.attempt + 1),
            ));
        }
        self.attempt += 1;
        Ok(self.attempt)
    }

    /// Moves to `next` if the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::InvalidStateTransition` otherwise.
    pub fn transition(&mut self, next: GenerationPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(GeneratorError::invalid_transition(self.phase, next));
        }
        self.phase = next;
        Ok(())
    }

    /// Returns the time since the invocation started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}
