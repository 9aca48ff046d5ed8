//! The lesson generation loop.
//!
//! One call to [`LessonGenerator::generate`] runs up to `max_attempts`
//! independent whole-lesson provider calls. Each response is parsed, checked
//! against the exercise contract and validated. The first fully valid lesson
//! is accepted. When the budget runs out, a draft from the final attempt is
//! returned with its violations as warnings; if the final attempt produced no
//! draft, generation fails.

use std::sync::Arc;
use std::time::Duration;

use lingo_core::{
    decode_lesson, validate_lesson, Lesson, LessonValidation, Violation, ViolationCode,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::attempt::{AttemptFailure, GenerationAttempt, GenerationPhase, GenerationState};
use crate::config::GeneratorConfig;
use crate::error::{GeneratorError, Result};
use crate::prompt::{LessonBrief, PromptPayload};
use crate::provider::ContentProvider;

/// Matches a response wrapped in a Markdown code fence.
static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?\s*```\s*$").ok());

/// Longest response preview written to the logs.
const PREVIEW_CHARS: usize = 120;

// ============================================================================
// Outcome
// ============================================================================

/// A hard violation on a returned draft, located by exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationWarning {
    /// Position of the exercise in the lesson.
    pub exercise_index: usize,
    /// Id of the exercise.
    pub exercise_id: String,
    /// The violation.
    #[serde(flatten)]
    pub violation: Violation,
}

/// What a successful generator invocation returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    /// The accepted lesson, or the final attempt's draft.
    pub lesson: Lesson,

    /// `Accepted` or `Exhausted`.
    pub phase: GenerationPhase,

    /// Number of provider calls made.
    pub attempts: u32,

    /// Hard violations left in the returned lesson; empty when accepted.
    pub warnings: Vec<GenerationWarning>,

    /// Full validation of the returned lesson, including soft findings.
    pub validation: LessonValidation,

    /// Banner text for degraded drafts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_banner: Option<String>,

    /// Every attempt, in order.
    pub history: Vec<GenerationAttempt>,
}

impl GenerationOutcome {
    fn new(
        lesson: Lesson,
        validation: LessonValidation,
        phase: GenerationPhase,
        history: Vec<GenerationAttempt>,
    ) -> Self {
        let warnings = if phase == GenerationPhase::Accepted {
            Vec::new()
        } else {
            collect_warnings(&lesson, &validation)
        };
        let review_banner = (!warnings.is_empty())
            .then(|| format!("Review suggested: {} issues found", warnings.len()));
        Self {
            lesson,
            phase,
            attempts: u32::try_from(history.len()).unwrap_or(u32::MAX),
            warnings,
            validation,
            review_banner,
            history,
        }
    }

    /// Returns `true` if the lesson was returned despite remaining violations.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.phase == GenerationPhase::Exhausted
    }

    /// Returns the review banner for a degraded draft, e.g.
    /// "Review suggested: 2 issues found".
    #[must_use]
    pub fn review_banner(&self) -> Option<&str> {
        self.review_banner.as_deref()
    }
}

fn collect_warnings(lesson: &Lesson, validation: &LessonValidation) -> Vec<GenerationWarning> {
    validation
        .per_exercise
        .iter()
        .enumerate()
        .flat_map(|(index, result)| {
            let id = lesson
                .exercises
                .get(index)
                .map(|e| e.id.clone())
                .unwrap_or_default();
            result.errors().map(move |violation| GenerationWarning {
                exercise_index: index,
                exercise_id: id.clone(),
                violation: violation.clone(),
            })
        })
        .collect()
}

// ============================================================================
// LessonGenerator
// ============================================================================

/// Result of one attempt, before the loop decides what to do with it.
enum AttemptResult {
    Accepted(Lesson, LessonValidation),
    Draft(Lesson, LessonValidation, AttemptFailure),
    NoDraft(AttemptFailure),
}

/// Generates lessons through a [`ContentProvider`] with bounded retries.
#[derive(Clone)]
pub struct LessonGenerator {
    provider: Arc<dyn ContentProvider>,
    max_attempts: u32,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for LessonGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonGenerator")
            .field("provider", &self.provider.name())
            .field("max_attempts", &self.max_attempts)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl LessonGenerator {
    /// Creates a generator over a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn ContentProvider>, config: &GeneratorConfig) -> Self {
        Self {
            provider,
            max_attempts: config.max_attempts.max(1),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub const fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs the generation loop for a brief.
    ///
    /// Cancellation is checked before each attempt, never during one.
    ///
    /// # Errors
    ///
    /// - `GeneratorError::InvalidBrief` if the brief is unusable
    /// - `GeneratorError::Cancelled` if `cancel` fired between attempts
    /// - `GeneratorError::GenerationFailed` if no attempt produced a draft
    pub async fn generate(
        &self,
        brief: &LessonBrief,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome> {
        brief.check().map_err(GeneratorError::invalid_brief)?;

        let payload = PromptPayload::for_brief(brief);
        debug!(
            system_len = payload.system.len(),
            user_len = payload.user.len(),
            "Built generation prompt"
        );

        let mut state = GenerationState::new(self.max_attempts);
        let mut history: Vec<GenerationAttempt> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                state.transition(GenerationPhase::Cancelled)?;
                warn!(attempts = state.attempt(), "Lesson generation cancelled");
                return Err(GeneratorError::Cancelled {
                    attempts: state.attempt(),
                });
            }

            let attempt = state.begin_attempt()?;
            let mut record = GenerationAttempt::begin(attempt);
            info!(
                attempt,
                max_attempts = self.max_attempts,
                provider = self.provider.name(),
                topic = %brief.topic,
                "Requesting lesson"
            );

            let result = self
                .run_attempt(&payload, brief, &mut state, &mut record)
                .await?;
            let (failure, draft) = match result {
                AttemptResult::Accepted(lesson, validation) => {
                    state.transition(GenerationPhase::Accepted)?;
                    record.finish(GenerationPhase::Accepted);
                    history.push(record);
                    info!(
                        attempt,
                        exercises = lesson.exercises.len(),
                        elapsed_ms = state.elapsed().num_milliseconds(),
                        "Lesson accepted"
                    );
                    return Ok(GenerationOutcome::new(
                        lesson,
                        validation,
                        GenerationPhase::Accepted,
                        history,
                    ));
                }
                AttemptResult::Draft(lesson, validation, failure) => {
                    (failure, Some((lesson, validation)))
                }
                AttemptResult::NoDraft(failure) => (failure, None),
            };

            record.failure = Some(failure.clone());

            if state.has_budget() {
                state.transition(GenerationPhase::Retrying)?;
                record.finish(GenerationPhase::Retrying);
                history.push(record);
                warn!(attempt, failure = %failure, "Attempt failed, retrying");
                state.transition(GenerationPhase::Requesting)?;
                continue;
            }

            // Only the final attempt's draft is returned.
            if let Some((lesson, validation)) = draft {
                state.transition(GenerationPhase::Exhausted)?;
                record.finish(GenerationPhase::Exhausted);
                history.push(record);
                let outcome = GenerationOutcome::new(
                    lesson,
                    validation,
                    GenerationPhase::Exhausted,
                    history,
                );
                warn!(
                    attempts = outcome.attempts,
                    issues = outcome.warnings.len(),
                    "Retry budget exhausted, returning draft for review"
                );
                return Ok(outcome);
            }

            state.transition(GenerationPhase::Failed)?;
            error!(attempts = state.attempt(), failure = %failure, "Lesson generation failed");
            return Err(GeneratorError::generation_failed(state.attempt(), failure));
        }
    }

    /// Runs one provider round-trip: request, parse, validate.
    async fn run_attempt(
        &self,
        payload: &PromptPayload,
        brief: &LessonBrief,
        state: &mut GenerationState,
        record: &mut GenerationAttempt,
    ) -> Result<AttemptResult> {
        let call = self.provider.generate_content(payload);
        let response = match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(kind = %err.kind, error = %err.message, "Provider call failed");
                return Ok(AttemptResult::NoDraft(AttemptFailure::Provider {
                    error_kind: err.kind,
                    message: err.message,
                }));
            }
            Err(_) => {
                let timeout_ms =
                    u64::try_from(self.attempt_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(timeout_ms, "Provider call timed out");
                return Ok(AttemptResult::NoDraft(AttemptFailure::Timeout { timeout_ms }));
            }
        };

        state.transition(GenerationPhase::Parsing)?;
        record.phase = GenerationPhase::Parsing;
        let mut lesson = match parse_response(&response) {
            Ok(lesson) => lesson,
            Err(failure) => {
                match &failure {
                    AttemptFailure::Contract { message } => {
                        error!(error = %message, "Provider output broke the exercise contract");
                    }
                    _ => warn!(
                        response_len = response.len(),
                        preview = %preview(&response),
                        failure = %failure,
                        "Could not parse provider output"
                    ),
                }
                return Ok(AttemptResult::NoDraft(failure));
            }
        };
        complete_lesson(&mut lesson, brief);

        let expected = usize::try_from(brief.exercise_count).unwrap_or(usize::MAX);
        if lesson.exercises.len() != expected {
            warn!(
                expected,
                actual = lesson.exercises.len(),
                "Provider returned the wrong number of exercises"
            );
            return Ok(AttemptResult::NoDraft(AttemptFailure::ExerciseCount {
                expected: brief.exercise_count,
                actual: lesson.exercises.len(),
            }));
        }

        state.transition(GenerationPhase::Validating)?;
        record.phase = GenerationPhase::Validating;
        let mut validation = validate_lesson(&lesson.exercises);
        flag_disallowed_types(&lesson, brief, &mut validation);
        record.validation = Some(validation.clone());

        if validation.valid {
            return Ok(AttemptResult::Accepted(lesson, validation));
        }

        let failure = AttemptFailure::Invalid {
            invalid_exercises: validation.invalid_count(),
            errors: validation.error_count(),
        };
        Ok(AttemptResult::Draft(lesson, validation, failure))
    }
}

/// Marks exercises whose type the brief does not allow.
fn flag_disallowed_types(
    lesson: &Lesson,
    brief: &LessonBrief,
    validation: &mut LessonValidation,
) {
    let allowed = brief.allowed_types();
    for (index, exercise) in lesson.exercises.iter().enumerate() {
        if !allowed.contains(&exercise.kind) {
            debug!(index, kind = %exercise.kind, "Exercise type not allowed by brief");
            let violation = Violation::new(ViolationCode::DisallowedExerciseType)
                .with_values(vec![exercise.kind.to_string()]);
            validation.push(index, violation);
        }
    }
}

/// Interprets provider text as a lesson.
fn parse_response(text: &str) -> std::result::Result<Lesson, AttemptFailure> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(AttemptFailure::Parse {
            message: "empty response".to_string(),
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| AttemptFailure::Parse {
        message: e.to_string(),
    })?;
    // A bare array is read as the exercise list.
    let value = match value {
        Value::Array(items) => serde_json::json!({ "exercises": items }),
        Value::Object(_) => value,
        other => {
            return Err(AttemptFailure::Parse {
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            })
        }
    };

    decode_lesson(&value).map_err(|e| AttemptFailure::Contract {
        message: e.to_string(),
    })
}

/// Removes a surrounding Markdown code fence, if any.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(re) = CODE_FENCE.as_ref() else {
        return trimmed;
    };
    re.captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str().trim())
}

/// Fills ids and metadata the provider left blank.
fn complete_lesson(lesson: &mut Lesson, brief: &LessonBrief) {
    for exercise in &mut lesson.exercises {
        if exercise.id.trim().is_empty() {
            exercise.id = Uuid::new_v4().to_string();
        }
    }
    if lesson.title.trim().is_empty() {
        lesson.title = brief.topic.trim().to_string();
    }
    if lesson.estimated_minutes.is_none() {
        lesson.estimated_minutes = Some(brief.estimated_minutes);
    }
    if lesson.tags.is_empty() {
        lesson.tags.push(brief.lesson_type.to_string());
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}
