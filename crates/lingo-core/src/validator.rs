//! Content validator.
//!
//! Checks a candidate [`Exercise`] against the structural rules published by
//! the [registry](crate::registry). Defects are returned as data, never as
//! errors: the same result feeds inline form errors in the authoring flow and
//! the retry decision in the lesson generator.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{self, ContractError};
use crate::model::Exercise;
use crate::registry::{
    rules_for, AnswerArity, AnswerDomain, OptionsRule, TypeRules, BOOLEAN_ANSWERS, POINTS_RANGE,
};

// ============================================================================
// Violation
// ============================================================================

/// Machine-readable violation codes.
///
/// Serialized in SCREAMING_SNAKE_CASE so authoring forms can map them to
/// localized messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    /// `correctAnswer` is empty.
    EmptyAnswer,
    /// An option-bearing exercise has fewer than two options.
    TooFewOptions,
    /// A correct answer is not among the option values.
    AnswerNotInOptions,
    /// A single-choice exercise stores other than exactly one answer.
    MultipleSingleChoiceAnswers,
    /// Options present on a type that forbids them.
    UnexpectedOptions,
    /// A true-false answer other than `["true"]` or `["false"]`.
    InvalidBooleanAnswer,
    /// The first translation answer is blank.
    BlankTranslation,
    /// Points outside `[1, 100]`.
    PointsOutOfRange,
    /// Empty explanation.
    MissingExplanation,
    /// Blank question text.
    BlankQuestion,
    /// An option with a blank value.
    BlankOption,
    /// Two options share a value.
    DuplicateOption,
    /// Two exercises in a lesson share an id.
    DuplicateExerciseId,
    /// The exercise type is outside the types a lesson allows.
    DisallowedExerciseType,
}

impl ViolationCode {
    /// Returns the wire form of the code (e.g. `"EMPTY_ANSWER"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyAnswer => "EMPTY_ANSWER",
            Self::TooFewOptions => "TOO_FEW_OPTIONS",
            Self::AnswerNotInOptions => "ANSWER_NOT_IN_OPTIONS",
            Self::MultipleSingleChoiceAnswers => "MULTIPLE_SINGLE_CHOICE_ANSWERS",
            Self::UnexpectedOptions => "UNEXPECTED_OPTIONS",
            Self::InvalidBooleanAnswer => "INVALID_BOOLEAN_ANSWER",
            Self::BlankTranslation => "BLANK_TRANSLATION",
            Self::PointsOutOfRange => "POINTS_OUT_OF_RANGE",
            Self::MissingExplanation => "MISSING_EXPLANATION",
            Self::BlankQuestion => "BLANK_QUESTION",
            Self::BlankOption => "BLANK_OPTION",
            Self::DuplicateOption => "DUPLICATE_OPTION",
            Self::DuplicateExerciseId => "DUPLICATE_EXERCISE_ID",
            Self::DisallowedExerciseType => "DISALLOWED_EXERCISE_TYPE",
        }
    }

    /// Returns the severity this code is always reported with.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::MultipleSingleChoiceAnswers
            | Self::DuplicateOption
            | Self::DuplicateExerciseId => Severity::Soft,
            _ => Severity::Hard,
        }
    }

    /// Returns a default English description for authoring UIs.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::EmptyAnswer => "At least one correct answer is required",
            Self::TooFewOptions => "At least two options are required",
            Self::AnswerNotInOptions => "Every correct answer must be one of the options",
            Self::MultipleSingleChoiceAnswers => {
                "Single-choice exercises should have exactly one correct answer"
            }
            Self::UnexpectedOptions => "This exercise type does not take options",
            Self::InvalidBooleanAnswer => "The correct answer must be \"true\" or \"false\"",
            Self::BlankTranslation => "The accepted translation must not be blank",
            Self::PointsOutOfRange => "Points must be between 1 and 100",
            Self::MissingExplanation => "An explanation is required",
            Self::BlankQuestion => "The question text must not be blank",
            Self::BlankOption => "Options must not be blank",
            Self::DuplicateOption => "Options should be distinct",
            Self::DuplicateExerciseId => "Exercise ids should be unique within a lesson",
            Self::DisallowedExerciseType => "This exercise type is not allowed in this lesson",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a violation blocks validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks validity.
    Hard,
    /// Reported, but the exercise stays valid.
    Soft,
}

/// A single invariant failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Machine-readable code.
    pub code: ViolationCode,
    /// Hard or soft.
    pub severity: Severity,
    /// Human-readable detail.
    pub message: String,
    /// Offending values, when the check concerns specific values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl Violation {
    /// Creates a violation with the code's default severity and description.
    #[must_use]
    pub fn new(code: ViolationCode) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: code.description().to_string(),
            values: Vec::new(),
        }
    }

    /// Attaches offending values and appends them to the message.
    #[must_use]
    pub fn with_values(mut self, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.message = format!("{}: {}", self.message, values.join(", "));
        }
        self.values = values;
        self
    }

    /// Returns `true` if this violation makes the exercise invalid.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Hard
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of validating one exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `true` if there is no hard violation.
    pub valid: bool,
    /// Every finding, hard and soft, in check order.
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: !violations.iter().any(Violation::is_error),
            violations,
        }
    }

    /// Adds a finding from a check outside this module, keeping `valid` in step.
    pub fn push(&mut self, violation: Violation) {
        self.valid &= !violation.is_error();
        self.violations.push(violation);
    }

    /// Returns the hard violations.
    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    /// Returns the soft warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_error())
    }

    /// Returns `true` if a violation with `code` was reported.
    #[must_use]
    pub fn has(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }
}

/// Outcome of validating every exercise of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonValidation {
    /// `true` iff every exercise is valid.
    pub valid: bool,
    /// One result per exercise, in lesson order.
    pub per_exercise: Vec<ValidationResult>,
    /// Findings about the lesson as a whole; always soft.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lesson_warnings: Vec<Violation>,
}

impl LessonValidation {
    /// Returns the number of invalid exercises.
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.per_exercise.iter().filter(|r| !r.valid).count()
    }

    /// Returns the total number of hard violations across exercises.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.per_exercise.iter().map(|r| r.errors().count()).sum()
    }

    /// Adds a finding to the exercise at `index`, keeping `valid` in step.
    ///
    /// An out-of-range index is ignored.
    pub fn push(&mut self, index: usize, violation: Violation) {
        if let Some(result) = self.per_exercise.get_mut(index) {
            result.push(violation);
            self.valid = self.per_exercise.iter().all(|r| r.valid);
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validates one exercise.
///
/// Pure: the same exercise always yields the same result.
///
/// # Examples
///
/// ```
/// use lingo_core::{validate, Exercise, ExerciseType, ViolationCode};
///
/// let exercise = Exercise::new("q1", ExerciseType::TrueFalse, "Cats bark.", "They meow.", 5)
///     .with_answers(["True"]);
///
/// let result = validate(&exercise);
/// assert!(!result.valid);
/// assert!(result.has(ViolationCode::InvalidBooleanAnswer));
/// ```
#[must_use]
pub fn validate(exercise: &Exercise) -> ValidationResult {
    let rules = rules_for(exercise.kind);
    let mut violations = Vec::new();

    check_common(exercise, &mut violations);
    check_options(exercise, rules, &mut violations);
    check_answers(exercise, rules, &mut violations);

    ValidationResult::from_violations(violations)
}

/// Validates every exercise of a lesson, in order.
#[must_use]
pub fn validate_lesson(exercises: &[Exercise]) -> LessonValidation {
    let per_exercise: Vec<ValidationResult> = exercises.iter().map(validate).collect();

    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for exercise in exercises {
        if !exercise.id.is_empty()
            && !seen.insert(exercise.id.as_str())
            && !duplicates.contains(&exercise.id)
        {
            duplicates.push(exercise.id.clone());
        }
    }
    let lesson_warnings = if duplicates.is_empty() {
        Vec::new()
    } else {
        vec![Violation::new(ViolationCode::DuplicateExerciseId).with_values(duplicates)]
    };

    LessonValidation {
        valid: per_exercise.iter().all(|r| r.valid),
        per_exercise,
        lesson_warnings,
    }
}

/// Decodes raw JSON as an exercise and validates it.
///
/// A shape problem (unknown type, missing common field) is a contract error;
/// anything the decoder accepts is judged by [`validate`].
pub fn validate_json(value: &Value) -> Result<ValidationResult, ContractError> {
    contract::decode_exercise(value).map(|exercise| validate(&exercise))
}

/// Decodes a raw JSON array of exercises and validates them as a lesson.
pub fn validate_lesson_json(value: &Value) -> Result<LessonValidation, ContractError> {
    contract::decode_exercises(value).map(|exercises| validate_lesson(&exercises))
}

fn check_common(exercise: &Exercise, violations: &mut Vec<Violation>) {
    if exercise.question.text.trim().is_empty() {
        violations.push(Violation::new(ViolationCode::BlankQuestion));
    }
    if exercise.explanation.trim().is_empty() {
        violations.push(Violation::new(ViolationCode::MissingExplanation));
    }
    if !POINTS_RANGE.contains(&exercise.points) {
        violations.push(
            Violation::new(ViolationCode::PointsOutOfRange)
                .with_values(vec![exercise.points.to_string()]),
        );
    }
}

fn check_options(exercise: &Exercise, rules: &TypeRules, violations: &mut Vec<Violation>) {
    match rules.options {
        OptionsRule::Forbidden => {
            if !exercise.options.is_empty() {
                violations.push(Violation::new(ViolationCode::UnexpectedOptions));
            }
        }
        OptionsRule::Required { min } => {
            if exercise.options.len() < min {
                violations.push(
                    Violation::new(ViolationCode::TooFewOptions)
                        .with_values(vec![exercise.options.len().to_string()]),
                );
            }
            if exercise.options.iter().any(|o| o.value.trim().is_empty()) {
                violations.push(Violation::new(ViolationCode::BlankOption));
            }
            let mut seen = HashSet::new();
            let repeated: Vec<String> = exercise
                .options
                .iter()
                .filter(|o| !seen.insert(o.value.as_str()))
                .map(|o| o.value.clone())
                .collect();
            if !repeated.is_empty() {
                violations
                    .push(Violation::new(ViolationCode::DuplicateOption).with_values(repeated));
            }
        }
    }
}

fn check_answers(exercise: &Exercise, rules: &TypeRules, violations: &mut Vec<Violation>) {
    let answers = &exercise.correct_answer;
    if answers.is_empty() {
        violations.push(Violation::new(ViolationCode::EmptyAnswer));
    }

    match rules.domain {
        AnswerDomain::FromOptions => {
            let values: HashSet<&str> =
                exercise.options.iter().map(|o| o.value.as_str()).collect();
            let missing: Vec<String> = answers
                .iter()
                .filter(|a| !values.contains(a.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                violations
                    .push(Violation::new(ViolationCode::AnswerNotInOptions).with_values(missing));
            }
        }
        AnswerDomain::BooleanLiteral => {
            let is_literal = answers.len() == 1 && BOOLEAN_ANSWERS.contains(&answers[0].as_str());
            if !answers.is_empty() && !is_literal {
                violations.push(
                    Violation::new(ViolationCode::InvalidBooleanAnswer)
                        .with_values(answers.clone()),
                );
            }
        }
        AnswerDomain::FreeText => {
            if answers.first().is_some_and(|a| a.trim().is_empty()) {
                violations.push(Violation::new(ViolationCode::BlankTranslation));
            }
        }
    }

    if rules.arity == AnswerArity::ExactlyOneSoft && answers.len() > 1 {
        violations.push(
            Violation::new(ViolationCode::MultipleSingleChoiceAnswers)
                .with_values(vec![answers.len().to_string()]),
        );
    }
}
