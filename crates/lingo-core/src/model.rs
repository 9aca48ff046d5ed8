//! Exercise and lesson data types.
//!
//! These types mirror the JSON shape exchanged with authoring forms, the
//! persistence backend and the content provider. Field names are camelCase on
//! the wire; the exercise type travels in the `type` field.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// ExerciseType
// ============================================================================

/// The closed set of exercise variants.
///
/// Adding a variant requires a matching entry in [`crate::registry`]; every
/// consumer matches on this enum exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseType {
    /// Select every correct option (set semantics).
    MultipleChoice,
    /// Select the one correct option.
    SingleChoice,
    /// Fill a gap, choosing from or typing one of the accepted values.
    FillInTheBlank,
    /// Decide whether a statement is true or false.
    TrueFalse,
    /// Translate a sentence; alternatives are accepted.
    Translation,
}

impl ExerciseType {
    /// Every exercise type, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::MultipleChoice,
        Self::SingleChoice,
        Self::FillInTheBlank,
        Self::TrueFalse,
        Self::Translation,
    ];

    /// Returns the wire name of this type (e.g. `"fill-in-the-blank"`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple-choice",
            Self::SingleChoice => "single-choice",
            Self::FillInTheBlank => "fill-in-the-blank",
            Self::TrueFalse => "true-false",
            Self::Translation => "translation",
        }
    }

    /// Parses a wire name. Matching is exact: the stored form is lower-case.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Difficulty
// ============================================================================

/// Difficulty level shared by exercises and lessons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Entry level (default).
    #[default]
    Beginner,
    /// Intermediate level.
    Intermediate,
    /// Advanced level.
    Advanced,
}

impl Difficulty {
    /// Returns the wire name of this difficulty.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Exercise
// ============================================================================

/// One selectable option of a choice-style exercise.
///
/// Options are compared by `value` only; `translate` is display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// The option text, also the value stored in `correctAnswer`.
    pub value: String,

    /// Optional translation shown next to the option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<String>,
}

impl AnswerOption {
    /// Creates an option without a translation.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            translate: None,
        }
    }
}

/// The question prompt of an exercise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Prompt text shown to the learner.
    pub text: String,

    /// Optional translation of the prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<String>,
}

impl Question {
    /// Creates a question without a translation.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            translate: None,
        }
    }
}

/// A single gradable exercise.
///
/// The struct deliberately holds every type-specific field regardless of
/// `kind`, so that malformed content (e.g. a true-false exercise carrying
/// options) can be represented and reported by the validator instead of
/// being rejected at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    /// Opaque identifier, unique within a lesson.
    #[serde(default)]
    pub id: String,

    /// The exercise variant.
    #[serde(rename = "type")]
    pub kind: ExerciseType,

    /// The prompt.
    pub question: Question,

    /// Explanation shown after grading.
    pub explanation: String,

    /// Points awarded for a correct answer, expected in `[1, 100]`.
    pub points: i64,

    /// Difficulty of this exercise.
    #[serde(default)]
    pub difficulty: Difficulty,

    /// Selectable options; empty for true-false and translation.
    #[serde(default)]
    pub options: Vec<AnswerOption>,

    /// Accepted answers.
    #[serde(default)]
    pub correct_answer: Vec<String>,
}

impl Exercise {
    /// Creates an exercise with default difficulty and no options or answers.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        kind: ExerciseType,
        question: impl Into<String>,
        explanation: impl Into<String>,
        points: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            question: Question::new(question),
            explanation: explanation.into(),
            points,
            difficulty: Difficulty::default(),
            options: Vec::new(),
            correct_answer: Vec::new(),
        }
    }

    /// Replaces the options with plain values.
    #[must_use]
    pub fn with_options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = values.into_iter().map(AnswerOption::new).collect();
        self
    }

    /// Replaces the correct answers.
    #[must_use]
    pub fn with_answers<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correct_answer = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the difficulty.
    #[must_use]
    pub const fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }
}

// ============================================================================
// Lesson
// ============================================================================

/// A lesson: metadata plus an ordered list of exercises.
///
/// Exercise order is presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Lesson title.
    #[serde(default)]
    pub title: String,

    /// Short description shown in the course outline.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Overall difficulty.
    #[serde(default)]
    pub difficulty: Difficulty,

    /// Estimated completion time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,

    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Exercises in presentation order.
    pub exercises: Vec<Exercise>,
}

// ============================================================================
// SubmittedAnswer
// ============================================================================

/// A learner's submission for one exercise.
///
/// Deserialized untagged so that the student runtime can send whatever its
/// widget produced: a string, a list of selected values, a boolean or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    /// A boolean, used by true-false widgets.
    Boolean(bool),
    /// A number, stringified before comparison.
    Number(serde_json::Number),
    /// Free text or a single selected value.
    Text(String),
    /// Several selected values.
    Choices(Vec<String>),
}

impl From<&str> for SubmittedAnswer {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SubmittedAnswer {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for SubmittedAnswer {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Vec<&str>> for SubmittedAnswer {
    fn from(values: Vec<&str>) -> Self {
        Self::Choices(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for SubmittedAnswer {
    fn from(values: Vec<String>) -> Self {
        Self::Choices(values)
    }
}
