//! Contract decoding at the boundary where content enters the system.
//!
//! Raw JSON from an authoring form or a content provider is checked here for
//! shape before it becomes a typed [`Exercise`] or [`Lesson`]. Shape problems
//! (unknown exercise type, missing common fields, wrong JSON kinds) are
//! contract violations: they signal a broken integration rather than a
//! defective exercise, and are returned as [`ContractError`] instead of as
//! validation findings.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{AnswerOption, Difficulty, Exercise, ExerciseType, Lesson, Question};

/// Fields every exercise object must carry.
const REQUIRED_FIELDS: [&str; 3] = ["question", "explanation", "points"];

/// Errors raised when raw content does not match the exercise contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    /// The `type` field names a type outside the closed set.
    #[error("exercise {index}: unknown exercise type '{value}' (expected one of: {expected})")]
    UnknownExerciseType {
        /// Position of the exercise in its lesson (0 for single exercises).
        index: usize,
        /// The offending value, rendered as JSON.
        value: String,
        /// Comma-separated list of accepted type names.
        expected: String,
    },

    /// A required field is absent from the exercise object.
    #[error("exercise {index}: missing required field '{field}'")]
    MissingField {
        /// Position of the exercise in its lesson.
        index: usize,
        /// Name of the missing field.
        field: String,
    },

    /// A field is present but has the wrong shape.
    #[error("exercise {index}: invalid field '{field}': {message}")]
    InvalidField {
        /// Position of the exercise in its lesson.
        index: usize,
        /// Name of the field.
        field: String,
        /// Decoder message.
        message: String,
    },

    /// The payload as a whole does not have the expected shape.
    #[error("malformed content: {0}")]
    Malformed(String),
}

impl ContractError {
    /// Creates a new `UnknownExerciseType` error.
    #[must_use]
    pub fn unknown_type(index: usize, value: &Value) -> Self {
        let expected = ExerciseType::ALL
            .iter()
            .map(ExerciseType::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self::UnknownExerciseType {
            index,
            value: value.to_string(),
            expected,
        }
    }

    /// Creates a new `MissingField` error.
    #[must_use]
    pub fn missing_field(index: usize, field: impl Into<String>) -> Self {
        Self::MissingField {
            index,
            field: field.into(),
        }
    }

    /// Creates a new `InvalidField` error.
    #[must_use]
    pub fn invalid_field(
        index: usize,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            index,
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Decodes a single exercise object.
pub fn decode_exercise(value: &Value) -> Result<Exercise, ContractError> {
    decode_exercise_at(0, value)
}

/// Decodes an array of exercise objects, preserving order.
pub fn decode_exercises(value: &Value) -> Result<Vec<Exercise>, ContractError> {
    let items = value
        .as_array()
        .ok_or_else(|| ContractError::malformed("'exercises' must be an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_exercise_at(index, item))
        .collect()
}

/// Decodes a lesson object: optional metadata plus a required `exercises` array.
pub fn decode_lesson(value: &Value) -> Result<Lesson, ContractError> {
    let object = value
        .as_object()
        .ok_or_else(|| ContractError::malformed("lesson must be a JSON object"))?;
    let exercises_value = object
        .get("exercises")
        .ok_or_else(|| ContractError::malformed("lesson is missing the 'exercises' array"))?;
    let exercises = decode_exercises(exercises_value)?;

    // Metadata is decoded separately so that exercise errors keep their index.
    let mut metadata = object.clone();
    metadata.insert("exercises".to_string(), Value::Array(Vec::new()));
    let mut lesson: Lesson = serde_json::from_value(Value::Object(metadata))
        .map_err(|e| ContractError::malformed(format!("lesson metadata: {e}")))?;
    lesson.exercises = exercises;
    Ok(lesson)
}

/// Parses text as JSON and decodes it as a lesson.
pub fn decode_lesson_str(text: &str) -> Result<Lesson, ContractError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ContractError::malformed(format!("invalid JSON: {e}")))?;
    decode_lesson(&value)
}

fn decode_exercise_at(index: usize, value: &Value) -> Result<Exercise, ContractError> {
    let object = value.as_object().ok_or_else(|| {
        ContractError::malformed(format!("exercise {index} must be a JSON object"))
    })?;

    check_type(index, object)?;
    for field in REQUIRED_FIELDS {
        if object.get(field).map_or(true, Value::is_null) {
            return Err(ContractError::missing_field(index, field));
        }
    }

    // Optional fields sent as null are treated as absent.
    let mut object = object.clone();
    object.retain(|_, v| !v.is_null());

    check_field::<Question>(index, &object, "question")?;
    check_field::<String>(index, &object, "explanation")?;
    check_field::<i64>(index, &object, "points")?;
    check_field::<String>(index, &object, "id")?;
    check_field::<Difficulty>(index, &object, "difficulty")?;
    check_field::<Vec<AnswerOption>>(index, &object, "options")?;
    check_field::<Vec<String>>(index, &object, "correctAnswer")?;

    serde_json::from_value(Value::Object(object))
        .map_err(|e| ContractError::malformed(format!("exercise {index}: {e}")))
}

fn check_type(index: usize, object: &Map<String, Value>) -> Result<ExerciseType, ContractError> {
    let value = object
        .get("type")
        .ok_or_else(|| ContractError::missing_field(index, "type"))?;
    value
        .as_str()
        .and_then(ExerciseType::from_wire)
        .ok_or_else(|| ContractError::unknown_type(index, value))
}

/// Decodes one field on its own so a shape error can name the field.
fn check_field<T: DeserializeOwned>(
    index: usize,
    object: &Map<String, Value>,
    field: &str,
) -> Result<(), ContractError> {
    match object.get(field) {
        Some(value) => T::deserialize(value)
            .map(|_| ())
            .map_err(|e| ContractError::invalid_field(index, field, e.to_string())),
        None => Ok(()),
    }
}
