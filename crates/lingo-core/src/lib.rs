//! Lingo core: the exercise type system.
//!
//! This crate holds the pure, synchronous parts of the exercise engine:
//!
//! - [`model`]: exercise, lesson and submission types
//! - [`registry`]: per-type structural rules and grading modes
//! - [`contract`]: decoding raw JSON at the boundary
//! - [`validator`]: structural validation of exercises and lessons
//! - [`grader`]: answer normalization and grading

pub mod contract;
pub mod grader;
pub mod model;
pub mod registry;
pub mod validator;

pub use contract::{
    decode_exercise, decode_exercises, decode_lesson, decode_lesson_str, ContractError,
};
pub use grader::{grade, grade_lesson, normalize, ExerciseGrade, GradeResult, LessonGrade};
pub use model::{
    AnswerOption, Difficulty, Exercise, ExerciseType, Lesson, Question, SubmittedAnswer,
};
pub use registry::{rules_for, GradingMode, TypeRules};
pub use validator::{
    validate, validate_json, validate_lesson, validate_lesson_json, LessonValidation, Severity,
    ValidationResult, Violation, ViolationCode,
};
