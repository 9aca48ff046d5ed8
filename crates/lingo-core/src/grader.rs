//! Answer grader.
//!
//! Compares a learner's submission with an exercise's correct answers after
//! normalization. Grading never fails: a missing or unusable submission is
//! simply incorrect.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Exercise, Lesson, SubmittedAnswer};
use crate::registry::{rules_for, GradingMode};

/// Outcome of grading one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    /// Whether the submission matches.
    pub correct: bool,
}

/// Per-exercise entry of a [`LessonGrade`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseGrade {
    /// Exercise id.
    pub id: String,
    /// Whether the submission matched.
    pub correct: bool,
    /// Points earned: the exercise's points when correct, otherwise 0.
    pub points: i64,
}

/// Outcome of grading a whole lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonGrade {
    /// Results in presentation order.
    pub results: Vec<ExerciseGrade>,
    /// Sum of points of correctly answered exercises.
    pub score: i64,
    /// Sum of points of all exercises.
    pub max_score: i64,
    /// Number of correctly answered exercises.
    pub correct_count: usize,
}

/// Normalizes a single value for comparison: trims and lower-cases.
#[must_use]
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Normalizes a submission into its set of distinct values.
///
/// Returns `None` when the submission carries nothing to compare.
fn submitted_values(answer: &SubmittedAnswer) -> Option<BTreeSet<String>> {
    let values: BTreeSet<String> = match answer {
        SubmittedAnswer::Boolean(b) => std::iter::once(b.to_string()).collect(),
        SubmittedAnswer::Number(n) => std::iter::once(normalize(&n.to_string())).collect(),
        SubmittedAnswer::Text(text) => {
            if text.trim().is_empty() {
                return None;
            }
            std::iter::once(normalize(text)).collect()
        }
        SubmittedAnswer::Choices(items) => items
            .iter()
            .map(|s| normalize(s))
            .filter(|s| !s.is_empty())
            .collect(),
    };
    (!values.is_empty()).then_some(values)
}

/// Grades one submission against an exercise.
///
/// # Examples
///
/// ```
/// use lingo_core::{grade, Exercise, ExerciseType, SubmittedAnswer};
///
/// let exercise =
///     Exercise::new("q1", ExerciseType::MultipleChoice, "Pick colours", "Red and blue.", 10)
///         .with_options(["red", "blue", "green"])
///         .with_answers(["red", "blue"]);
///
/// let answer = SubmittedAnswer::from(vec!["Blue", " red "]);
/// assert!(grade(&exercise, Some(&answer)).correct);
/// assert!(!grade(&exercise, None).correct);
/// ```
#[must_use]
pub fn grade(exercise: &Exercise, submitted: Option<&SubmittedAnswer>) -> GradeResult {
    let Some(submitted) = submitted.and_then(submitted_values) else {
        return GradeResult { correct: false };
    };

    let correct = match rules_for(exercise.kind).grading {
        GradingMode::SetEquality => {
            let expected: BTreeSet<String> = exercise
                .correct_answer
                .iter()
                .map(|s| normalize(s))
                .filter(|s| !s.is_empty())
                .collect();
            !expected.is_empty() && submitted == expected
        }
        GradingMode::AnyOf => {
            // A list only counts when it collapses to one value.
            submitted.len() == 1
                && submitted.iter().next().is_some_and(|value| {
                    exercise
                        .correct_answer
                        .iter()
                        .any(|accepted| normalize(accepted) == *value)
                })
        }
    };

    GradeResult { correct }
}

/// Grades every exercise of a lesson against submissions keyed by exercise id.
///
/// Exercises without a submission are graded incorrect.
#[must_use]
pub fn grade_lesson<S: std::hash::BuildHasher>(
    lesson: &Lesson,
    submissions: &HashMap<String, SubmittedAnswer, S>,
) -> LessonGrade {
    let results: Vec<ExerciseGrade> = lesson
        .exercises
        .iter()
        .map(|exercise| {
            let correct = grade(exercise, submissions.get(&exercise.id)).correct;
            ExerciseGrade {
                id: exercise.id.clone(),
                correct,
                points: if correct { exercise.points } else { 0 },
            }
        })
        .collect();

    LessonGrade {
        score: saturating_sum(results.iter().map(|r| r.points)),
        max_score: saturating_sum(lesson.exercises.iter().map(|e| e.points)),
        correct_count: results.iter().filter(|r| r.correct).count(),
        results,
    }
}

/// Sums points without overflowing on unvalidated lessons.
fn saturating_sum(points: impl Iterator<Item = i64>) -> i64 {
    points.fold(0, i64::saturating_add)
}
