//! End-to-end tests for validating and grading authored lessons.

use std::collections::HashMap;
use std::path::PathBuf;

use lingo_core::{
    decode_lesson, decode_lesson_str, grade, grade_lesson, validate, validate_json,
    validate_lesson, ContractError, Exercise, ExerciseType, SubmittedAnswer, ViolationCode,
};
use serde_json::{json, Value};

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path().join(name))
        .unwrap_or_else(|e| unreachable!("fixture {name} should be readable: {e}"))
}

#[test]
fn test_fixture_lesson_is_valid() {
    let lesson = decode_lesson_str(&read_fixture("vocab-lesson.json")).expect("lesson decodes");

    assert_eq!(lesson.title, "Colours");
    assert_eq!(lesson.estimated_minutes, Some(10));
    assert_eq!(lesson.exercises.len(), 3);

    let validation = validate_lesson(&lesson.exercises);
    assert!(validation.valid, "{validation:?}");
    assert!(validation.lesson_warnings.is_empty());
}

#[test]
fn test_fixture_with_missing_options_is_invalid() {
    let lesson = decode_lesson_str(&read_fixture("vocab-lesson-missing-options.json"))
        .expect("lesson decodes");

    let validation = validate_lesson(&lesson.exercises);
    assert!(!validation.valid);
    assert_eq!(validation.invalid_count(), 1);
    assert!(validation.per_exercise[0].valid);
    assert!(validation.per_exercise[1].has(ViolationCode::TooFewOptions));
    assert!(validation.per_exercise[1].has(ViolationCode::AnswerNotInOptions));
    assert!(validation.per_exercise[2].valid);
}

/// A true-false exercise answered with a capitalised literal is rejected.
#[test]
fn test_true_false_capitalised_answer_is_invalid() {
    let raw = json!({
        "id": "tf-1",
        "type": "true-false",
        "question": { "text": "\"Verde\" means green." },
        "explanation": "Verde is the Spanish word for green.",
        "points": 5,
        "correctAnswer": ["True"]
    });

    let result = validate_json(&raw).expect("exercise decodes");
    assert!(!result.valid);
    assert!(result.has(ViolationCode::InvalidBooleanAnswer));

    let violation = result.errors().next().expect("one hard violation");
    assert_eq!(violation.code, ViolationCode::InvalidBooleanAnswer);
    assert!(violation.message.contains("True"), "{}", violation.message);
}

#[test]
fn test_grade_fixture_submissions() {
    let lesson = decode_lesson_str(&read_fixture("vocab-lesson.json")).expect("lesson decodes");
    let submissions: HashMap<String, SubmittedAnswer> =
        serde_json::from_str(&read_fixture("submissions.json")).expect("submissions parse");

    let result = grade_lesson(&lesson, &submissions);

    let verdicts: Vec<(&str, bool)> = result
        .results
        .iter()
        .map(|r| (r.id.as_str(), r.correct))
        .collect();
    assert_eq!(
        verdicts,
        [("colours-1", true), ("colours-2", false), ("colours-3", true)]
    );
    assert_eq!(result.score, 25);
    assert_eq!(result.max_score, 30);
    assert_eq!(result.correct_count, 2);
}

#[test]
fn test_missing_submission_grades_incorrect() {
    let lesson = decode_lesson_str(&read_fixture("vocab-lesson.json")).expect("lesson decodes");
    let result = grade_lesson(&lesson, &HashMap::new());

    assert_eq!(result.score, 0);
    assert_eq!(result.max_score, 30);
    assert!(result.results.iter().all(|r| !r.correct && r.points == 0));
}

/// Blank entries in a submitted list are treated as no answer at all.
#[test]
fn test_blank_submission_entries_grade_incorrect() {
    let lesson = decode_lesson_str(&read_fixture("vocab-lesson.json")).expect("lesson decodes");
    let submissions: HashMap<String, SubmittedAnswer> = serde_json::from_value(json!({
        "colours-1": ["   "],
        "colours-3": ["", "el coche rojo"]
    }))
    .expect("submissions parse");

    let result = grade_lesson(&lesson, &submissions);

    assert!(!result.results[0].correct);
    assert!(result.results[2].correct);
    assert_eq!(result.score, 15);
}

#[test]
fn test_multiple_choice_set_equality() {
    let exercise = Exercise::new(
        "mc-1",
        ExerciseType::MultipleChoice,
        "Which are colours?",
        "Red and blue are colours.",
        10,
    )
    .with_options(["red", "blue", "green"])
    .with_answers(["red", "blue"]);
    assert!(validate(&exercise).valid);

    let cases: [(&[&str], bool); 5] = [
        (&["blue", "red"], true),
        (&["red", "blue"], true),
        (&["red", "blue", "red"], true),
        (&["red"], false),
        (&["red", "blue", "green"], false),
    ];
    for (submitted, expected) in cases {
        let answer = SubmittedAnswer::from(submitted.to_vec());
        assert_eq!(grade(&exercise, Some(&answer)).correct, expected, "{submitted:?}");
    }
}

#[test]
fn test_grading_ignores_case_and_whitespace() {
    let exercise = Exercise::new(
        "fib-1",
        ExerciseType::FillInTheBlank,
        "The sky is ___.",
        "Clear skies are blue.",
        5,
    )
    .with_options(["blue", "green"])
    .with_answers(["blue"]);

    assert!(grade(&exercise, Some(&SubmittedAnswer::from("  BLUE  "))).correct);
    assert!(!grade(&exercise, Some(&SubmittedAnswer::from("green"))).correct);
}

#[test]
fn test_lesson_without_exercises_is_contract_violation() {
    let raw: Value = json!({ "title": "Empty shell" });
    assert!(matches!(
        decode_lesson(&raw),
        Err(ContractError::Malformed(_))
    ));
}
