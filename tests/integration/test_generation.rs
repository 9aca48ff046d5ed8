//! End-to-end tests for the lesson generation loop.
//!
//! A scripted provider stands in for the model so the retry behaviour can be
//! observed call by call, with provider responses read from JSON fixtures.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lingo_core::{ExerciseType, ViolationCode};
use lingo_generator::{
    AttemptFailure, Config, ContentProvider, GenerationPhase, GeneratorError, GeneratorConfig,
    LessonBrief, LessonGenerator, LessonType, PromptPayload, ProviderError,
};
use tokio_util::sync::CancellationToken;

/// Path to the fixtures directory.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path().join(name))
        .unwrap_or_else(|e| unreachable!("fixture {name} should be readable: {e}"))
}

/// Replays canned responses in order, repeating the last one.
struct ScriptedProvider {
    responses: Vec<String>,
    calls: AtomicU32,
    briefs: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            calls: AtomicU32::new(0),
            briefs: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentProvider for ScriptedProvider {
    async fn generate_content(&self, payload: &PromptPayload) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        if let Ok(mut briefs) = self.briefs.lock() {
            briefs.push(payload.brief.topic.clone());
        }
        let index = call.min(self.responses.len() - 1);
        Ok(self.responses[index].clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn vocab_brief() -> LessonBrief {
    let mut brief = LessonBrief::new("Colours");
    brief.lesson_type = LessonType::Vocab;
    brief.exercise_count = 3;
    brief.exercise_types = vec![
        ExerciseType::MultipleChoice,
        ExerciseType::TrueFalse,
        ExerciseType::Translation,
    ];
    brief
}

/// A 3-exercise vocab lesson whose first draft has a multiple-choice exercise
/// without options is accepted on the second call.
#[tokio::test]
async fn test_vocab_lesson_retries_until_valid() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        read_fixture("vocab-lesson-missing-options.json"),
        read_fixture("vocab-lesson.json"),
    ]));
    let generator = LessonGenerator::new(provider.clone(), &GeneratorConfig::default());

    let outcome = generator
        .generate(&vocab_brief(), &CancellationToken::new())
        .await
        .expect("generation should succeed");

    assert_eq!(provider.calls(), 2);
    assert_eq!(outcome.phase, GenerationPhase::Accepted);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.warnings.is_empty());
    assert!(outcome.review_banner().is_none());

    // The lesson returned is the second attempt's.
    assert_eq!(outcome.lesson.exercises.len(), 3);
    assert_eq!(outcome.lesson.exercises[0].options.len(), 3);
    assert_eq!(outcome.lesson.description, "Basic colour words in Spanish");

    let first = &outcome.history[0];
    assert!(!first.accepted);
    assert_eq!(
        first.failure,
        Some(AttemptFailure::Invalid {
            invalid_exercises: 1,
            errors: 2,
        })
    );
    assert!(outcome.history[1].accepted);
    assert_eq!(
        provider.briefs.lock().expect("lock").as_slice(),
        ["Colours", "Colours"]
    );
}

/// An always-invalid provider is called exactly `maxAttempts` times and the
/// last draft comes back with its violations.
#[tokio::test]
async fn test_always_invalid_provider_returns_degraded_draft() {
    let provider = Arc::new(ScriptedProvider::new(vec![read_fixture(
        "vocab-lesson-missing-options.json",
    )]));
    let config = Config::load_from_file(&fixture_path().join("lingo.json"))
        .expect("fixture config should load");
    let generator = LessonGenerator::new(provider.clone(), &config.generator);

    let outcome = generator
        .generate(&vocab_brief(), &CancellationToken::new())
        .await
        .expect("a draft should be returned");

    assert_eq!(provider.calls(), 2);
    assert_eq!(outcome.phase, GenerationPhase::Exhausted);
    assert!(outcome.is_degraded());
    assert_eq!(outcome.warnings.len(), 2);

    // Only the second exercise is broken.
    for warning in &outcome.warnings {
        assert_eq!(warning.exercise_index, 1);
        assert_eq!(warning.exercise_id, "colours-2");
    }
    assert_eq!(
        outcome.warnings[0].violation.code,
        ViolationCode::TooFewOptions
    );
    assert_eq!(
        outcome.warnings[1].violation.code,
        ViolationCode::AnswerNotInOptions
    );
    assert_eq!(outcome.warnings[1].violation.values, vec!["rojo", "azul"]);
    assert_eq!(
        outcome.review_banner(),
        Some("Review suggested: 2 issues found")
    );

    // Metadata the provider left out is filled from the brief.
    assert_eq!(outcome.lesson.estimated_minutes, Some(15));
    assert_eq!(outcome.lesson.tags, vec!["vocab".to_string()]);
}

/// Responses that never parse leave nothing to return.
#[tokio::test]
async fn test_unparseable_responses_fail_generation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        "I'm sorry, I can't help with that.".to_string(),
    ]));
    let generator = LessonGenerator::new(provider.clone(), &GeneratorConfig::default());

    let err = generator
        .generate(&vocab_brief(), &CancellationToken::new())
        .await
        .expect_err("generation should fail");

    assert_eq!(provider.calls(), 3);
    assert!(matches!(err, GeneratorError::GenerationFailed { attempts: 3, .. }));
    assert!(err.is_fatal());
}

/// A lesson with an unknown exercise type is a contract violation on every
/// attempt.
#[tokio::test]
async fn test_unknown_exercise_type_fails_generation() {
    let lesson = read_fixture("vocab-lesson.json").replace("\"translation\"", "\"matching\"");
    let provider = Arc::new(ScriptedProvider::new(vec![lesson]));
    let generator = LessonGenerator::new(provider.clone(), &GeneratorConfig::default());

    let err = generator
        .generate(&vocab_brief(), &CancellationToken::new())
        .await
        .expect_err("generation should fail");

    match err {
        GeneratorError::GenerationFailed { last_failure, .. } => {
            assert!(last_failure.contains("matching"), "{last_failure}");
        }
        other => unreachable!("unexpected error: {other}"),
    }
}

/// A lesson with fewer exercises than the brief asks for is never returned.
#[tokio::test]
async fn test_short_lesson_fails_generation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        r#"{ "title": "Colours", "exercises": [] }"#.to_string(),
    ]));
    let generator = LessonGenerator::new(provider.clone(), &GeneratorConfig::default());

    let err = generator
        .generate(&vocab_brief(), &CancellationToken::new())
        .await
        .expect_err("generation should fail");

    assert_eq!(provider.calls(), 3);
    match err {
        GeneratorError::GenerationFailed { last_failure, .. } => {
            assert!(
                last_failure.contains("expected 3 exercise(s), got 0"),
                "{last_failure}"
            );
        }
        other => unreachable!("unexpected error: {other}"),
    }
}

/// Exercise types outside the brief's list surface as hard warnings.
#[tokio::test]
async fn test_disallowed_exercise_type_returns_degraded_draft() {
    let provider = Arc::new(ScriptedProvider::new(vec![read_fixture("vocab-lesson.json")]));
    let generator = LessonGenerator::new(provider.clone(), &GeneratorConfig::default());
    let mut brief = vocab_brief();
    brief.exercise_types = vec![ExerciseType::MultipleChoice, ExerciseType::Translation];

    let outcome = generator
        .generate(&brief, &CancellationToken::new())
        .await
        .expect("a draft should be returned");

    assert_eq!(provider.calls(), 3);
    assert_eq!(outcome.phase, GenerationPhase::Exhausted);
    assert_eq!(outcome.warnings.len(), 1);

    let warning = &outcome.warnings[0];
    assert_eq!(warning.exercise_id, "colours-2");
    assert_eq!(
        warning.violation.code,
        ViolationCode::DisallowedExerciseType
    );
    assert_eq!(warning.violation.values, vec!["true-false"]);
}

/// Cancelling before the first attempt makes no provider call.
#[tokio::test]
async fn test_cancelled_before_first_attempt() {
    let provider = Arc::new(ScriptedProvider::new(vec![read_fixture("vocab-lesson.json")]));
    let generator = LessonGenerator::new(provider.clone(), &GeneratorConfig::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = generator
        .generate(&vocab_brief(), &cancel)
        .await
        .expect_err("generation should be cancelled");

    assert!(err.is_cancelled());
    assert_eq!(provider.calls(), 0);
}

/// Tests that the sample config loads and overrides only what it names.
#[test]
fn test_sample_config_loads() {
    let config = Config::load_from_file(&fixture_path().join("lingo.json"))
        .expect("Failed to load config");

    assert_eq!(config.generator.max_attempts, 2);
    assert_eq!(config.generator.attempt_timeout_secs, 30);
    assert_eq!(config.provider.base_url, "http://localhost:11434/v1");
    assert_eq!(config.provider.model, "llama3.1");
    assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.server.port, 3000);
}
