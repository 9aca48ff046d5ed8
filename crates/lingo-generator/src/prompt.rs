//! Lesson briefs and the structured-output prompt sent to the provider.
//!
//! The prompt carries a schema description that enumerates every exercise
//! type with a worked example of its valid shape. The examples are built from
//! the same closed type set the validator checks, and each one validates.

use std::fmt;

use lingo_core::{
    rules_for, AnswerOption, Difficulty, Exercise, ExerciseType, GradingMode, Question,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Kind of lesson being requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    /// Vocabulary.
    #[default]
    Vocab,
    /// Grammar.
    Grammar,
    /// Listening comprehension.
    Listening,
    /// Speaking practice.
    Speaking,
    /// Reading comprehension.
    Reading,
    /// Writing practice.
    Writing,
}

impl LessonType {
    /// Every lesson type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Vocab,
        Self::Grammar,
        Self::Listening,
        Self::Speaking,
        Self::Reading,
        Self::Writing,
    ];

    /// Returns the wire name of this lesson type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vocab => "vocab",
            Self::Grammar => "grammar",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
            Self::Reading => "reading",
            Self::Writing => "writing",
        }
    }

    /// Parses a wire name, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_exercise_count() -> u32 {
    5
}

const fn default_estimated_minutes() -> u32 {
    15
}

/// What a lesson author asks the generator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonBrief {
    /// Lesson topic, e.g. "Ordering food at a restaurant".
    pub topic: String,

    /// Kind of lesson.
    #[serde(default)]
    pub lesson_type: LessonType,

    /// Target difficulty.
    #[serde(default)]
    pub difficulty: Difficulty,

    /// Target duration in minutes.
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u32,

    /// Number of exercises to produce.
    #[serde(default = "default_exercise_count")]
    pub exercise_count: u32,

    /// Exercise types the lesson may use; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exercise_types: Vec<ExerciseType>,
}

impl LessonBrief {
    /// Creates a brief with default type, difficulty, length and exercise count.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            lesson_type: LessonType::default(),
            difficulty: Difficulty::default(),
            estimated_minutes: default_estimated_minutes(),
            exercise_count: default_exercise_count(),
            exercise_types: Vec::new(),
        }
    }

    /// Returns the exercise types the provider may use.
    #[must_use]
    pub fn allowed_types(&self) -> Vec<ExerciseType> {
        if self.exercise_types.is_empty() {
            ExerciseType::ALL.to_vec()
        } else {
            self.exercise_types.clone()
        }
    }

    /// Checks the brief before any provider call.
    ///
    /// Returns a human-readable reason when the brief cannot be served.
    pub fn check(&self) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("topic must not be empty".to_string());
        }
        if self.exercise_count == 0 || self.exercise_count > 50 {
            return Err(format!(
                "exerciseCount must be between 1 and 50 (got {})",
                self.exercise_count
            ));
        }
        if self.estimated_minutes == 0 {
            return Err("estimatedMinutes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Everything one provider call needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayload {
    /// System instructions, including the schema description.
    pub system: String,
    /// The request for this lesson.
    pub user: String,
    /// The brief the prompt was built from.
    pub brief: LessonBrief,
}

impl PromptPayload {
    /// Builds the prompt for a brief.
    #[must_use]
    pub fn for_brief(brief: &LessonBrief) -> Self {
        Self {
            system: system_prompt(&brief.allowed_types()),
            user: user_prompt(brief),
            brief: brief.clone(),
        }
    }
}

const SYSTEM_PREAMBLE: &str = r#"You write lessons for an English-learning platform.

Output:
- Output ONLY one JSON object, no prose and no Markdown.
- The object has the shape {"title": string, "description": string, "difficulty": string,
  "estimatedMinutes": number, "tags": [string], "exercises": [Exercise]}.
- Every exercise has: "id" (string), "type", "question" {"text", "translate"?},
  "explanation" (non-empty), "points" (integer 1..100),
  "difficulty" (beginner | intermediate | advanced)."#;

/// Builds the system prompt with one rule line and one worked example per type.
#[must_use]
pub fn system_prompt(types: &[ExerciseType]) -> String {
    let mut prompt = SYSTEM_PREAMBLE.to_string();
    prompt.push_str("\n\nExercise types (use only these exact type names):\n");
    for kind in types {
        prompt.push_str(&format!(
            "\n- \"{kind}\": {}\n  Example: {}\n",
            type_rule(*kind),
            worked_example(*kind)
        ));
    }
    prompt
}

fn user_prompt(brief: &LessonBrief) -> String {
    format!(
        "Create a {difficulty} {lesson_type} lesson about \"{topic}\" that takes about \
         {minutes} minutes, with exactly {count} exercises.",
        difficulty = brief.difficulty,
        lesson_type = brief.lesson_type,
        topic = brief.topic.trim(),
        minutes = brief.estimated_minutes,
        count = brief.exercise_count,
    )
}

fn type_rule(kind: ExerciseType) -> String {
    let rules = rules_for(kind);
    let options = if rules.has_options() {
        format!(
            "at least {} options; every correctAnswer entry must equal an option value",
            rules.min_options()
        )
    } else {
        "no options".to_string()
    };
    let answers = match kind {
        ExerciseType::MultipleChoice => "one or more correct answers",
        ExerciseType::SingleChoice => "exactly one correct answer",
        ExerciseType::FillInTheBlank => "one or more accepted answers",
        ExerciseType::TrueFalse => {
            "correctAnswer is exactly [\"true\"] or [\"false\"] (lower-case)"
        }
        ExerciseType::Translation => {
            "the first correctAnswer entry is the translation, further entries are alternatives"
        }
    };
    let grading = match rules.grading {
        GradingMode::SetEquality => "learners must select all correct options",
        GradingMode::AnyOf => "a learner answer matching any accepted answer is correct",
    };
    format!("{options}; {answers}; {grading}.")
}

/// Returns a valid example exercise of the given type.
#[must_use]
pub fn example_exercise(kind: ExerciseType) -> Exercise {
    let id = format!("example-{kind}");
    match kind {
        ExerciseType::MultipleChoice => Exercise::new(
            id,
            kind,
            "Which of these are fruits?",
            "Apples and bananas are fruits; carrots are vegetables.",
            10,
        )
        .with_options(["apple", "banana", "carrot"])
        .with_answers(["apple", "banana"]),
        ExerciseType::SingleChoice => {
            let mut exercise = Exercise::new(
                id,
                kind,
                "Choose the correct article: ___ apple",
                "Use \"an\" before a vowel sound.",
                5,
            )
            .with_options(["a", "an", "the"])
            .with_answers(["an"]);
            exercise.options[1] = AnswerOption {
                value: "an".to_string(),
                translate: Some("indefinite article before a vowel sound".to_string()),
            };
            exercise
        }
        ExerciseType::FillInTheBlank => Exercise::new(
            id,
            kind,
            "Yesterday I ___ to the market.",
            "\"Go\" is irregular: go, went, gone.",
            5,
        )
        .with_options(["went", "go", "gone"])
        .with_answers(["went"]),
        ExerciseType::TrueFalse => Exercise::new(
            id,
            kind,
            "\"Breakfast\" is the first meal of the day.",
            "Breakfast is eaten in the morning.",
            5,
        )
        .with_answers(["true"]),
        ExerciseType::Translation => {
            let mut exercise = Exercise::new(
                id,
                kind,
                "Translate into English: Доброе утро",
                "A common morning greeting.",
                10,
            )
            .with_answers(["Good morning", "Morning"]);
            exercise.question = Question {
                text: "Translate into English: Доброе утро".to_string(),
                translate: Some("Good morning".to_string()),
            };
            exercise
        }
    }
}

fn worked_example(kind: ExerciseType) -> String {
    serde_json::to_string(&example_exercise(kind))
        .unwrap_or_else(|_| json!({ "type": kind }).to_string())
}
