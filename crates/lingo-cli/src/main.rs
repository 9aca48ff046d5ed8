//! Lingo CLI
//!
//! Validates, grades and generates language-learning lessons, and serves the
//! same operations over HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lingo_core::{
    decode_exercises, decode_lesson, grade_lesson, validate_lesson, Difficulty, Exercise,
    ExerciseType, LessonValidation, SubmittedAnswer,
};
use lingo_generator::{
    create_router, AppState, Config, GenerationOutcome, GenerationPhase, LessonBrief,
    LessonGenerator, LessonType, OpenAiProvider,
};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Lingo - Exercise engine for language lessons
///
/// Checks exercises against their type rules, grades learner submissions and
/// drafts new lessons with an OpenAI-compatible model.
#[derive(Parser, Debug)]
#[command(name = "lingo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (default: lingo.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a lesson file and report violations per exercise
    Validate {
        /// Lesson JSON: an object with `exercises`, an array, or one exercise
        #[arg(value_name = "LESSON")]
        lesson: PathBuf,

        /// Print the full validation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Grade submissions against a lesson
    Grade {
        /// Lesson JSON file
        #[arg(value_name = "LESSON")]
        lesson: PathBuf,

        /// Submissions JSON file: an object keyed by exercise id
        #[arg(value_name = "SUBMISSIONS")]
        submissions: PathBuf,

        /// Print the full grade as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a lesson with the configured provider
    Generate(GenerateArgs),

    /// Run the HTTP API server
    Serve {
        /// Port for the HTTP API server (default: server.port from config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Lesson topic
    #[arg(short, long)]
    topic: String,

    /// Lesson type: vocab, grammar, listening, speaking, reading or writing
    #[arg(long, default_value = "vocab", value_parser = parse_lesson_type)]
    lesson_type: LessonType,

    /// Difficulty: beginner, intermediate or advanced
    #[arg(short, long, default_value = "beginner", value_parser = parse_difficulty)]
    difficulty: Difficulty,

    /// Number of exercises
    #[arg(short = 'n', long, default_value_t = 5)]
    count: u32,

    /// Target duration in minutes
    #[arg(short, long, default_value_t = 15)]
    minutes: u32,

    /// Restrict exercise types (comma-separated, e.g. multiple-choice,true-false)
    #[arg(long, value_delimiter = ',', value_parser = parse_exercise_type)]
    types: Vec<ExerciseType>,

    /// Override generator.maxAttempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Write the outcome to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?cli.config, "Config file");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Validate { lesson, json } => run_validate(&lesson, json),
        Command::Grade {
            lesson,
            submissions,
            json,
        } => run_grade(&lesson, &submissions, json),
        Command::Generate(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_generate(config, args).await
        }
        Command::Serve { port } => {
            let config = load_config(cli.config.as_deref())?;
            run_serve(config, port).await
        }
    }
}

// ============================================================================
// validate
// ============================================================================

fn run_validate(path: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let value = read_json(path)?;
    let exercises = match decode_exercises(&exercises_of(value)) {
        Ok(exercises) => exercises,
        Err(e) => {
            eprintln!("Contract violation: {e}");
            return Ok(ExitCode::from(1));
        }
    };

    let validation = validate_lesson(&exercises);
    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        print_validation(&exercises, &validation);
    }

    Ok(if validation.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Finds the exercise list in a lesson object, a bare array, or a single exercise.
fn exercises_of(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("exercises") {
            Some(exercises) => exercises,
            None => Value::Array(vec![Value::Object(map)]),
        },
        other => other,
    }
}

fn print_validation(exercises: &[Exercise], validation: &LessonValidation) {
    for (index, (exercise, result)) in exercises.iter().zip(&validation.per_exercise).enumerate() {
        let label = format!("Exercise {} ({}, {})", index + 1, exercise.id, exercise.kind);
        if result.violations.is_empty() {
            println!("{label}: ok");
            continue;
        }
        println!(
            "{label}: {} error(s), {} warning(s)",
            result.errors().count(),
            result.warnings().count()
        );
        for violation in &result.violations {
            let level = if violation.is_error() { "error" } else { "warning" };
            println!("  {level:<8} {:<28} {}", violation.code.as_str(), violation.message);
        }
    }
    for warning in &validation.lesson_warnings {
        println!("Lesson: warning  {} {}", warning.code.as_str(), warning.message);
    }

    println!();
    if validation.valid {
        println!("All {} exercise(s) valid", exercises.len());
    } else {
        println!(
            "{} of {} exercise(s) invalid ({} error(s))",
            validation.invalid_count(),
            exercises.len(),
            validation.error_count()
        );
    }
}

// ============================================================================
// grade
// ============================================================================

fn run_grade(lesson_path: &Path, submissions_path: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let lesson = decode_lesson(&read_json(lesson_path)?).with_context(|| {
        format!(
            "Lesson '{}' does not match the exercise contract",
            lesson_path.display()
        )
    })?;
    let submissions: HashMap<String, SubmittedAnswer> =
        serde_json::from_value(read_json(submissions_path)?).with_context(|| {
            format!(
                "Submissions '{}' must be an object keyed by exercise id",
                submissions_path.display()
            )
        })?;

    let result = grade_lesson(&lesson, &submissions);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(ExitCode::SUCCESS);
    }

    for entry in &result.results {
        let verdict = if entry.correct { "correct" } else { "incorrect" };
        println!("  {}: {verdict} (+{})", entry.id, entry.points);
    }
    println!();
    println!(
        "Score: {}/{} ({}/{} correct)",
        result.score,
        result.max_score,
        result.correct_count,
        result.results.len()
    );
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// generate
// ============================================================================

async fn run_generate(mut config: Config, args: GenerateArgs) -> anyhow::Result<ExitCode> {
    if let Some(max_attempts) = args.max_attempts {
        config.generator.max_attempts = max_attempts;
    }
    config.validate()?;

    let provider = OpenAiProvider::from_env(&config.provider)?;
    let generator = LessonGenerator::new(Arc::new(provider), &config.generator);

    let brief = LessonBrief {
        topic: args.topic,
        lesson_type: args.lesson_type,
        difficulty: args.difficulty,
        estimated_minutes: args.minutes,
        exercise_count: args.count,
        exercise_types: args.types,
    };

    eprintln!(
        "Generating {} {} lesson on '{}' ({} exercise(s), up to {} attempt(s))...",
        brief.difficulty,
        brief.lesson_type,
        brief.topic,
        brief.exercise_count,
        generator.max_attempts()
    );

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                Ok(()) = tokio::signal::ctrl_c() => {
                    eprintln!("Cancelling after the current attempt...");
                    cancel.cancel();
                }
                () = cancel.cancelled() => {}
            }
        })
    };

    let result = generator.generate(&brief, &cancel).await;
    watcher.abort();
    let outcome = result?;

    print_outcome(&outcome);
    let rendered = serde_json::to_string_pretty(&outcome)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("Outcome written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_outcome(outcome: &GenerationOutcome) {
    match outcome.phase {
        GenerationPhase::Accepted => eprintln!(
            "Lesson accepted after {} attempt(s): {} exercise(s)",
            outcome.attempts,
            outcome.lesson.exercises.len()
        ),
        _ => {
            eprintln!(
                "Attempt budget exhausted after {} attempt(s); returning the latest draft",
                outcome.attempts
            );
            if let Some(banner) = outcome.review_banner() {
                eprintln!("{banner}");
            }
            for warning in &outcome.warnings {
                eprintln!(
                    "  exercise {} ({}): {}",
                    warning.exercise_index + 1,
                    warning.exercise_id,
                    warning.violation.message
                );
            }
        }
    }
}

// ============================================================================
// serve
// ============================================================================

async fn run_serve(mut config: Config, port: Option<u16>) -> anyhow::Result<ExitCode> {
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let generator = match OpenAiProvider::from_env(&config.provider) {
        Ok(provider) => Some(LessonGenerator::new(Arc::new(provider), &config.generator)),
        Err(e) => {
            tracing::warn!(error = %e, "Lesson generation disabled");
            None
        }
    };

    let addr: SocketAddr = ([0, 0, 0, 0], config.server.port).into();
    let shutdown = CancellationToken::new();
    let router = create_router(AppState::new(generator).with_shutdown(shutdown.clone()));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
            shutdown.cancel();
        })
        .await
        .context("HTTP server error")?;

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helpers
// ============================================================================

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\n\
                     Suggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn parse_lesson_type(s: &str) -> Result<LessonType, String> {
    LessonType::from_str_case_insensitive(s).ok_or_else(|| {
        let names: Vec<&str> = LessonType::ALL.iter().map(LessonType::as_str).collect();
        format!("unknown lesson type '{s}' (expected one of: {})", names.join(", "))
    })
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    match s.trim().to_lowercase().as_str() {
        "beginner" => Ok(Difficulty::Beginner),
        "intermediate" => Ok(Difficulty::Intermediate),
        "advanced" => Ok(Difficulty::Advanced),
        other => Err(format!(
            "unknown difficulty '{other}' (expected beginner, intermediate or advanced)"
        )),
    }
}

fn parse_exercise_type(s: &str) -> Result<ExerciseType, String> {
    ExerciseType::from_wire(s.trim()).ok_or_else(|| {
        let names: Vec<&str> = ExerciseType::ALL.iter().map(ExerciseType::as_str).collect();
        format!("unknown exercise type '{s}' (expected one of: {})", names.join(", "))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "lingo",
            "generate",
            "--topic",
            "Ordering coffee",
            "--lesson-type",
            "Grammar",
            "--difficulty",
            "intermediate",
            "--count",
            "3",
            "--types",
            "multiple-choice,true-false",
        ])
        .unwrap();

        let Command::Generate(args) = cli.command else {
            unreachable!("expected the generate subcommand");
        };
        assert_eq!(args.topic, "Ordering coffee");
        assert_eq!(args.lesson_type, LessonType::Grammar);
        assert_eq!(args.difficulty, Difficulty::Intermediate);
        assert_eq!(args.count, 3);
        assert_eq!(args.minutes, 15);
        assert_eq!(
            args.types,
            vec![ExerciseType::MultipleChoice, ExerciseType::TrueFalse]
        );
    }

    #[test]
    fn test_cli_rejects_unknown_lesson_type() {
        let result = Cli::try_parse_from([
            "lingo",
            "generate",
            "--topic",
            "x",
            "--lesson-type",
            "poetry",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["lingo", "serve", "--config", "custom.json", "-p", "8080"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("custom.json"));
        assert!(matches!(cli.command, Command::Serve { port: Some(8080) }));
    }

    #[test]
    fn test_exercises_of_accepts_lesson_array_or_exercise() {
        let list = json!([{ "id": "a" }]);
        let lesson = json!({ "title": "t", "exercises": list.clone() });
        let single = json!({ "id": "a", "type": "translation" });

        assert_eq!(exercises_of(lesson), list);
        assert_eq!(exercises_of(list.clone()), list);
        assert_eq!(exercises_of(single.clone()), json!([single]));
    }

    #[test]
    fn test_parse_difficulty() {
        assert_eq!(parse_difficulty("Advanced").unwrap(), Difficulty::Advanced);
        assert!(parse_difficulty("expert").is_err());
    }
}
