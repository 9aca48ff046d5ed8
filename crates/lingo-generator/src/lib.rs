//! Lingo Lesson Generator
//!
//! Drives a content provider through bounded retries until it returns a lesson
//! that passes validation, and serves validation, grading and generation over
//! HTTP.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lingo_generator::{Config, GenerationPhase, LessonBrief, LessonGenerator, OpenAiProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> lingo_generator::Result<()> {
//! let config = Config::load()?;
//! let provider = OpenAiProvider::from_env(&config.provider)?;
//! let generator = LessonGenerator::new(Arc::new(provider), &config.generator);
//!
//! let outcome = generator
//!     .generate(&LessonBrief::new("Ordering coffee"), &CancellationToken::new())
//!     .await?;
//! if outcome.phase == GenerationPhase::Exhausted {
//!     println!("{}", outcome.review_banner().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod attempt;
pub mod config;
pub mod error;
pub mod generator;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use api::{
    create_router, AppState, ErrorResponse, GradeExerciseRequest, GradeLessonRequest,
    HealthResponse, ValidateLessonRequest,
};
pub use attempt::{AttemptFailure, GenerationAttempt, GenerationPhase, GenerationState};
pub use config::{Config, GeneratorConfig, ProviderConfig, ServerConfig, CONFIG_FILE_NAME};
pub use error::{GeneratorError, ProviderError, ProviderErrorKind, Result};
pub use generator::{strip_code_fence, GenerationOutcome, GenerationWarning, LessonGenerator};
pub use openai::OpenAiProvider;
pub use prompt::{LessonBrief, LessonType, PromptPayload};
pub use provider::ContentProvider;
