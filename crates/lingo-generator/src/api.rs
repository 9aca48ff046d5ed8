//! HTTP API for validation, grading and lesson generation.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Liveness check
//! - `POST /api/exercises/validate` - Validate one raw exercise
//! - `POST /api/lessons/validate` - Validate a lesson's exercises
//! - `POST /api/exercises/grade` - Grade one submission
//! - `POST /api/lessons/grade` - Grade a lesson's submissions
//! - `POST /api/lessons/generate` - Generate a lesson from a brief
//!
//! # Example
//!
//! ```no_run
//! use lingo_generator::{create_router, AppState};
//!
//! # async fn example() {
//! let state = AppState::new(None);
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lingo_core::{
    decode_exercise, decode_lesson, grade, grade_lesson, validate_json, validate_lesson_json,
    ContractError, GradeResult, LessonGrade, LessonValidation, SubmittedAnswer, ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::GeneratorError;
use crate::generator::{GenerationOutcome, LessonGenerator};
use crate::prompt::LessonBrief;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
}

/// Request body for the lesson validation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateLessonRequest {
    /// Raw exercise objects, checked against the contract before validation.
    pub exercises: Value,
}

/// Request body for the exercise grading endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeExerciseRequest {
    /// Raw exercise object.
    pub exercise: Value,
    /// The learner's answer; absent means no submission.
    #[serde(default)]
    pub answer: Option<SubmittedAnswer>,
}

/// Request body for the lesson grading endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GradeLessonRequest {
    /// Raw lesson object.
    pub lesson: Value,
    /// Submissions keyed by exercise id.
    #[serde(default)]
    pub submissions: HashMap<String, SubmittedAnswer>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Lesson generator; `None` when no provider is configured.
    pub generator: Option<LessonGenerator>,
    /// Cancelled on server shutdown; in-flight generations stop between attempts.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub fn new(generator: Option<LessonGenerator>) -> Self {
        Self {
            generator,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an existing shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Raw content broke the exercise contract.
    Contract(ContractError),
    /// Generation failed or was refused.
    Generator(GeneratorError),
    /// No provider is configured.
    GeneratorUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Contract(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            Self::Generator(err) => {
                let status = match &err {
                    GeneratorError::InvalidBrief { .. } => StatusCode::BAD_REQUEST,
                    GeneratorError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
                    GeneratorError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            Self::GeneratorUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Lesson generation is not configured on this server".to_string(),
            ),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        Self::Contract(err)
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router carries permissive CORS for authoring front-ends and request
/// tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/exercises/validate", post(handle_validate_exercise))
        .route("/lessons/validate", post(handle_validate_lesson))
        .route("/exercises/grade", post(handle_grade_exercise))
        .route("/lessons/grade", post(handle_grade_lesson))
        .route("/lessons/generate", post(handle_generate));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Handler for `POST /api/exercises/validate`.
async fn handle_validate_exercise(
    Json(exercise): Json<Value>,
) -> Result<Json<ValidationResult>, ApiError> {
    let result = validate_json(&exercise).map_err(|e| {
        warn!(error = %e, "Rejected exercise at the contract boundary");
        e
    })?;
    info!(
        valid = result.valid,
        violations = result.violations.len(),
        "Validated exercise"
    );
    Ok(Json(result))
}

/// Handler for `POST /api/lessons/validate`.
async fn handle_validate_lesson(
    Json(request): Json<ValidateLessonRequest>,
) -> Result<Json<LessonValidation>, ApiError> {
    let result = validate_lesson_json(&request.exercises)?;
    info!(
        valid = result.valid,
        exercises = result.per_exercise.len(),
        invalid = result.invalid_count(),
        "Validated lesson"
    );
    Ok(Json(result))
}

/// Handler for `POST /api/exercises/grade`.
async fn handle_grade_exercise(
    Json(request): Json<GradeExerciseRequest>,
) -> Result<Json<GradeResult>, ApiError> {
    let exercise = decode_exercise(&request.exercise)?;
    Ok(Json(grade(&exercise, request.answer.as_ref())))
}

/// Handler for `POST /api/lessons/grade`.
async fn handle_grade_lesson(
    Json(request): Json<GradeLessonRequest>,
) -> Result<Json<LessonGrade>, ApiError> {
    let lesson = decode_lesson(&request.lesson)?;
    let result = grade_lesson(&lesson, &request.submissions);
    info!(
        score = result.score,
        max_score = result.max_score,
        correct = result.correct_count,
        "Graded lesson"
    );
    Ok(Json(result))
}

/// Handler for `POST /api/lessons/generate`.
///
/// Responds 200 with the outcome for accepted and degraded lessons alike;
/// `phase` and `reviewBanner` tell them apart.
async fn handle_generate(
    State(state): State<Arc<AppState>>,
    Json(brief): Json<LessonBrief>,
) -> Result<Json<GenerationOutcome>, ApiError> {
    let generator = state
        .generator
        .as_ref()
        .ok_or(ApiError::GeneratorUnavailable)?;
    info!(topic = %brief.topic, lesson_type = %brief.lesson_type, "Generation requested");

    let outcome = generator
        .generate(&brief, &state.shutdown.child_token())
        .await
        .map_err(ApiError::Generator)?;
    Ok(Json(outcome))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use tower::util::ServiceExt;

    use super::*;
    use crate::config::GeneratorConfig;
    use crate::error::{ProviderError, ProviderErrorKind};
    use crate::prompt::PromptPayload;
    use crate::provider::ContentProvider;

    struct FixedProvider(std::result::Result<String, ProviderError>);

    #[async_trait]
    impl ContentProvider for FixedProvider {
        async fn generate_content(
            &self,
            _payload: &PromptPayload,
        ) -> std::result::Result<String, ProviderError> {
            self.0.clone()
        }
    }

    fn test_state() -> AppState {
        AppState::new(None)
    }

    fn state_with_provider(response: std::result::Result<String, ProviderError>) -> AppState {
        let generator = LessonGenerator::new(
            Arc::new(FixedProvider(response)),
            &GeneratorConfig::default(),
        );
        AppState::new(Some(generator))
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn true_false(answer: &str) -> Value {
        json!({
            "id": "tf-1",
            "type": "true-false",
            "question": { "text": "The sun is a star." },
            "explanation": "The sun is our nearest star.",
            "points": 5,
            "correctAnswer": [answer]
        })
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_health() {
        let response = create_router(test_state())
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_validate_exercise_reports_violations() {
        let response = create_router(test_state())
            .oneshot(post_json("/api/exercises/validate", &true_false("True")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["violations"][0]["code"], "INVALID_BOOLEAN_ANSWER");
    }

    #[tokio::test]
    async fn test_validate_exercise_unknown_type_returns_422() {
        let mut exercise = true_false("true");
        exercise["type"] = json!("matching");

        let response = create_router(test_state())
            .oneshot(post_json("/api/exercises/validate", &exercise))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("matching"));
    }

    #[tokio::test]
    async fn test_validate_lesson() {
        let body = json!({ "exercises": [true_false("true"), true_false("yes")] });
        let response = create_router(test_state())
            .oneshot(post_json("/api/lessons/validate", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["perExercise"][0]["valid"], true);
        assert_eq!(body["perExercise"][1]["valid"], false);
        assert_eq!(body["lessonWarnings"][0]["code"], "DUPLICATE_EXERCISE_ID");
    }

    #[tokio::test]
    async fn test_invalid_json_returns_400() {
        let response = create_router(test_state())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/exercises/validate")
                    .header("content-type", "application/json")
                    .body(Body::from("{ invalid json }"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ------------------------------------------------------------------------
    // Grading
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_grade_exercise() {
        let body = json!({ "exercise": true_false("true"), "answer": true });
        let response = create_router(test_state())
            .oneshot(post_json("/api/exercises/grade", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["correct"], true);

        let body = json!({ "exercise": true_false("true") });
        let response = create_router(test_state())
            .oneshot(post_json("/api/exercises/grade", &body))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["correct"], false);
    }

    #[tokio::test]
    async fn test_grade_lesson() {
        let mut second = true_false("false");
        second["id"] = json!("tf-2");
        second["points"] = json!(10);
        let body = json!({
            "lesson": { "title": "Space", "exercises": [true_false("true"), second] },
            "submissions": { "tf-1": "TRUE", "tf-2": true }
        });

        let response = create_router(test_state())
            .oneshot(post_json("/api/lessons/grade", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["score"], 5);
        assert_eq!(body["maxScore"], 15);
        assert_eq!(body["correctCount"], 1);
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_generate_without_provider_returns_503() {
        let response = create_router(test_state())
            .oneshot(post_json("/api/lessons/generate", &json!({ "topic": "Space" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_generate_accepted() {
        let lesson = json!({ "title": "Space", "exercises": [true_false("true")] }).to_string();
        let brief = json!({ "topic": "Space", "exerciseCount": 1 });
        let response = create_router(state_with_provider(Ok(lesson)))
            .oneshot(post_json("/api/lessons/generate", &brief))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["phase"], "accepted");
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["lesson"]["exercises"][0]["id"], "tf-1");
        assert!(body.get("reviewBanner").is_none());
    }

    #[tokio::test]
    async fn test_generate_short_lesson_returns_502() {
        let lesson = json!({ "title": "Space", "exercises": [true_false("true")] }).to_string();
        let brief = json!({ "topic": "Space", "exerciseCount": 2 });
        let response = create_router(state_with_provider(Ok(lesson)))
            .oneshot(post_json("/api/lessons/generate", &brief))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("expected 2 exercise(s), got 1"));
    }

    #[tokio::test]
    async fn test_generate_failure_returns_502() {
        let state = state_with_provider(Err(ProviderError::new(
            ProviderErrorKind::Server,
            "HTTP 503",
        )));
        let response = create_router(state)
            .oneshot(post_json("/api/lessons/generate", &json!({ "topic": "Space" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("after 3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_generate_invalid_brief_returns_400() {
        let response = create_router(state_with_provider(Ok(String::new())))
            .oneshot(post_json(
                "/api/lessons/generate",
                &json!({ "topic": "Space", "exerciseCount": 0 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
