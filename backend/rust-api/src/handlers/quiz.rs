use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    metrics::QUIZZES_GENERATED_TOTAL,
    middlewares::auth::CurrentUser,
    models::quiz::{
        normalize_video_url, CreateQuizRequest, QuizResponse, UpdateQuizRequest,
    },
    services::{quiz_service::QuizService, AppState},
};

/// POST /quizzes/create - Generate and persist a quiz from a video URL
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let video_url =
        normalize_video_url(&req.url).map_err(|err| ApiError::field("url", &err.to_string()))?;

    tracing::info!(user_id = %current_user.id, video_url = %video_url, "Generating quiz");

    let draft = state.pipeline.run(&video_url).await?;

    let service = QuizService::from_state(&state);
    let quiz = service
        .create_from_draft(draft, &video_url, &current_user.id)
        .await?;

    QUIZZES_GENERATED_TOTAL.inc();

    Ok((StatusCode::CREATED, Json(QuizResponse::from(quiz))))
}

/// GET /quizzes - List the requester's quizzes
pub async fn list_quizzes(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuizService::from_state(&state);
    let quizzes = service.list_for(&current_user.id).await?;

    let body: Vec<QuizResponse> = quizzes.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// GET /quizzes/{id} - Retrieve one owned quiz
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuizService::from_state(&state);
    let quiz = service.retrieve(&quiz_id, &current_user.id).await?;
    Ok(Json(QuizResponse::from(quiz)))
}

/// PATCH /quizzes/{id} - Edit title/description of one owned quiz
pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuizService::from_state(&state);

    // Existence and ownership are decided before the payload is examined, so
    // a bad payload against a foreign quiz still reads as 404/403.
    service.retrieve(&quiz_id, &current_user.id).await?;
    req.validate()?;

    let updated = service
        .update(&quiz_id, &current_user.id, req.into())
        .await?;
    Ok(Json(QuizResponse::from(updated)))
}

/// DELETE /quizzes/{id} - Remove one owned quiz and its questions
pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuizService::from_state(&state);
    service.delete(&quiz_id, &current_user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
