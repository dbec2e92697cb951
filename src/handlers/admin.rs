// src/handlers/admin.rs

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::question::{QuestionDraft, QuestionListParams, UpdateQuestionRequest},
    repository::DynRepository,
};

/// Question bank and attempt rollups.
/// Admin only.
pub async fn statistics(State(repo): State<DynRepository>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(repo.statistics().await?))
}

/// Lists questions, optionally filtered by school, matiere, difficulty and status.
/// Admin only.
pub async fn list_questions(
    State(repo): State<DynRepository>,
    params: Result<Query<QuestionListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    Ok(Json(repo.list_questions(&params).await?))
}

/// Retrieves a question including its answer key and counters.
/// Admin only.
pub async fn get_question(
    State(repo): State<DynRepository>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let question = repo
        .get_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}

/// Creates a new quiz question.
/// Admin only.
pub async fn create_question(
    State(repo): State<DynRepository>,
    payload: Result<Json<QuestionDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let draft = payload.prepare()?;
    let question = repo.create_question(draft).await?;

    tracing::info!(
        "Created question {} ({}/{})",
        question.id,
        question.school,
        question.matiere
    );

    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question by ID.
/// The patch is merged onto the stored question and the result re-validated.
/// Admin only.
pub async fn update_question(
    State(repo): State<DynRepository>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let current = repo
        .get_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if payload.is_empty() {
        return Ok(Json(current));
    }

    let draft = payload.apply(current.to_draft()).prepare()?;

    let updated = repo
        .update_question(id, draft)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(updated))
}

/// Deletes a quiz question by ID.
/// Past answers keep the question id.
/// Admin only.
pub async fn delete_question(
    State(repo): State<DynRepository>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    if !repo.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
