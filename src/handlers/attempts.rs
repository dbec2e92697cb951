// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::attempt::AttemptListParams,
    repository::DynRepository,
    utils::jwt::Claims,
};

/// Lists the current user's attempts, newest first.
/// Paginate by passing the `completed_at` and `id` of the last item as
/// `cursor` and `cursor_id`.
pub async fn list_my_attempts(
    State(repo): State<DynRepository>,
    Extension(claims): Extension<Claims>,
    params: Result<Query<AttemptListParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let attempts = repo.list_attempts(&claims.sub, &params).await?;
    Ok(Json(attempts))
}

/// Attempt count, average and best percentage, and points earned by the current user.
pub async fn my_summary(
    State(repo): State<DynRepository>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(repo.attempt_summary(&claims.sub).await?))
}

/// Retrieves one attempt with its graded answers.
/// Only the owner and admins may read it.
pub async fn get_attempt(
    State(repo): State<DynRepository>,
    Extension(claims): Extension<Claims>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let detail = repo
        .get_attempt(id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if detail.attempt.user_id != claims.sub && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You can only view your own attempts".to_string(),
        ));
    }

    Ok(Json(detail))
}
