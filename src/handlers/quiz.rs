// src/handlers/quiz.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    config::{DEFAULT_QUIZ_QUESTIONS, MAX_QUIZ_QUESTIONS},
    error::AppError,
    grading::grade_quiz,
    models::{
        attempt::{QuizResult, StartQuizParams, SubmitQuizRequest},
        question::{AnswerKey, PublicQuestion},
    },
    repository::DynRepository,
    utils::jwt::Claims,
};

/// Lists the (school, matiere) pairs that currently have playable questions.
pub async fn catalog(State(repo): State<DynRepository>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(repo.catalog().await?))
}

/// Starts a quiz.
///
/// Samples up to `count` active, public questions of the requested school and
/// matiere in random order. Fewer are returned when fewer exist.
/// The answer key is stripped before sending.
pub async fn start_quiz(
    State(repo): State<DynRepository>,
    params: Result<Query<StartQuizParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let school = params.school.trim();
    let matiere = params.matiere.trim();
    if school.is_empty() || matiere.is_empty() {
        return Err(AppError::BadRequest(
            "school and matiere are required".to_string(),
        ));
    }

    let count = params.count.unwrap_or(DEFAULT_QUIZ_QUESTIONS);
    if !(1..=MAX_QUIZ_QUESTIONS).contains(&count) {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_QUIZ_QUESTIONS
        )));
    }

    let questions = repo.sample_questions(school, matiere, count).await?;

    tracing::debug!(
        "Sampled {} of {} requested questions for {}/{}",
        questions.len(),
        count,
        school,
        matiere
    );

    let public_questions: Vec<PublicQuestion> =
        questions.into_iter().map(PublicQuestion::from).collect();

    Ok(Json(public_questions))
}

/// Submits a quiz and grades it.
///
/// * Each answer is correct only when its selected ids equal the correct ids as a set.
/// * Unknown questions count as incorrect and add nothing to the maximum.
/// * The attempt and its answers are stored in one transaction.
/// * Question counters are bumped afterwards; failures there are logged, not returned.
pub async fn submit_quiz(
    State(repo): State<DynRepository>,
    Extension(claims): Extension<Claims>,
    req: Result<Json<SubmitQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = req?;
    req.validate()?;

    let school = req.school.trim();
    let matiere = req.matiere.trim();
    if school.is_empty() || matiere.is_empty() {
        return Err(AppError::BadRequest(
            "school and matiere are required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = req.answers.iter().find(|a| !seen.insert(a.question_id)) {
        return Err(AppError::BadRequest(format!(
            "Question {} answered more than once",
            dup.question_id
        )));
    }

    let question_ids: Vec<i64> = req.answers.iter().map(|a| a.question_id).collect();
    let keys: HashMap<i64, AnswerKey> = repo
        .answer_keys(&question_ids)
        .await?
        .into_iter()
        .map(|k| (k.id, k))
        .collect();

    let graded = grade_quiz(&keys, &req.answers);
    let new_attempt = graded.to_new_attempt(&claims.sub, school, matiere, req.time_spent);

    let attempt = repo.record_attempt(new_attempt).await?;

    // Outside the attempt transaction: counters may lag if this fails midway.
    for (question_id, correct) in graded.counter_updates() {
        if let Err(e) = repo.increment_counters(question_id, correct).await {
            tracing::warn!(
                "Failed to update counters of question {} for attempt {}: {}",
                question_id,
                attempt.id,
                e
            );
        }
    }

    tracing::info!(
        "Attempt {} by {}: {}/{} correct, {}/{} points ({}%)",
        attempt.id,
        attempt.user_id,
        attempt.score,
        attempt.total_questions,
        attempt.total_points,
        attempt.max_points,
        attempt.percentage
    );

    Ok(Json(QuizResult {
        attempt,
        answers: graded.answers,
    }))
}
