// src/repository/mod.rs

//! Storage seam for questions and attempts.
//!
//! Production runs on [`PgQcmRepository`]; [`MemoryQcmRepository`] backs
//! local runs without a database and the integration tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptDetail, AttemptListParams, AttemptSummary, NewAttempt, QuizAttempt},
        question::{AnswerKey, Question, QuestionDraft, QuestionListParams},
        stats::{CatalogEntry, QcmStatistics},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryQcmRepository;
pub use postgres::PgQcmRepository;

/// Shared handle stored in the application state.
pub type DynRepository = Arc<dyn QcmRepository>;

#[async_trait]
pub trait QcmRepository: Send + Sync {
    /// Uniform random sample of active, public questions for a school and matiere.
    /// Returns at most `count` questions, fewer when not enough exist.
    async fn sample_questions(
        &self,
        school: &str,
        matiere: &str,
        count: i64,
    ) -> Result<Vec<Question>, AppError>;

    /// Answer keys for the given ids. Unknown ids are simply absent.
    async fn answer_keys(&self, ids: &[i64]) -> Result<Vec<AnswerKey>, AppError>;

    /// Stores an attempt and all of its answers atomically.
    async fn record_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError>;

    /// Bumps `times_answered`, and `times_correct` when `correct`, for one question.
    async fn increment_counters(&self, question_id: i64, correct: bool) -> Result<(), AppError>;

    /// Attempts of one user, newest first.
    async fn list_attempts(
        &self,
        user_id: &str,
        params: &AttemptListParams,
    ) -> Result<Vec<QuizAttempt>, AppError>;

    async fn get_attempt(&self, id: i64) -> Result<Option<AttemptDetail>, AppError>;

    async fn attempt_summary(&self, user_id: &str) -> Result<AttemptSummary, AppError>;

    async fn statistics(&self) -> Result<QcmStatistics, AppError>;

    /// (school, matiere) pairs with at least one playable question.
    async fn catalog(&self) -> Result<Vec<CatalogEntry>, AppError>;

    async fn create_question(&self, draft: QuestionDraft) -> Result<Question, AppError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    async fn list_questions(&self, params: &QuestionListParams) -> Result<Vec<Question>, AppError>;

    /// Replaces the editable fields. `None` when the question does not exist.
    async fn update_question(
        &self,
        id: i64,
        draft: QuestionDraft,
    ) -> Result<Option<Question>, AppError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;
}
