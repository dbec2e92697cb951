// src/repository/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::AppError,
    grading::{percentage, round1},
    models::{
        attempt::{
            AnswerDetail, AttemptDetail, AttemptListParams, AttemptSummary, NewAttempt,
            QuizAttempt,
        },
        question::{AnswerKey, Question, QuestionDraft, QuestionListParams},
        stats::{CatalogEntry, GroupCount, QcmStatistics},
    },
};

use super::QcmRepository;

const QUESTION_COLUMNS: &str = "id, text, options, correct_ids, explanation, school, matiere, \
     chapter, difficulty, points, time_limit, status, is_public, times_answered, times_correct, \
     created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, user_id, school, matiere, total_questions, score, \
     total_points, max_points, percentage, time_spent, started_at, completed_at";

/// Postgres-backed repository.
#[derive(Clone)]
pub struct PgQcmRepository {
    pool: PgPool,
}

impl PgQcmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn group_counts(&self, column: &str) -> Result<Vec<GroupCount>, AppError> {
        let sql = format!(
            "SELECT {column}::TEXT AS key, COUNT(*) AS count FROM questions GROUP BY {column} ORDER BY {column}::TEXT"
        );
        let rows = sqlx::query_as::<_, GroupCount>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl QcmRepository for PgQcmRepository {
    async fn sample_questions(
        &self,
        school: &str,
        matiere: &str,
        count: i64,
    ) -> Result<Vec<Question>, AppError> {
        let sql = format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE school = $1 AND matiere = $2 AND status = 'ACTIVE' AND is_public
            ORDER BY RANDOM()
            LIMIT $3
            "#
        );

        let questions = sqlx::query_as::<_, Question>(&sql)
            .bind(school)
            .bind(matiere)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to sample questions: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(questions)
    }

    async fn answer_keys(&self, ids: &[i64]) -> Result<Vec<AnswerKey>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Use QueryBuilder for dynamic IN clause
        let mut query_builder = QueryBuilder::<Postgres>::new(
            "SELECT id, correct_ids, points, explanation FROM questions WHERE id IN (",
        );

        let mut separated = query_builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let keys = query_builder
            .build_query_as::<AnswerKey>()
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError> {
        let completed_at = chrono::Utc::now();
        let started_at = attempt.started_at(completed_at);

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO quiz_attempts
            (user_id, school, matiere, total_questions, score, total_points, max_points,
             percentage, time_spent, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(&attempt.user_id)
            .bind(&attempt.school)
            .bind(&attempt.matiere)
            .bind(attempt.total_questions)
            .bind(attempt.score)
            .bind(attempt.total_points)
            .bind(attempt.max_points)
            .bind(attempt.percentage)
            .bind(attempt.time_spent)
            .bind(started_at)
            .bind(completed_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert quiz attempt: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        if !attempt.answers.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO quiz_answers (attempt_id, question_id, selected_ids, is_correct, points_earned, time_spent) ",
            );
            builder.push_values(attempt.answers, |mut row, answer| {
                row.push_bind(record.id)
                    .push_bind(answer.question_id)
                    .push_bind(answer.selected_ids)
                    .push_bind(answer.is_correct)
                    .push_bind(answer.points_earned)
                    .push_bind(answer.time_spent);
            });

            builder.build().execute(&mut *tx).await.map_err(|e| {
                tracing::error!("Failed to insert quiz answers: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;
        }

        tx.commit().await?;

        Ok(record)
    }

    async fn increment_counters(&self, question_id: i64, correct: bool) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE questions
            SET times_answered = times_answered + 1,
                times_correct = times_correct + CASE WHEN $2 THEN 1 ELSE 0 END
            WHERE id = $1
            "#,
        )
        .bind(question_id)
        .bind(correct)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_attempts(
        &self,
        user_id: &str,
        params: &AttemptListParams,
    ) -> Result<Vec<QuizAttempt>, AppError> {
        let sql = format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM quiz_attempts
            WHERE user_id = $1
              AND ($2::TIMESTAMPTZ IS NULL
                   OR ($6::BIGINT IS NULL AND completed_at < $2)
                   OR (completed_at, id) < ($2, $6))
              AND ($3::TEXT IS NULL OR school = $3)
              AND ($4::TEXT IS NULL OR matiere = $4)
            ORDER BY completed_at DESC, id DESC
            LIMIT $5
            "#
        );

        let attempts = sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(user_id)
            .bind(params.cursor)
            .bind(params.school.as_deref())
            .bind(params.matiere.as_deref())
            .bind(params.limit())
            .bind(params.cursor_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(attempts)
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<AttemptDetail>, AppError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1");
        let Some(attempt) = sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let answers = sqlx::query_as::<_, AnswerDetail>(
            r#"
            SELECT
                a.question_id,
                q.text AS question_text,
                a.selected_ids,
                q.correct_ids,
                a.is_correct,
                a.points_earned,
                a.time_spent,
                q.explanation
            FROM quiz_answers a
            LEFT JOIN questions q ON q.id = a.question_id
            WHERE a.attempt_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(AttemptDetail { attempt, answers }))
    }

    async fn attempt_summary(&self, user_id: &str) -> Result<AttemptSummary, AppError> {
        let mut summary = sqlx::query_as::<_, AttemptSummary>(
            r#"
            SELECT
                COUNT(*) AS attempts,
                COALESCE(AVG(percentage), 0)::FLOAT8 AS average_percentage,
                COALESCE(MAX(percentage), 0)::FLOAT8 AS best_percentage,
                COALESCE(SUM(total_points), 0)::BIGINT AS total_points
            FROM quiz_attempts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        summary.average_percentage = round1(summary.average_percentage);
        Ok(summary)
    }

    async fn statistics(&self) -> Result<QcmStatistics, AppError> {
        let (total_questions, active_questions, correct, answered): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'ACTIVE'),
                    COALESCE(SUM(times_correct), 0)::BIGINT,
                    COALESCE(SUM(times_answered), 0)::BIGINT
                FROM questions
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let (total_attempts, average_percentage): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(AVG(percentage), 0)::FLOAT8 FROM quiz_attempts",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QcmStatistics {
            total_questions,
            active_questions,
            by_school: self.group_counts("school").await?,
            by_matiere: self.group_counts("matiere").await?,
            by_difficulty: self.group_counts("difficulty").await?,
            success_rate: percentage(correct, answered),
            total_attempts,
            average_percentage: round1(average_percentage),
        })
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>, AppError> {
        let entries = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT school, matiere, COUNT(*) AS questions
            FROM questions
            WHERE status = 'ACTIVE' AND is_public
            GROUP BY school, matiere
            ORDER BY school, matiere
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn create_question(&self, draft: QuestionDraft) -> Result<Question, AppError> {
        let sql = format!(
            r#"
            INSERT INTO questions
            (text, options, correct_ids, explanation, school, matiere, chapter,
             difficulty, points, time_limit, status, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {QUESTION_COLUMNS}
            "#
        );

        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(draft.text)
            .bind(Json(draft.options))
            .bind(draft.correct_ids)
            .bind(draft.explanation)
            .bind(draft.school)
            .bind(draft.matiere)
            .bind(draft.chapter)
            .bind(draft.difficulty)
            .bind(draft.points)
            .bind(draft.time_limit)
            .bind(draft.status)
            .bind(draft.is_public)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create question: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(question)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1");
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(question)
    }

    async fn list_questions(&self, params: &QuestionListParams) -> Result<Vec<Question>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE TRUE"));

        if let Some(school) = &params.school {
            builder.push(" AND school = ").push_bind(school.clone());
        }
        if let Some(matiere) = &params.matiere {
            builder.push(" AND matiere = ").push_bind(matiere.clone());
        }
        if let Some(difficulty) = params.difficulty {
            builder.push(" AND difficulty = ").push_bind(difficulty);
        }
        if let Some(status) = params.status {
            builder.push(" AND status = ").push_bind(status);
        }

        builder
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let questions = builder
            .build_query_as::<Question>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list questions: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(questions)
    }

    async fn update_question(
        &self,
        id: i64,
        draft: QuestionDraft,
    ) -> Result<Option<Question>, AppError> {
        let sql = format!(
            r#"
            UPDATE questions SET
                text = $1, options = $2, correct_ids = $3, explanation = $4,
                school = $5, matiere = $6, chapter = $7, difficulty = $8,
                points = $9, time_limit = $10, status = $11, is_public = $12,
                updated_at = NOW()
            WHERE id = $13
            RETURNING {QUESTION_COLUMNS}
            "#
        );

        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(draft.text)
            .bind(Json(draft.options))
            .bind(draft.correct_ids)
            .bind(draft.explanation)
            .bind(draft.school)
            .bind(draft.matiere)
            .bind(draft.chapter)
            .bind(draft.difficulty)
            .bind(draft.points)
            .bind(draft.time_limit)
            .bind(draft.status)
            .bind(draft.is_public)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update question: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(question)
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete question: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }
}
