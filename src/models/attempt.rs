// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quiz_attempts' table in the database.
/// One row per submitted quiz; never updated afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: String,
    pub school: String,
    pub matiere: String,
    pub total_questions: i32,
    /// Number of correct answers.
    pub score: i32,
    pub total_points: i32,
    pub max_points: i32,
    pub percentage: f64,
    /// Seconds spent on the whole quiz.
    pub time_spent: i32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'quiz_answers' table, children of an attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_ids: Vec<String>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub time_spent: Option<i32>,
}

/// A graded attempt that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: String,
    pub school: String,
    pub matiere: String,
    pub total_questions: i32,
    pub score: i32,
    pub total_points: i32,
    pub max_points: i32,
    pub percentage: f64,
    pub time_spent: i32,
    pub answers: Vec<NewAnswer>,
}

impl NewAttempt {
    /// The quiz start, derived from the completion time and the time spent.
    pub fn started_at(
        &self,
        completed_at: chrono::DateTime<chrono::Utc>,
    ) -> chrono::DateTime<chrono::Utc> {
        completed_at - chrono::Duration::seconds(i64::from(self.time_spent))
    }
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_id: i64,
    pub selected_ids: Vec<String>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub time_spent: Option<i32>,
}

/// Query parameters for starting a quiz.
#[derive(Debug, Deserialize)]
pub struct StartQuizParams {
    pub school: String,
    pub matiere: String,
    /// Number of questions wanted (default: 10, max: 100).
    pub count: Option<i64>,
}

/// One answer inside a quiz submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerSubmission {
    pub question_id: i64,

    #[validate(length(max = 20))]
    pub selected_ids: Vec<String>,

    #[validate(range(min = 0))]
    pub time_spent: Option<i32>,
}

/// DTO for submitting a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(min = 1, max = 100))]
    pub school: String,

    #[validate(length(min = 1, max = 100))]
    pub matiere: String,

    #[validate(length(min = 1, max = 100, message = "No answers submitted"))]
    #[validate(nested)]
    pub answers: Vec<AnswerSubmission>,

    /// Total seconds spent on the quiz.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub time_spent: i32,
}

/// Per-question feedback returned after grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub selected_ids: Vec<String>,
    /// `None` when the question no longer exists.
    pub correct_ids: Option<Vec<String>>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub explanation: Option<String>,
}

/// Response body of a quiz submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizResult {
    pub attempt: QuizAttempt,
    pub answers: Vec<GradedAnswer>,
}

/// Answer row of an attempt detail, joined with the question when it still exists.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub question_id: i64,
    pub question_text: Option<String>,
    pub selected_ids: Vec<String>,
    pub correct_ids: Option<Vec<String>>,
    pub is_correct: bool,
    pub points_earned: i32,
    pub time_spent: Option<i32>,
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptDetail {
    pub attempt: QuizAttempt,
    pub answers: Vec<AnswerDetail>,
}

/// Aggregate of one user's attempts.
#[derive(Debug, Default, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempts: i64,
    pub average_percentage: f64,
    pub best_percentage: f64,
    pub total_points: i64,
}

/// Query parameters for listing attempts.
#[derive(Debug, Default, Deserialize)]
pub struct AttemptListParams {
    /// Cursor for pagination: the completed_at timestamp of the last attempt in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Id of that last attempt. Breaks ties between attempts completed at the same instant.
    pub cursor_id: Option<i64>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,

    pub school: Option<String>,
    pub matiere: Option<String>,
}

impl AttemptListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    /// True when an attempt sorts strictly after the cursor in newest-first order.
    pub fn is_after_cursor(&self, completed_at: chrono::DateTime<chrono::Utc>, id: i64) -> bool {
        match (self.cursor, self.cursor_id) {
            (None, _) => true,
            (Some(c), None) => completed_at < c,
            (Some(c), Some(cid)) => (completed_at, id) < (c, cid),
        }
    }
}
