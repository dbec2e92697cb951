// src/models/stats.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Number of questions sharing one value of a grouping column.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}

/// Question bank and attempt rollups shown on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcmStatistics {
    pub total_questions: i64,
    pub active_questions: i64,
    pub by_school: Vec<GroupCount>,
    pub by_matiere: Vec<GroupCount>,
    pub by_difficulty: Vec<GroupCount>,
    /// Σ times_correct / Σ times_answered, in percent.
    pub success_rate: f64,
    pub total_attempts: i64,
    pub average_percentage: f64,
}

/// A (school, matiere) pair that has playable questions.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub school: String,
    pub matiere: String,
    pub questions: i64,
}
