// src/models/question.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use url::Url;
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html};

static OPTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,16}$").expect("option id pattern is valid"));

/// Difficulty level, stored as the Postgres enum `difficulty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "difficulty", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

/// Publication status. Admins move questions between states freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "question_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionStatus {
    Active,
    Inactive,
    #[default]
    Draft,
}

/// How an option's `text` should be rendered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    #[default]
    Text,
    Image,
    Latex,
}

/// One selectable answer. Stored inside the `options` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The question statement (sanitized HTML).
    pub text: String,

    /// Ordered list of options, stored as a JSON array.
    pub options: Json<Vec<QuestionOption>>,

    /// Ids of the options that make up the correct answer.
    /// Always a non-empty subset of the option ids.
    pub correct_ids: Vec<String>,

    /// Shown to the student once the quiz is graded.
    pub explanation: Option<String>,

    pub school: String,
    pub matiere: String,
    pub chapter: Option<String>,
    pub difficulty: Difficulty,
    pub points: i32,

    /// Suggested time limit in seconds.
    pub time_limit: Option<i32>,

    pub status: QuestionStatus,
    pub is_public: bool,

    pub times_answered: i32,
    pub times_correct: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    /// A question can be served in a quiz only when it is active and public.
    pub fn is_playable(&self) -> bool {
        self.status == QuestionStatus::Active && self.is_public
    }

    /// Rebuilds the editable part of the question, used as the base of a patch.
    pub fn to_draft(&self) -> QuestionDraft {
        QuestionDraft {
            text: self.text.clone(),
            options: self.options.0.clone(),
            correct_ids: self.correct_ids.clone(),
            explanation: self.explanation.clone(),
            school: self.school.clone(),
            matiere: self.matiere.clone(),
            chapter: self.chapter.clone(),
            difficulty: self.difficulty,
            points: self.points,
            time_limit: self.time_limit,
            status: self.status,
            is_public: self.is_public,
        }
    }
}

/// DTO for sending a question to a student (excludes the answer key and counters).
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub school: String,
    pub matiere: String,
    pub chapter: Option<String>,
    pub difficulty: Difficulty,
    pub points: i32,
    pub time_limit: Option<i32>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options.0,
            school: q.school,
            matiere: q.matiere,
            chapter: q.chapter,
            difficulty: q.difficulty,
            points: q.points,
            time_limit: q.time_limit,
        }
    }
}

/// Answer key row used by the grader.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerKey {
    pub id: i64,
    pub correct_ids: Vec<String>,
    pub points: i32,
    pub explanation: Option<String>,
}

/// Editable content of a question.
/// Doubles as the create payload: omitted fields take their defaults.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionDraft {
    #[validate(length(min = 1, max = 5000))]
    pub text: String,

    #[validate(length(min = 2, max = 10), custom(function = validate_options))]
    pub options: Vec<QuestionOption>,

    #[validate(length(min = 1, max = 10))]
    pub correct_ids: Vec<String>,

    #[validate(length(max = 5000))]
    pub explanation: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub school: String,

    #[validate(length(min = 1, max = 100))]
    pub matiere: String,

    #[validate(length(max = 200))]
    pub chapter: Option<String>,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 1000))]
    pub points: i32,

    #[validate(range(min = 1, max = 3600))]
    pub time_limit: Option<i32>,

    #[serde(default)]
    pub status: QuestionStatus,

    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_points() -> i32 {
    1
}

fn default_public() -> bool {
    true
}

impl QuestionDraft {
    /// Validates the draft and returns it sanitized, ready to be stored.
    pub fn prepare(self) -> Result<Self, AppError> {
        let draft = self.normalized();
        draft.validate()?;
        draft.check_answer_key()?;
        Ok(draft)
    }

    /// Option ids must be unique and the correct ids must point at existing options.
    pub fn check_answer_key(&self) -> Result<(), AppError> {
        let mut option_ids = HashSet::new();
        for option in &self.options {
            if !option_ids.insert(option.id.as_str()) {
                return Err(AppError::BadRequest(format!(
                    "Duplicate option id '{}'",
                    option.id
                )));
            }
        }

        if let Some(unknown) = self
            .correct_ids
            .iter()
            .find(|id| !option_ids.contains(id.as_str()))
        {
            return Err(AppError::BadRequest(format!(
                "Correct id '{}' does not match any option",
                unknown
            )));
        }

        Ok(())
    }

    /// Trims identifiers, drops duplicate correct ids and sanitizes rich text.
    fn normalized(mut self) -> Self {
        self.text = clean_html(self.text.trim());
        self.school = self.school.trim().to_string();
        self.matiere = self.matiere.trim().to_string();
        self.chapter = self
            .chapter
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.explanation = self
            .explanation
            .map(|e| clean_html(e.trim()))
            .filter(|e| !e.is_empty());

        for option in &mut self.options {
            option.id = option.id.trim().to_string();
            option.text = clean_html(option.text.trim());
        }

        let mut seen = HashSet::new();
        self.correct_ids = self
            .correct_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        self
    }
}

/// Maps an absent field to `None` and an explicit `null` to `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// DTO for updating a question. Fields are optional.
/// `explanation`, `chapter` and `time_limit` are cleared by sending `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuestionRequest {
    pub text: Option<String>,
    pub options: Option<Vec<QuestionOption>>,
    pub correct_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub explanation: Option<Option<String>>,
    pub school: Option<String>,
    pub matiere: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub chapter: Option<Option<String>>,
    pub difficulty: Option<Difficulty>,
    pub points: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub time_limit: Option<Option<i32>>,
    pub status: Option<QuestionStatus>,
    pub is_public: Option<bool>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.options.is_none()
            && self.correct_ids.is_none()
            && self.explanation.is_none()
            && self.school.is_none()
            && self.matiere.is_none()
            && self.chapter.is_none()
            && self.difficulty.is_none()
            && self.points.is_none()
            && self.time_limit.is_none()
            && self.status.is_none()
            && self.is_public.is_none()
    }

    /// Overlays the present fields onto `draft`.
    pub fn apply(self, mut draft: QuestionDraft) -> QuestionDraft {
        if let Some(text) = self.text {
            draft.text = text;
        }
        if let Some(options) = self.options {
            draft.options = options;
        }
        if let Some(correct_ids) = self.correct_ids {
            draft.correct_ids = correct_ids;
        }
        if let Some(explanation) = self.explanation {
            draft.explanation = explanation;
        }
        if let Some(school) = self.school {
            draft.school = school;
        }
        if let Some(matiere) = self.matiere {
            draft.matiere = matiere;
        }
        if let Some(chapter) = self.chapter {
            draft.chapter = chapter;
        }
        if let Some(difficulty) = self.difficulty {
            draft.difficulty = difficulty;
        }
        if let Some(points) = self.points {
            draft.points = points;
        }
        if let Some(time_limit) = self.time_limit {
            draft.time_limit = time_limit;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(is_public) = self.is_public {
            draft.is_public = is_public;
        }
        draft
    }
}

/// Query parameters for the admin question list.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionListParams {
    pub school: Option<String>,
    pub matiere: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub status: Option<QuestionStatus>,

    /// Number of items to return (default: 50, max: 200).
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QuestionListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, q: &Question) -> bool {
        self.school.as_ref().is_none_or(|s| &q.school == s)
            && self.matiere.as_ref().is_none_or(|m| &q.matiere == m)
            && self.difficulty.is_none_or(|d| q.difficulty == d)
            && self.status.is_none_or(|s| q.status == s)
    }
}

/// Validates option ids and image URLs.
fn validate_options(options: &[QuestionOption]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if !OPTION_ID.is_match(opt.id.trim()) {
            return Err(validator::ValidationError::new("invalid_option_id"));
        }
        if opt.text.len() > 1000 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
        if let Some(image_url) = &opt.image_url {
            if image_url.len() > 500 {
                return Err(validator::ValidationError::new("url_too_long"));
            }
            match Url::parse(image_url) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                _ => return Err(validator::ValidationError::new("invalid_url")),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            text: format!("Option {}", id),
            content_type: ContentType::Text,
            image_url: None,
        }
    }

    fn draft(correct: &[&str]) -> QuestionDraft {
        QuestionDraft {
            text: "Which numbers are prime?".to_string(),
            options: ["A", "B", "C", "D"].iter().map(|id| option(id)).collect(),
            correct_ids: correct.iter().map(|s| s.to_string()).collect(),
            explanation: None,
            school: "Lycee".to_string(),
            matiere: "Maths".to_string(),
            chapter: None,
            difficulty: Difficulty::Easy,
            points: 10,
            time_limit: None,
            status: QuestionStatus::Active,
            is_public: true,
        }
    }

    #[test]
    fn test_prepare_accepts_subset_of_options() {
        let prepared = draft(&["A", "C"]).prepare().unwrap();
        assert_eq!(prepared.correct_ids, vec!["A", "C"]);
    }

    #[test]
    fn test_prepare_rejects_unknown_correct_id() {
        let err = draft(&["A", "E"]).prepare().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("'E'")));
    }

    #[test]
    fn test_prepare_rejects_empty_answer_key() {
        assert!(draft(&[]).prepare().is_err());
    }

    #[test]
    fn test_prepare_rejects_duplicate_option_ids() {
        let mut d = draft(&["A"]);
        d.options.push(option("A"));
        assert!(matches!(d.prepare(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_prepare_deduplicates_correct_ids() {
        let prepared = draft(&["B", " B", "D"]).prepare().unwrap();
        assert_eq!(prepared.correct_ids, vec!["B", "D"]);
    }

    #[test]
    fn test_prepare_rejects_bad_option_id_and_url() {
        let mut d = draft(&["A"]);
        d.options[1].id = "B C".to_string();
        assert!(d.prepare().is_err());

        let mut d = draft(&["A"]);
        d.options[0].image_url = Some("javascript:alert(1)".to_string());
        assert!(d.prepare().is_err());

        let mut d = draft(&["A"]);
        d.options[0].image_url = Some("https://cdn.example.com/a.png".to_string());
        assert!(d.prepare().is_ok());
    }

    #[test]
    fn test_prepare_strips_scripts() {
        let mut d = draft(&["A"]);
        d.text = "<b>2 + 2</b><script>alert(1)</script>".to_string();
        let prepared = d.prepare().unwrap();
        assert_eq!(prepared.text, "<b>2 + 2</b>");
    }

    #[test]
    fn test_points_out_of_range() {
        let mut d = draft(&["A"]);
        d.points = 0;
        assert!(d.prepare().is_err());
    }

    #[test]
    fn test_update_overlays_present_fields_only() {
        let patch = UpdateQuestionRequest {
            correct_ids: Some(vec!["D".to_string()]),
            status: Some(QuestionStatus::Inactive),
            ..Default::default()
        };
        assert!(!patch.is_empty());

        let merged = patch.apply(draft(&["A"]));
        assert_eq!(merged.correct_ids, vec!["D"]);
        assert_eq!(merged.status, QuestionStatus::Inactive);
        assert_eq!(merged.points, 10);
        assert_eq!(merged.school, "Lycee");
    }

    #[test]
    fn test_update_null_clears_optional_fields() {
        let mut current = draft(&["A"]);
        current.explanation = Some("Because.".to_string());
        current.chapter = Some("Primes".to_string());
        current.time_limit = Some(30);

        let patch: UpdateQuestionRequest = serde_json::from_value(serde_json::json!({
            "explanation": null,
            "time_limit": null,
            "points": 5
        }))
        .unwrap();
        assert_eq!(patch.explanation, Some(None));
        assert_eq!(patch.chapter, None);

        let merged = patch.apply(current);
        assert_eq!(merged.explanation, None);
        assert_eq!(merged.time_limit, None);
        assert_eq!(merged.chapter.as_deref(), Some("Primes"));
        assert_eq!(merged.points, 5);
    }

    #[test]
    fn test_create_payload_defaults() {
        let d: QuestionDraft = serde_json::from_value(serde_json::json!({
            "text": "Capital of France?",
            "options": [{"id": "A", "text": "Paris"}, {"id": "B", "text": "Lyon"}],
            "correct_ids": ["A"],
            "school": "College",
            "matiere": "Geographie"
        }))
        .unwrap();

        assert_eq!(d.points, 1);
        assert_eq!(d.difficulty, Difficulty::Medium);
        assert_eq!(d.status, QuestionStatus::Draft);
        assert!(d.is_public);
        assert_eq!(d.options[0].content_type, ContentType::Text);
    }
}
