// src/repository/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::seq::{IteratorRandom, SliceRandom};
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    grading::{percentage, round1},
    models::{
        attempt::{
            AnswerDetail, AttemptDetail, AttemptListParams, AttemptSummary, NewAttempt,
            QuizAnswer, QuizAttempt,
        },
        question::{AnswerKey, Question, QuestionDraft, QuestionListParams, QuestionStatus},
        stats::{CatalogEntry, GroupCount, QcmStatistics},
    },
};

use super::QcmRepository;

#[derive(Default)]
struct Store {
    questions: BTreeMap<i64, Question>,
    attempts: BTreeMap<i64, QuizAttempt>,
    answers: Vec<QuizAnswer>,
    last_question_id: i64,
    last_attempt_id: i64,
    last_answer_id: i64,
}

/// Process-local repository. Data is lost on restart.
#[derive(Default)]
pub struct MemoryQcmRepository {
    store: RwLock<Store>,
}

impl MemoryQcmRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn group_by<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<GroupCount> {
    let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(key, count)| GroupCount {
            key: key.to_string(),
            count,
        })
        .collect()
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u32), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { round1(sum / f64::from(n)) }
}

#[async_trait]
impl QcmRepository for MemoryQcmRepository {
    async fn sample_questions(
        &self,
        school: &str,
        matiere: &str,
        count: i64,
    ) -> Result<Vec<Question>, AppError> {
        let store = self.store.read().await;
        let amount = usize::try_from(count).unwrap_or(0);

        let mut rng = rand::rng();
        // Reservoir sampling over the filtered questions.
        let mut picked: Vec<Question> = store
            .questions
            .values()
            .filter(|q| q.school == school && q.matiere == matiere && q.is_playable())
            .cloned()
            .choose_multiple(&mut rng, amount);
        picked.shuffle(&mut rng);

        Ok(picked)
    }

    async fn answer_keys(&self, ids: &[i64]) -> Result<Vec<AnswerKey>, AppError> {
        let store = self.store.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| store.questions.get(id))
            .map(|q| AnswerKey {
                id: q.id,
                correct_ids: q.correct_ids.clone(),
                points: q.points,
                explanation: q.explanation.clone(),
            })
            .collect())
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<QuizAttempt, AppError> {
        let completed_at = chrono::Utc::now();
        let started_at = attempt.started_at(completed_at);

        let mut store = self.store.write().await;
        store.last_attempt_id += 1;
        let record = QuizAttempt {
            id: store.last_attempt_id,
            user_id: attempt.user_id,
            school: attempt.school,
            matiere: attempt.matiere,
            total_questions: attempt.total_questions,
            score: attempt.score,
            total_points: attempt.total_points,
            max_points: attempt.max_points,
            percentage: attempt.percentage,
            time_spent: attempt.time_spent,
            started_at,
            completed_at,
        };

        for answer in attempt.answers {
            store.last_answer_id += 1;
            let id = store.last_answer_id;
            store.answers.push(QuizAnswer {
                id,
                attempt_id: record.id,
                question_id: answer.question_id,
                selected_ids: answer.selected_ids,
                is_correct: answer.is_correct,
                points_earned: answer.points_earned,
                time_spent: answer.time_spent,
            });
        }
        store.attempts.insert(record.id, record.clone());

        Ok(record)
    }

    async fn increment_counters(&self, question_id: i64, correct: bool) -> Result<(), AppError> {
        let mut store = self.store.write().await;
        if let Some(q) = store.questions.get_mut(&question_id) {
            q.times_answered += 1;
            if correct {
                q.times_correct += 1;
            }
        }
        Ok(())
    }

    async fn list_attempts(
        &self,
        user_id: &str,
        params: &AttemptListParams,
    ) -> Result<Vec<QuizAttempt>, AppError> {
        let store = self.store.read().await;
        let mut attempts: Vec<QuizAttempt> = store
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .filter(|a| params.is_after_cursor(a.completed_at, a.id))
            .filter(|a| params.school.as_ref().is_none_or(|s| &a.school == s))
            .filter(|a| params.matiere.as_ref().is_none_or(|m| &a.matiere == m))
            .cloned()
            .collect();

        attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.id.cmp(&a.id)));
        attempts.truncate(params.limit() as usize);
        Ok(attempts)
    }

    async fn get_attempt(&self, id: i64) -> Result<Option<AttemptDetail>, AppError> {
        let store = self.store.read().await;
        let Some(attempt) = store.attempts.get(&id).cloned() else {
            return Ok(None);
        };

        let answers = store
            .answers
            .iter()
            .filter(|a| a.attempt_id == id)
            .map(|a| {
                let question = store.questions.get(&a.question_id);
                AnswerDetail {
                    question_id: a.question_id,
                    question_text: question.map(|q| q.text.clone()),
                    selected_ids: a.selected_ids.clone(),
                    correct_ids: question.map(|q| q.correct_ids.clone()),
                    is_correct: a.is_correct,
                    points_earned: a.points_earned,
                    time_spent: a.time_spent,
                    explanation: question.and_then(|q| q.explanation.clone()),
                }
            })
            .collect();

        Ok(Some(AttemptDetail { attempt, answers }))
    }

    async fn attempt_summary(&self, user_id: &str) -> Result<AttemptSummary, AppError> {
        let store = self.store.read().await;
        let mine: Vec<&QuizAttempt> = store
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .collect();

        Ok(AttemptSummary {
            attempts: mine.len() as i64,
            average_percentage: average(mine.iter().map(|a| a.percentage)),
            best_percentage: mine.iter().map(|a| a.percentage).fold(0.0, f64::max),
            total_points: mine.iter().map(|a| i64::from(a.total_points)).sum(),
        })
    }

    async fn statistics(&self) -> Result<QcmStatistics, AppError> {
        let store = self.store.read().await;
        let questions: Vec<&Question> = store.questions.values().collect();

        let correct: i64 = questions.iter().map(|q| i64::from(q.times_correct)).sum();
        let answered: i64 = questions.iter().map(|q| i64::from(q.times_answered)).sum();

        Ok(QcmStatistics {
            total_questions: questions.len() as i64,
            active_questions: questions
                .iter()
                .filter(|q| q.status == QuestionStatus::Active)
                .count() as i64,
            by_school: group_by(questions.iter().map(|q| q.school.as_str())),
            by_matiere: group_by(questions.iter().map(|q| q.matiere.as_str())),
            by_difficulty: group_by(questions.iter().map(|q| q.difficulty.as_str())),
            success_rate: percentage(correct, answered),
            total_attempts: store.attempts.len() as i64,
            average_percentage: average(store.attempts.values().map(|a| a.percentage)),
        })
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>, AppError> {
        let store = self.store.read().await;
        let mut counts: BTreeMap<(&str, &str), i64> = BTreeMap::new();
        for q in store.questions.values().filter(|q| q.is_playable()) {
            *counts.entry((q.school.as_str(), q.matiere.as_str())).or_default() += 1;
        }

        Ok(counts
            .into_iter()
            .map(|((school, matiere), questions)| CatalogEntry {
                school: school.to_string(),
                matiere: matiere.to_string(),
                questions,
            })
            .collect())
    }

    async fn create_question(&self, draft: QuestionDraft) -> Result<Question, AppError> {
        let now = chrono::Utc::now();
        let mut store = self.store.write().await;
        store.last_question_id += 1;

        let question = Question {
            id: store.last_question_id,
            text: draft.text,
            options: Json(draft.options),
            correct_ids: draft.correct_ids,
            explanation: draft.explanation,
            school: draft.school,
            matiere: draft.matiere,
            chapter: draft.chapter,
            difficulty: draft.difficulty,
            points: draft.points,
            time_limit: draft.time_limit,
            status: draft.status,
            is_public: draft.is_public,
            times_answered: 0,
            times_correct: 0,
            created_at: now,
            updated_at: now,
        };
        store.questions.insert(question.id, question.clone());

        Ok(question)
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.store.read().await.questions.get(&id).cloned())
    }

    async fn list_questions(&self, params: &QuestionListParams) -> Result<Vec<Question>, AppError> {
        let store = self.store.read().await;
        Ok(store
            .questions
            .values()
            .rev()
            .filter(|q| params.matches(q))
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .cloned()
            .collect())
    }

    async fn update_question(
        &self,
        id: i64,
        draft: QuestionDraft,
    ) -> Result<Option<Question>, AppError> {
        let mut store = self.store.write().await;
        let Some(q) = store.questions.get_mut(&id) else {
            return Ok(None);
        };

        q.text = draft.text;
        q.options = Json(draft.options);
        q.correct_ids = draft.correct_ids;
        q.explanation = draft.explanation;
        q.school = draft.school;
        q.matiere = draft.matiere;
        q.chapter = draft.chapter;
        q.difficulty = draft.difficulty;
        q.points = draft.points;
        q.time_limit = draft.time_limit;
        q.status = draft.status;
        q.is_public = draft.is_public;
        q.updated_at = chrono::Utc::now();

        Ok(Some(q.clone()))
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.store.write().await.questions.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{ContentType, Difficulty, QuestionOption};

    fn draft(school: &str, matiere: &str, status: QuestionStatus, is_public: bool) -> QuestionDraft {
        QuestionDraft {
            text: "Pick A".to_string(),
            options: ["A", "B"]
                .iter()
                .map(|id| QuestionOption {
                    id: id.to_string(),
                    text: id.to_string(),
                    content_type: ContentType::Text,
                    image_url: None,
                })
                .collect(),
            correct_ids: vec!["A".to_string()],
            explanation: None,
            school: school.to_string(),
            matiere: matiere.to_string(),
            chapter: None,
            difficulty: Difficulty::Easy,
            points: 2,
            time_limit: None,
            status,
            is_public,
        }
    }

    async fn seeded() -> MemoryQcmRepository {
        let repo = MemoryQcmRepository::new();
        for _ in 0..5 {
            repo.create_question(draft("Lycee", "Maths", QuestionStatus::Active, true))
                .await
                .unwrap();
        }
        repo.create_question(draft("Lycee", "Maths", QuestionStatus::Draft, true))
            .await
            .unwrap();
        repo.create_question(draft("Lycee", "Maths", QuestionStatus::Active, false))
            .await
            .unwrap();
        repo.create_question(draft("Lycee", "Physique", QuestionStatus::Active, true))
            .await
            .unwrap();
        repo
    }

    #[tokio::test]
    async fn sampling_caps_at_requested_count() {
        let repo = seeded().await;
        let picked = repo.sample_questions("Lycee", "Maths", 3).await.unwrap();
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|q| q.is_playable() && q.matiere == "Maths"));
    }

    #[tokio::test]
    async fn sampling_returns_everything_available() {
        let repo = seeded().await;
        let picked = repo.sample_questions("Lycee", "Maths", 50).await.unwrap();
        // Draft and private questions are never served.
        assert_eq!(picked.len(), 5);

        let mut ids: Vec<i64> = picked.iter().map(|q| q.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn sampling_unknown_subject_is_empty() {
        let repo = seeded().await;
        assert!(repo.sample_questions("Lycee", "Chimie", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counters_and_statistics() {
        let repo = seeded().await;
        repo.increment_counters(1, true).await.unwrap();
        repo.increment_counters(1, false).await.unwrap();
        repo.increment_counters(2, true).await.unwrap();
        repo.increment_counters(999, true).await.unwrap();

        let stats = repo.statistics().await.unwrap();
        assert_eq!(stats.total_questions, 8);
        assert_eq!(stats.active_questions, 7);
        assert_eq!(stats.success_rate, 66.7);
        assert_eq!(
            stats.by_matiere,
            vec![
                GroupCount { key: "Maths".to_string(), count: 7 },
                GroupCount { key: "Physique".to_string(), count: 1 },
            ]
        );
        assert_eq!(stats.by_difficulty[0].key, "EASY");
    }

    #[tokio::test]
    async fn catalog_counts_playable_questions() {
        let repo = seeded().await;
        let catalog = repo.catalog().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].matiere, "Maths");
        assert_eq!(catalog[0].questions, 5);
        assert_eq!(catalog[1].questions, 1);
    }

    #[tokio::test]
    async fn cursor_keeps_attempts_sharing_a_timestamp() {
        let repo = MemoryQcmRepository::new();
        for _ in 0..3 {
            repo.record_attempt(NewAttempt {
                user_id: "u1".to_string(),
                school: "Lycee".to_string(),
                matiere: "Maths".to_string(),
                total_questions: 1,
                score: 1,
                total_points: 2,
                max_points: 2,
                percentage: 100.0,
                time_spent: 10,
                answers: Vec::new(),
            })
            .await
            .unwrap();
        }
        let same_instant = chrono::Utc::now();
        for attempt in repo.store.write().await.attempts.values_mut() {
            attempt.completed_at = same_instant;
        }

        let mut params = AttemptListParams {
            limit: Some(2),
            ..Default::default()
        };
        let first = repo.list_attempts("u1", &params).await.unwrap();
        assert_eq!(first.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 2]);

        let last = &first[1];
        params.cursor = Some(last.completed_at);
        params.cursor_id = Some(last.id);
        let second = repo.list_attempts("u1", &params).await.unwrap();
        assert_eq!(second.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1]);
    }
}
