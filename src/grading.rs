// src/grading.rs

//! Quiz grading.
//!
//! An answer is correct only when the selected option ids form exactly the
//! same set as the question's correct ids. There is no partial credit.

use std::collections::{HashMap, HashSet};

use crate::models::{
    attempt::{AnswerSubmission, GradedAnswer, NewAnswer, NewAttempt},
    question::AnswerKey,
};

/// Outcome of grading a whole submission.
#[derive(Debug, Clone)]
pub struct GradedQuiz {
    /// Number of correct answers.
    pub score: i32,
    pub total_points: i32,
    pub max_points: i32,
    pub percentage: f64,
    pub answers: Vec<GradedAnswer>,
    time_spent: Vec<Option<i32>>,
}

/// Set equality between the selected ids and the correct ids.
/// Order and repeated ids do not matter.
pub fn is_exact_match(correct_ids: &[String], selected_ids: &[String]) -> bool {
    let correct: HashSet<&str> = correct_ids.iter().map(String::as_str).collect();
    let selected: HashSet<&str> = selected_ids.iter().map(String::as_str).collect();
    correct == selected
}

/// Grades one answer. A missing key (question deleted or never existed)
/// grades as incorrect with zero points.
pub fn grade_answer(key: Option<&AnswerKey>, submission: &AnswerSubmission) -> GradedAnswer {
    let is_correct = key.is_some_and(|k| is_exact_match(&k.correct_ids, &submission.selected_ids));
    let points_earned = match key {
        Some(k) if is_correct => k.points,
        _ => 0,
    };

    GradedAnswer {
        question_id: submission.question_id,
        selected_ids: submission.selected_ids.clone(),
        correct_ids: key.map(|k| k.correct_ids.clone()),
        is_correct,
        points_earned,
        explanation: key.and_then(|k| k.explanation.clone()),
    }
}

/// Grades every submitted answer against the answer keys and aggregates the result.
/// `max_points` counts only questions that were found.
pub fn grade_quiz(keys: &HashMap<i64, AnswerKey>, submissions: &[AnswerSubmission]) -> GradedQuiz {
    let mut score = 0;
    let mut total_points = 0;
    let mut max_points = 0;
    let mut answers = Vec::with_capacity(submissions.len());

    for submission in submissions {
        let key = keys.get(&submission.question_id);
        let graded = grade_answer(key, submission);

        if let Some(k) = key {
            max_points += k.points;
        }
        if graded.is_correct {
            score += 1;
        }
        total_points += graded.points_earned;
        answers.push(graded);
    }

    GradedQuiz {
        score,
        total_points,
        max_points,
        percentage: percentage(total_points as i64, max_points as i64),
        answers,
        time_spent: submissions.iter().map(|s| s.time_spent).collect(),
    }
}

/// `earned / max * 100`, rounded to one decimal. Zero when `max` is zero.
pub fn percentage(earned: i64, max: i64) -> f64 {
    if max <= 0 {
        return 0.0;
    }
    round1(earned as f64 / max as f64 * 100.0)
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl GradedQuiz {
    /// Builds the record to persist for `user_id`.
    pub fn to_new_attempt(
        &self,
        user_id: &str,
        school: &str,
        matiere: &str,
        time_spent: i32,
    ) -> NewAttempt {
        NewAttempt {
            user_id: user_id.to_string(),
            school: school.to_string(),
            matiere: matiere.to_string(),
            total_questions: self.answers.len() as i32,
            score: self.score,
            total_points: self.total_points,
            max_points: self.max_points,
            percentage: self.percentage,
            time_spent,
            answers: self
                .answers
                .iter()
                .zip(&self.time_spent)
                .map(|(a, t)| NewAnswer {
                    question_id: a.question_id,
                    selected_ids: a.selected_ids.clone(),
                    is_correct: a.is_correct,
                    points_earned: a.points_earned,
                    time_spent: *t,
                })
                .collect(),
        }
    }

    /// (question_id, is_correct) for every answer whose question exists.
    pub fn counter_updates(&self) -> Vec<(i64, bool)> {
        self.answers
            .iter()
            .filter(|a| a.correct_ids.is_some())
            .map(|a| (a.question_id, a.is_correct))
            .collect()
    }
}
