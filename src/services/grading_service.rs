use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};
use crate::models::attempt::AnswerSheet;
use crate::models::question::Question;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuestionResult {
    pub question_number: i32,
    pub selected_answer: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points: i32,
    pub points_earned: i32,
    pub explanation: Option<String>,
    pub source_module: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GradeReport {
    pub results: Vec<QuestionResult>,
    pub earned_points: i32,
    pub total_points: i32,
    /// Rounded percentage, 0 when there are no points to award.
    pub score: i32,
    pub passing_score: i32,
    pub passed: bool,
    pub correct_answers: i32,
    pub total_questions: i32,
}

pub struct GradingService;

impl GradingService {
    /// Grades `answers` against the key. Exact option-id match, no partial
    /// credit, no negative marking.
    pub fn grade(questions: &[Question], answers: &AnswerSheet, passing_score: i32) -> GradeReport {
        let mut earned_points = 0;
        let mut total_points = 0;
        let mut correct_answers = 0;
        let mut results = Vec::with_capacity(questions.len());

        for q in questions {
            total_points += q.points;
            let selected = answers.get(&q.question_number).cloned();
            let is_correct = selected.as_deref() == Some(q.correct_answer.as_str());
            let points_earned = if is_correct { q.points } else { 0 };
            if is_correct {
                correct_answers += 1;
            }
            earned_points += points_earned;

            results.push(QuestionResult {
                question_number: q.question_number,
                selected_answer: selected,
                correct_answer: q.correct_answer.clone(),
                is_correct,
                points: q.points,
                points_earned,
                explanation: q.explanation.clone(),
                source_module: q.source_module,
            });
        }

        let score = percentage(earned_points, total_points);
        GradeReport {
            results,
            earned_points,
            total_points,
            score,
            passing_score,
            passed: total_points > 0 && score >= passing_score,
            correct_answers,
            total_questions: questions.len() as i32,
        }
    }

    /// Rejects answers keyed by question numbers that are not part of the
    /// assessment.
    pub fn validate_answer_keys(questions: &[Question], answers: &AnswerSheet) -> Result<()> {
        let unknown: Vec<i32> = answers
            .keys()
            .copied()
            .filter(|n| !questions.iter().any(|q| q.question_number == *n))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidAnswerSet(unknown))
        }
    }
}

/// `round(100 * part / whole)` with halves rounded up, 0 when `whole` is 0.
pub fn percentage(part: i32, whole: i32) -> i32 {
    if whole <= 0 {
        return 0;
    }
    let part = i64::from(part.max(0));
    let whole = i64::from(whole);
    ((200 * part + whole) / (2 * whole)) as i32
}
