use crate::models::attempt::{AnswerMap, AttemptResult};
use crate::models::question::Question;

/// Percentage at or above which an attempt counts as passed
pub const PASS_THRESHOLD_PERCENT: f64 = 70.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub score: f64,
    pub max_score: f64,
    pub results: Vec<AttemptResult>,
}

impl Grade {
    pub fn percentage(&self) -> f64 {
        if self.max_score <= 0.0 {
            0.0
        } else {
            self.score / self.max_score * 100.0
        }
    }

    pub fn passed(&self) -> bool {
        self.percentage() >= PASS_THRESHOLD_PERCENT
    }
}

/// All-or-nothing per question; unanswered questions earn nothing
pub fn grade(questions: &[Question], answers: &AnswerMap) -> Grade {
    let mut score = 0.0;
    let mut max_score = 0.0;
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        let answer = answers.get(&question.id);
        let correct = question.is_correct(answer);
        let points_awarded = if correct { question.points } else { 0.0 };

        max_score += question.points;
        score += points_awarded;
        results.push(AttemptResult {
            question_id: question.id.clone(),
            correct,
            points_awarded,
            points: question.points,
            answer: answer.cloned(),
            correct_answer: None,
        });
    }

    Grade {
        score,
        max_score,
        results,
    }
}

/// Fills in the expected answers, for viewers allowed to see them
pub fn reveal_correct_answers(results: &mut [AttemptResult], questions: &[Question]) {
    for result in results.iter_mut() {
        result.correct_answer = questions
            .iter()
            .find(|q| q.id == result.question_id)
            .map(Question::correct_answer);
    }
}
