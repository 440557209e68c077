use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::attempt::AttemptAnswer;
use super::new_id;

/// Question stored in MongoDB "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub quiz: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub points: f64,
    /// Prompt text shown to the student
    pub question: String,
    #[serde(default)]
    pub order: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum QuestionKind {
    #[serde(rename = "MULTIPLE_CHOICE")]
    MultipleChoice { answers: Vec<Choice> },
    #[serde(rename = "TRUE_FALSE")]
    TrueFalse {
        #[serde(rename = "correctAnswer")]
        correct_answer: bool,
    },
    #[serde(rename = "FILL_BLANK")]
    FillBlank {
        #[serde(rename = "possibleAnswers")]
        possible_answers: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "isCorrect", default)]
    pub is_correct: bool,
}

/// Editor payload for create and update
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub question: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl QuestionDraft {
    /// Normalizes the draft the way the editor's save button does, or explains why it can't be saved
    pub fn validate_draft(self) -> Result<QuestionDraft, String> {
        let prompt = self.question.trim();
        if prompt.is_empty() {
            return Err("Question text is required".to_string());
        }
        if !self.points.is_finite() || self.points < 0.0 {
            return Err("Points must be a non-negative number".to_string());
        }

        let kind = match self.kind {
            QuestionKind::MultipleChoice { answers } => {
                let answers: Vec<Choice> = answers
                    .into_iter()
                    .filter(|choice| !choice.text.trim().is_empty())
                    .map(|mut choice| {
                        choice.text = choice.text.trim().to_string();
                        if choice.id.trim().is_empty() {
                            choice.id = new_id();
                        }
                        choice
                    })
                    .collect();
                if answers.len() < 2 {
                    return Err("Multiple choice questions need at least two answers".to_string());
                }
                if !answers.iter().any(|choice| choice.is_correct) {
                    return Err("Mark at least one answer as correct".to_string());
                }
                QuestionKind::MultipleChoice { answers }
            }
            QuestionKind::FillBlank { possible_answers } => {
                let possible_answers: Vec<String> = possible_answers
                    .iter()
                    .map(|answer| answer.trim())
                    .filter(|answer| !answer.is_empty())
                    .map(str::to_string)
                    .collect();
                if possible_answers.is_empty() {
                    return Err("Fill in the blank questions need at least one answer".to_string());
                }
                QuestionKind::FillBlank { possible_answers }
            }
            kind @ QuestionKind::TrueFalse { .. } => kind,
        };

        Ok(QuestionDraft {
            title: self.title.trim().to_string(),
            points: self.points,
            question: prompt.to_string(),
            kind,
        })
    }
}

impl Question {
    pub fn from_draft(id: String, quiz: String, order: u32, draft: QuestionDraft) -> Self {
        Question {
            id,
            quiz,
            title: draft.title,
            points: draft.points,
            question: draft.question,
            order,
            kind: draft.kind,
        }
    }

    pub fn is_correct(&self, answer: Option<&AttemptAnswer>) -> bool {
        let Some(answer) = answer else {
            return false;
        };
        match (&self.kind, answer) {
            (QuestionKind::MultipleChoice { answers }, AttemptAnswer::Text(selected)) => answers
                .iter()
                .any(|choice| choice.is_correct && choice.id == *selected),
            (QuestionKind::TrueFalse { correct_answer }, answer) => {
                answer.as_bool() == Some(*correct_answer)
            }
            (QuestionKind::FillBlank { possible_answers }, AttemptAnswer::Text(text)) => {
                let given = text.trim().to_lowercase();
                possible_answers
                    .iter()
                    .any(|candidate| candidate.trim().to_lowercase() == given)
            }
            _ => false,
        }
    }

    pub fn correct_answer(&self) -> CorrectAnswer {
        match &self.kind {
            QuestionKind::MultipleChoice { answers } => CorrectAnswer::Choices(
                answers
                    .iter()
                    .filter(|choice| choice.is_correct)
                    .map(|choice| choice.id.clone())
                    .collect(),
            ),
            QuestionKind::TrueFalse { correct_answer } => CorrectAnswer::Boolean(*correct_answer),
            QuestionKind::FillBlank { possible_answers } => {
                CorrectAnswer::Choices(possible_answers.clone())
            }
        }
    }

    pub fn accepts_answer_shape(&self, answer: &AttemptAnswer) -> bool {
        match (&self.kind, answer) {
            (QuestionKind::TrueFalse { .. }, answer) => answer.as_bool().is_some(),
            (_, AttemptAnswer::Text(_)) => true,
            _ => false,
        }
    }

    /// Question without any correctness data
    pub fn student_view(&self, shuffle: bool) -> StudentQuestion {
        let kind = match &self.kind {
            QuestionKind::MultipleChoice { answers } => {
                let mut answers: Vec<StudentChoice> = answers
                    .iter()
                    .map(|choice| StudentChoice {
                        id: choice.id.clone(),
                        text: choice.text.clone(),
                    })
                    .collect();
                if shuffle {
                    answers.shuffle(&mut rand::rng());
                }
                StudentQuestionKind::MultipleChoice { answers }
            }
            QuestionKind::TrueFalse { .. } => StudentQuestionKind::TrueFalse {},
            QuestionKind::FillBlank { .. } => StudentQuestionKind::FillBlank {},
        };
        StudentQuestion {
            id: self.id.clone(),
            quiz: self.quiz.clone(),
            title: self.title.clone(),
            points: self.points,
            question: self.question.clone(),
            order: self.order,
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Boolean(bool),
    Choices(Vec<String>),
}

#[derive(Debug, Serialize)]
pub struct StudentQuestion {
    #[serde(rename = "_id")]
    pub id: String,
    pub quiz: String,
    pub title: String,
    pub points: f64,
    pub question: String,
    pub order: u32,
    #[serde(flatten)]
    pub kind: StudentQuestionKind,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum StudentQuestionKind {
    #[serde(rename = "MULTIPLE_CHOICE")]
    MultipleChoice { answers: Vec<StudentChoice> },
    #[serde(rename = "TRUE_FALSE")]
    TrueFalse {},
    #[serde(rename = "FILL_BLANK")]
    FillBlank {},
}

#[derive(Debug, Serialize)]
pub struct StudentChoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
}

/// Either the full editor view or the student view, depending on the caller
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuestionView {
    Full(Question),
    Student(StudentQuestion),
}

#[derive(Debug, Deserialize)]
pub struct ReorderQuestionsRequest {
    /// Question ids in their new order
    pub order: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(value: serde_json::Value) -> QuestionDraft {
        serde_json::from_value(value).unwrap()
    }

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: "q1".to_string(),
            quiz: "quiz1".to_string(),
            title: "Q".to_string(),
            points: 5.0,
            question: "?".to_string(),
            order: 0,
            kind,
        }
    }

    #[test]
    fn multiple_choice_drops_blank_answers_and_needs_a_correct_one() {
        let valid = draft(json!({
            "question": "  Which planet is red? ",
            "points": 4,
            "type": "MULTIPLE_CHOICE",
            "answers": [
                { "text": "Mars", "isCorrect": true },
                { "text": "   ", "isCorrect": false },
                { "text": "Venus", "isCorrect": false }
            ]
        }))
        .validate_draft()
        .unwrap();

        assert_eq!(valid.question, "Which planet is red?");
        match valid.kind {
            QuestionKind::MultipleChoice { answers } => {
                assert_eq!(answers.len(), 2);
                assert!(answers.iter().all(|choice| !choice.id.is_empty()));
            }
            other => panic!("unexpected kind {:?}", other),
        }

        let only_one = draft(json!({
            "question": "Pick",
            "type": "MULTIPLE_CHOICE",
            "answers": [{ "text": "A", "isCorrect": true }, { "text": "", "isCorrect": false }]
        }));
        assert!(only_one.validate_draft().is_err());

        let none_correct = draft(json!({
            "question": "Pick",
            "type": "MULTIPLE_CHOICE",
            "answers": [{ "text": "A" }, { "text": "B" }]
        }));
        assert!(none_correct.validate_draft().is_err());
    }

    #[test]
    fn fill_blank_trims_and_requires_an_answer() {
        let valid = draft(json!({
            "question": "Capital of France?",
            "type": "FILL_BLANK",
            "possibleAnswers": ["  Paris ", "", "   "]
        }))
        .validate_draft()
        .unwrap();
        assert_eq!(
            valid.kind,
            QuestionKind::FillBlank {
                possible_answers: vec!["Paris".to_string()]
            }
        );

        let empty = draft(json!({
            "question": "Capital?",
            "type": "FILL_BLANK",
            "possibleAnswers": [" "]
        }));
        assert!(empty.validate_draft().is_err());
    }

    #[test]
    fn blank_prompt_and_negative_points_are_rejected() {
        let blank = draft(json!({ "question": "  ", "type": "TRUE_FALSE", "correctAnswer": true }));
        assert!(blank.validate_draft().is_err());

        let negative = draft(json!({
            "question": "Sky is blue",
            "points": -1,
            "type": "TRUE_FALSE",
            "correctAnswer": true
        }));
        assert!(negative.validate_draft().is_err());
    }

    #[test]
    fn correctness_rules_per_type() {
        let mc = question(QuestionKind::MultipleChoice {
            answers: vec![
                Choice {
                    id: "a".to_string(),
                    text: "Mars".to_string(),
                    is_correct: true,
                },
                Choice {
                    id: "b".to_string(),
                    text: "Venus".to_string(),
                    is_correct: false,
                },
            ],
        });
        assert!(mc.is_correct(Some(&AttemptAnswer::Text("a".to_string()))));
        assert!(!mc.is_correct(Some(&AttemptAnswer::Text("b".to_string()))));
        assert!(!mc.is_correct(Some(&AttemptAnswer::Bool(true))));
        assert!(!mc.is_correct(None));

        let tf = question(QuestionKind::TrueFalse {
            correct_answer: false,
        });
        assert!(tf.is_correct(Some(&AttemptAnswer::Bool(false))));
        assert!(tf.is_correct(Some(&AttemptAnswer::Text("FALSE".to_string()))));
        assert!(!tf.is_correct(Some(&AttemptAnswer::Text("no".to_string()))));

        let fb = question(QuestionKind::FillBlank {
            possible_answers: vec!["Paris".to_string(), "paris, france".to_string()],
        });
        assert!(fb.is_correct(Some(&AttemptAnswer::Text("  PARIS ".to_string()))));
        assert!(fb.is_correct(Some(&AttemptAnswer::Text("Paris, France".to_string()))));
        assert!(!fb.is_correct(Some(&AttemptAnswer::Text("Lyon".to_string()))));
    }

    #[test]
    fn student_view_hides_correctness() {
        let mc = question(QuestionKind::MultipleChoice {
            answers: vec![
                Choice {
                    id: "a".to_string(),
                    text: "Mars".to_string(),
                    is_correct: true,
                },
                Choice {
                    id: "b".to_string(),
                    text: "Venus".to_string(),
                    is_correct: false,
                },
            ],
        });
        let json = serde_json::to_value(mc.student_view(true)).unwrap();
        assert_eq!(json["type"], "MULTIPLE_CHOICE");
        assert_eq!(json["answers"].as_array().unwrap().len(), 2);
        assert!(!json.to_string().contains("isCorrect"));

        let fb = question(QuestionKind::FillBlank {
            possible_answers: vec!["Paris".to_string()],
        });
        let json = serde_json::to_value(fb.student_view(false)).unwrap();
        assert_eq!(json["type"], "FILL_BLANK");
        assert!(json.get("possibleAnswers").is_none());
    }

    #[test]
    fn stored_question_round_trips_through_json() {
        let stored: Question = serde_json::from_value(json!({
            "_id": "q9",
            "quiz": "quiz1",
            "title": "TF",
            "points": 2,
            "question": "Water is wet",
            "order": 3,
            "type": "TRUE_FALSE",
            "correctAnswer": true
        }))
        .unwrap();
        assert_eq!(stored.order, 3);
        assert_eq!(stored.correct_answer(), CorrectAnswer::Boolean(true));
    }
}
