// src/models/exam.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html};

/// A loaded exam. Immutable for the lifetime of any session built on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Total time allowed for one attempt.
    pub duration_seconds: u64,
    pub total_marks: u32,
    pub passing_score: u32,
    /// Presentation order.
    pub questions: Vec<Question>,
}

impl Exam {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub marks: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Options and the answer key only exist for objective questions, so a
/// theory question can never carry either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    Objective {
        options: Vec<String>,
        correct_answer: String,
    },
    Theory,
}

impl Question {
    pub fn tag(&self) -> QuestionKindTag {
        match self.kind {
            QuestionKind::Objective { .. } => QuestionKindTag::Objective,
            QuestionKind::Theory => QuestionKindTag::Theory,
        }
    }

    pub fn correct_answer(&self) -> Option<&str> {
        match &self.kind {
            QuestionKind::Objective { correct_answer, .. } => Some(correct_answer),
            QuestionKind::Theory => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKindTag {
    Objective,
    Theory,
}

impl QuestionKindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKindTag::Objective => "objective",
            QuestionKindTag::Theory => "theory",
        }
    }
}

/// DTO for sending a question to a candidate (excludes the answer key).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKindTag,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub marks: u32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        let options = match &q.kind {
            QuestionKind::Objective { options, .. } => options.clone(),
            QuestionKind::Theory => Vec::new(),
        };
        PublicQuestion {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            kind: q.tag(),
            options,
            marks: q.marks,
        }
    }
}

/// Candidate-facing view of an exam.
#[derive(Debug, Clone, Serialize)]
pub struct PublicExam {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration_seconds: u64,
    pub total_marks: u32,
    pub passing_score: u32,
    pub questions: Vec<PublicQuestion>,
}

impl From<&Exam> for PublicExam {
    fn from(exam: &Exam) -> Self {
        PublicExam {
            id: exam.id.clone(),
            title: exam.title.clone(),
            description: exam.description.clone(),
            duration_seconds: exam.duration_seconds,
            total_marks: exam.total_marks,
            passing_score: exam.passing_score,
            questions: exam.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: u32,
    pub passing_score: u32,
    #[validate(length(min = 1, max = 200), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for one question inside `CreateExamRequest`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,
    pub kind: QuestionKindTag,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub marks: u32,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("options_need_at_least_two"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}

impl CreateExamRequest {
    /// Builds the exam, sanitizing free text and checking question shapes.
    pub fn into_exam(self, exam_id: String) -> Result<Exam, AppError> {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(pos, q)| q.into_question(format!("{}-q{}", exam_id, pos + 1)))
            .collect::<Result<Vec<_>, _>>()?;

        let total_marks = questions.iter().map(|q| q.marks).sum::<u32>();
        if self.passing_score > total_marks {
            return Err(AppError::BadRequest(format!(
                "Passing score {} exceeds total marks {}",
                self.passing_score, total_marks
            )));
        }

        Ok(Exam {
            id: exam_id,
            title: clean_html(&self.title),
            description: clean_html(&self.description),
            duration_seconds: u64::from(self.duration_minutes) * 60,
            total_marks,
            passing_score: self.passing_score,
            questions,
        })
    }
}

impl CreateQuestionRequest {
    fn into_question(self, id: String) -> Result<Question, AppError> {
        let kind = match (self.kind, self.options, self.correct_answer) {
            (QuestionKindTag::Objective, Some(options), Some(correct_answer)) => {
                if !options.contains(&correct_answer) {
                    return Err(AppError::BadRequest(format!(
                        "Correct answer for '{}' is not one of its options",
                        self.prompt
                    )));
                }
                QuestionKind::Objective {
                    options,
                    correct_answer,
                }
            }
            (QuestionKindTag::Objective, _, _) => {
                return Err(AppError::BadRequest(
                    "Objective questions need options and a correct answer".to_string(),
                ));
            }
            (QuestionKindTag::Theory, None, None) => QuestionKind::Theory,
            (QuestionKindTag::Theory, _, _) => {
                return Err(AppError::BadRequest(
                    "Theory questions cannot carry options or a correct answer".to_string(),
                ));
            }
        };

        Ok(Question {
            id,
            prompt: clean_html(&self.prompt),
            marks: self.marks,
            kind,
        })
    }
}
