// src/session/grading.rs

use std::collections::HashMap;

use crate::models::{
    attempt::Score,
    exam::{Exam, QuestionKind},
};

/// Scores the objective part of an attempt.
///
/// An objective question earns its marks only when the answer equals the
/// key exactly (case-sensitive, untrimmed). Theory marks are reported as
/// pending and never counted.
pub fn provisional_score(exam: &Exam, answers: &HashMap<String, String>) -> Score {
    let mut score = Score {
        awarded: 0,
        total_possible: 0,
        pending_theory_marks: 0,
    };

    for question in &exam.questions {
        score.total_possible += question.marks;
        match &question.kind {
            QuestionKind::Objective { correct_answer, .. } => {
                if answers.get(&question.id) == Some(correct_answer) {
                    score.awarded += question.marks;
                }
            }
            QuestionKind::Theory => score.pending_theory_marks += question.marks,
        }
    }

    score
}
