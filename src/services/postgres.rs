// src/services/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{ResultRecord, Submission},
        exam::{Exam, Question, QuestionKind},
    },
    session::{ExamCatalog, SubmissionService},
};

/// Row of the 'exams' table.
#[derive(Debug, FromRow)]
struct ExamRow {
    id: String,
    title: String,
    description: String,
    duration_seconds: i64,
    total_marks: i32,
    passing_score: i32,
}

/// Row of the 'exam_questions' table.
#[derive(Debug, FromRow)]
struct QuestionRow {
    id: String,
    prompt: String,
    /// 'objective' or 'theory'.
    kind: String,
    options: Option<Json<Vec<String>>>,
    correct_answer: Option<String>,
    marks: i32,
}

const SELECT_RESULTS: &str = r#"
    SELECT id, attempt_id, exam_id, candidate_id, answers, provisional_score,
           total_possible, pending_theory_marks, duration_seconds, reason,
           started_at, submitted_at
    FROM exam_results"#;

/// Row of the 'exam_results' table.
#[derive(Debug, FromRow)]
struct ResultRow {
    id: String,
    attempt_id: Uuid,
    exam_id: String,
    candidate_id: String,
    answers: Json<HashMap<String, String>>,
    provisional_score: i32,
    total_possible: i32,
    pending_theory_marks: i32,
    duration_seconds: i64,
    reason: String,
    started_at: DateTime<Utc>,
    submitted_at: DateTime<Utc>,
}

fn to_unsigned<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T, AppError> {
    T::try_from(value).map_err(|_| {
        AppError::InternalServerError(format!("Column {} holds out-of-range value {}", column, value))
    })
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let kind = match (row.kind.as_str(), row.options, row.correct_answer) {
            ("objective", Some(Json(options)), Some(correct_answer)) => QuestionKind::Objective {
                options,
                correct_answer,
            },
            ("theory", None, None) => QuestionKind::Theory,
            (kind, _, _) => {
                return Err(AppError::InternalServerError(format!(
                    "Question {} has inconsistent '{}' row",
                    row.id, kind
                )));
            }
        };

        Ok(Question {
            marks: to_unsigned(i64::from(row.marks), "exam_questions.marks")?,
            id: row.id,
            prompt: row.prompt,
            kind,
        })
    }
}

impl TryFrom<ResultRow> for ResultRecord {
    type Error = AppError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(ResultRecord {
            provisional_score: to_unsigned(i64::from(row.provisional_score), "exam_results.provisional_score")?,
            total_possible: to_unsigned(i64::from(row.total_possible), "exam_results.total_possible")?,
            pending_theory_marks: to_unsigned(
                i64::from(row.pending_theory_marks),
                "exam_results.pending_theory_marks",
            )?,
            duration_seconds: to_unsigned(row.duration_seconds, "exam_results.duration_seconds")?,
            reason: row.reason.parse()?,
            result_id: row.id,
            attempt_id: row.attempt_id,
            exam_id: row.exam_id,
            candidate_id: row.candidate_id,
            answers: row.answers.0,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
        })
    }
}

#[derive(Clone)]
pub struct PgExamCatalog {
    pool: PgPool,
}

impl PgExamCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a new exam and its questions in one transaction.
    pub async fn create(&self, exam: &Exam, created_by: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO exams (id, title, description, duration_seconds, total_marks, passing_score, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&exam.id)
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(exam.duration_seconds as i64)
        .bind(exam.total_marks as i32)
        .bind(exam.passing_score as i32)
        .bind(created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam: {:?}", e);
            AppError::from(e)
        })?;

        for (position, question) in exam.questions.iter().enumerate() {
            let (options, correct_answer) = match &question.kind {
                QuestionKind::Objective {
                    options,
                    correct_answer,
                } => (Some(Json(options)), Some(correct_answer)),
                QuestionKind::Theory => (None, None),
            };

            sqlx::query(
                r#"
                INSERT INTO exam_questions (id, exam_id, position, prompt, kind, options, correct_answer, marks)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&question.id)
            .bind(&exam.id)
            .bind(position as i32)
            .bind(&question.prompt)
            .bind(question.tag().as_str())
            .bind(options)
            .bind(correct_answer)
            .bind(question.marks as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ExamCatalog for PgExamCatalog {
    async fn get(&self, exam_id: &str) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, title, description, duration_seconds, total_marks, passing_score
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch exam {}: {:?}", exam_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        let Some(exam) = exam else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, prompt, kind, options, correct_answer, marks
            FROM exam_questions
            WHERE exam_id = $1
            ORDER BY position
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Exam {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            duration_seconds: to_unsigned(exam.duration_seconds, "exams.duration_seconds")?,
            total_marks: to_unsigned(i64::from(exam.total_marks), "exams.total_marks")?,
            passing_score: to_unsigned(i64::from(exam.passing_score), "exams.passing_score")?,
            questions,
        }))
    }
}

#[derive(Clone)]
pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionService for PgSubmissionStore {
    async fn submit(&self, submission: &Submission) -> Result<String, AppError> {
        // On a repeated attempt id the no-op update makes RETURNING yield
        // the id stored the first time.
        let result_id: String = sqlx::query_scalar(
            r#"
            INSERT INTO exam_results
                (id, attempt_id, exam_id, candidate_id, answers, provisional_score,
                 total_possible, pending_theory_marks, duration_seconds, reason,
                 started_at, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (attempt_id) DO UPDATE SET attempt_id = EXCLUDED.attempt_id
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(submission.attempt_id)
        .bind(&submission.exam_id)
        .bind(&submission.candidate_id)
        .bind(Json(&submission.answers))
        .bind(submission.score.awarded as i32)
        .bind(submission.score.total_possible as i32)
        .bind(submission.score.pending_theory_marks as i32)
        .bind(submission.duration_seconds as i64)
        .bind(submission.reason.as_str())
        .bind(submission.started_at)
        .bind(submission.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // Another attempt of the same candidate at the same exam got there first.
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "{} already has a result for exam '{}'",
                submission.candidate_id, submission.exam_id
            )),
            _ => {
                tracing::error!(attempt_id = %submission.attempt_id, "Failed to store exam result: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

        Ok(result_id)
    }

    async fn find(
        &self,
        exam_id: &str,
        candidate_id: &str,
    ) -> Result<Option<ResultRecord>, AppError> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "{} WHERE exam_id = $1 AND candidate_id = $2",
            SELECT_RESULTS
        ))
        .bind(exam_id)
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ResultRecord::try_from).transpose()
    }

    async fn for_candidate(&self, candidate_id: &str) -> Result<Vec<ResultRecord>, AppError> {
        sqlx::query_as::<_, ResultRow>(&format!(
            "{} WHERE candidate_id = $1 ORDER BY submitted_at DESC",
            SELECT_RESULTS
        ))
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ResultRecord::try_from)
        .collect()
    }

    async fn for_exam(&self, exam_id: &str) -> Result<Vec<ResultRecord>, AppError> {
        sqlx::query_as::<_, ResultRow>(&format!(
            "{} WHERE exam_id = $1 ORDER BY submitted_at DESC",
            SELECT_RESULTS
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ResultRecord::try_from)
        .collect()
    }
}
