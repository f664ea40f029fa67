// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{Credentials, CreateStaffRequest, CreateStudentRequest, Role, User},
    utils::{
        hash::{generate_password, hash_password},
        ids::{IdScheme, Section, StaffIdFormat, current_year, next_sequence, staff_email, student_email},
    },
};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
}

/// Lists users, newest first, optionally filtered by role.
/// Admin only.
pub async fn list_users(
    State(pool): State<PgPool>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT login_id, full_name, password, role, created_at
        FROM users
        WHERE $1::TEXT IS NULL OR role = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.role.map(|r| r.as_str()))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Creates a student account with the next free student ID for the
/// section and year, and returns its one-time credentials.
/// Admin only.
pub async fn create_student(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(ids): State<IdScheme>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let year = resolve_year(payload.year.as_deref())?;

    let last = last_issued(&pool, &ids.student_stem(&year, payload.section)).await?;
    let login_id = ids.student_id(&year, payload.section, next_sequence(last.as_deref()))?;

    let password = generate_password();
    insert_user(&pool, &login_id, &payload.full_name, &password, Role::Student).await?;

    tracing::info!(login_id = %login_id, section = payload.section.label(), "Student account created");

    Ok((
        StatusCode::CREATED,
        Json(Credentials {
            email: student_email(&login_id, &config.email_domain),
            login_id,
            password,
            role: Role::Student,
        }),
    ))
}

/// Creates a staff account with the next free staff ID in the requested
/// format, and returns its one-time credentials.
/// Admin only.
pub async fn create_staff(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    State(ids): State<IdScheme>,
    Json(payload): Json<CreateStaffRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let year = resolve_year(payload.year.as_deref())?;
    let department = resolve_department(payload.department_code.as_deref())?;

    let last = last_issued(&pool, &ids.staff_stem(payload.format, &year, department)).await?;
    let login_id = ids.staff_id(
        payload.format,
        &year,
        department,
        next_sequence(last.as_deref()),
    )?;

    let password = generate_password();
    insert_user(&pool, &login_id, &payload.full_name, &password, Role::Staff).await?;

    tracing::info!(login_id = %login_id, format = ?payload.format, "Staff account created");

    Ok((
        StatusCode::CREATED,
        Json(Credentials {
            email: staff_email(&login_id, &config.email_domain),
            login_id,
            password,
            role: Role::Staff,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdPreviewRequest {
    Student {
        section: Section,
        year: Option<String>,
        #[serde(default = "one")]
        start: u32,
        count: u32,
    },
    Staff {
        #[serde(default)]
        format: StaffIdFormat,
        department_code: Option<String>,
        year: Option<String>,
        #[serde(default = "one")]
        start: u32,
        count: u32,
    },
}

fn one() -> u32 {
    1
}

const MAX_PREVIEW: u32 = 500;

/// Generates a batch of IDs without creating accounts.
/// Admin only.
pub async fn preview_ids(
    State(ids): State<IdScheme>,
    Json(payload): Json<IdPreviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = match payload {
        IdPreviewRequest::Student {
            section,
            year,
            start,
            count,
        } => {
            check_count(count)?;
            ids.bulk_student_ids(&resolve_year(year.as_deref())?, section, start, count)?
        }
        IdPreviewRequest::Staff {
            format,
            department_code,
            year,
            start,
            count,
        } => {
            check_count(count)?;
            ids.bulk_staff_ids(
                format,
                &resolve_year(year.as_deref())?,
                resolve_department(department_code.as_deref())?,
                start,
                count,
            )?
        }
    };

    Ok(Json(json!({ "ids": generated })))
}

/// Breaks a student or staff ID into its parts.
/// Admin only.
pub async fn parse_id(
    State(ids): State<IdScheme>,
    Path(login_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(student) = ids.parse_student_id(&login_id) {
        return Ok(Json(json!({ "kind": "student", "id": student })));
    }
    if let Some(staff) = ids.parse_staff_id(&login_id) {
        return Ok(Json(json!({ "kind": "staff", "id": staff })));
    }
    Err(AppError::BadRequest(format!(
        "'{}' is not a valid student or staff ID",
        login_id
    )))
}

fn check_count(count: u32) -> Result<(), AppError> {
    if count == 0 || count > MAX_PREVIEW {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_PREVIEW
        )));
    }
    Ok(())
}

fn resolve_year(year: Option<&str>) -> Result<String, AppError> {
    match year {
        None => Ok(current_year()),
        Some(y) if y.len() == 2 && y.chars().all(|c| c.is_ascii_digit()) => Ok(y.to_string()),
        Some(y) => Err(AppError::BadRequest(format!(
            "Year must be two digits, got '{}'",
            y
        ))),
    }
}

fn resolve_department(code: Option<&str>) -> Result<Option<&str>, AppError> {
    match code {
        // STF would collide with the standard staff format.
        Some(c) if c.len() != 3 || !c.chars().all(|ch| ch.is_ascii_uppercase()) || c == "STF" => {
            Err(AppError::BadRequest(format!(
                "Invalid department code '{}'",
                c
            )))
        }
        other => Ok(other),
    }
}

/// Most recent login ID starting with `stem`. IDs under one stem are
/// zero-padded to a fixed width, so text order is issue order.
async fn last_issued(pool: &PgPool, stem: &str) -> Result<Option<String>, AppError> {
    let last = sqlx::query_scalar::<_, String>(
        "SELECT login_id FROM users WHERE login_id LIKE $1 ORDER BY login_id DESC LIMIT 1",
    )
    .bind(format!("{}%", stem))
    .fetch_optional(pool)
    .await?;
    Ok(last)
}

async fn insert_user(
    pool: &PgPool,
    login_id: &str,
    full_name: &str,
    password: &str,
    role: Role,
) -> Result<(), AppError> {
    let hashed_password = hash_password(password)?;

    sqlx::query(
        r#"
        INSERT INTO users (login_id, full_name, password, role)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(login_id)
    .bind(full_name)
    .bind(hashed_password)
    .bind(role.as_str())
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Login ID '{}' was just taken, try again", login_id))
        }
        _ => {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_must_be_two_digits() {
        assert_eq!(resolve_year(Some("24")).unwrap(), "24");
        assert!(resolve_year(Some("2024")).is_err());
        assert!(resolve_year(Some("2a")).is_err());
        assert_eq!(resolve_year(None).unwrap().len(), 2);
    }

    #[test]
    fn department_codes() {
        assert_eq!(resolve_department(Some("SCI")).unwrap(), Some("SCI"));
        assert_eq!(resolve_department(None).unwrap(), None);
        assert!(resolve_department(Some("STF")).is_err());
        assert!(resolve_department(Some("sci")).is_err());
    }

    #[test]
    fn preview_request_shapes() {
        let req: IdPreviewRequest = serde_json::from_value(serde_json::json!({
            "kind": "student", "section": "primary", "count": 3
        }))
        .unwrap();
        assert!(matches!(req, IdPreviewRequest::Student { start: 1, count: 3, .. }));
    }
}
