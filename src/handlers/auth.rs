// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, User},
    utils::{hash::verify_password, jwt::sign_jwt},
};

/// Authenticates a student, staff member or admin and returns a JWT token.
///
/// Verifies the login ID and password against the database.
/// If valid, signs a JWT token carrying the login ID and role.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT login_id, full_name, password, role, created_at
        FROM users
        WHERE login_id = $1
        "#,
    )
    .bind(&payload.login_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // Same message for unknown IDs and bad passwords.
    let invalid = || AppError::AuthError("Invalid login ID or password".to_string());

    let user = user.ok_or_else(invalid)?;
    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let token = sign_jwt(
        &user.login_id,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    tracing::info!(login_id = %user.login_id, role = %user.role, "User logged in");

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
        "full_name": user.full_name,
    })))
}
