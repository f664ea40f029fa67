// src/models/user.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::ids::{Section, StaffIdFormat};

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Generated student/staff ID, or the seeded admin's username.
    pub login_id: String,

    pub full_name: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'student', 'staff' or 'admin'.
    pub role: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub login_id: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for an admin creating a student account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 2, max = 100, message = "Name length must be between 2 and 100 characters."))]
    pub full_name: String,
    pub section: Section,
    /// Two-digit admission year; defaults to the current year.
    #[validate(length(equal = 2))]
    pub year: Option<String>,
}

/// DTO for an admin creating a staff account.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(length(min = 2, max = 100, message = "Name length must be between 2 and 100 characters."))]
    pub full_name: String,
    #[serde(default)]
    pub format: StaffIdFormat,
    #[validate(length(equal = 3))]
    pub department_code: Option<String>,
    #[validate(length(equal = 2))]
    pub year: Option<String>,
}

/// One-time credentials returned when an account is created.
#[derive(Debug, Serialize)]
pub struct Credentials {
    pub login_id: String,
    pub password: String,
    pub email: String,
    pub role: Role,
}
