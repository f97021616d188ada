//! Identity records and their token version counters.
//!
//! `token_version` only ever moves forward. It advances on login and on every
//! password change; any token minted against an older value is dead the moment
//! the counter moves. That is the entire session-revocation mechanism, so
//! `set_password` bumps it unconditionally.

use super::Store;
use crate::error::{AppError, AppResult};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "employee" => Some(Role::Employee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub token_version: i64,
    pub phone: String,
    pub job_title: String,
    pub department: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: String,
    pub job_title: String,
    pub department: String,
}

impl NewUser {
    pub fn new(name: &str, email: &str, password_hash: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            phone: String::new(),
            job_title: "Staff".to_string(),
            department: "General".to_string(),
        }
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role_str: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        role: Role::parse(&role_str).unwrap_or(Role::Employee),
        token_version: row.get("token_version")?,
        phone: row.get("phone")?,
        job_title: row.get("job_title")?,
        department: row.get("department")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const USER_COLS: &str =
    "id, name, email, password_hash, role, token_version, phone, job_title, department, created_at, updated_at";

impl Store {
    /// Create an identity. Fails with Conflict when the email is taken; a
    /// failed create leaves no record and touches no counters.
    pub fn create_user(&self, new: NewUser) -> AppResult<User> {
        if self.find_user_by_email(&new.email)?.is_some() {
            return Err(AppError::conflict("duplicate_email", "User already exists"));
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, token_version, phone, job_title, department, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9, ?9)",
            params![id, new.name, new.email, new.password_hash, new.role.as_str(), new.phone, new.job_title, new.department, now],
        )?;
        self.find_user_by_id(&id)?
            .ok_or_else(|| AppError::internal("store_error", "created user not readable"))
    }

    pub fn find_user_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Email lookup is case-sensitive, matching the store's unique index.
    pub fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
                [email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> AppResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLS} FROM users ORDER BY created_at"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Advance the token version, invalidating every outstanding token for the
    /// identity. Returns the new version.
    pub fn bump_token_version(&self, id: &str) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE users SET token_version = token_version + 1, updated_at = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        if changed == 0 {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        let ver: i64 = self
            .conn
            .query_row("SELECT token_version FROM users WHERE id = ?1", [id], |r| r.get(0))?;
        Ok(ver)
    }

    /// Replace the password hash. Always bumps the token version as a side
    /// effect; this is the sole mechanism for revoking all outstanding
    /// sessions, so it is not optional. Returns the new version.
    pub fn set_password(&self, id: &str, new_hash: &str) -> AppResult<i64> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?2, token_version = token_version + 1, updated_at = ?3 WHERE id = ?1",
            params![id, new_hash, now],
        )?;
        if changed == 0 {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        let ver: i64 = self
            .conn
            .query_row("SELECT token_version FROM users WHERE id = ?1", [id], |r| r.get(0))?;
        Ok(ver)
    }

    pub fn update_user_profile(&self, id: &str, name: Option<&str>, email: Option<&str>) -> AppResult<User> {
        let Some(current) = self.find_user_by_id(id)? else {
            return Err(AppError::not_found("user_not_found", "User not found"));
        };
        let name = name.filter(|s| !s.is_empty()).unwrap_or(&current.name);
        let email = email.filter(|s| !s.is_empty()).unwrap_or(&current.email);
        if email != current.email && self.find_user_by_email(email)?.is_some() {
            return Err(AppError::conflict("duplicate_email", "User already exists"));
        }
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE users SET name = ?2, email = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, name, email, now],
        )?;
        self.find_user_by_id(id)?
            .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))
    }

    /// Hard delete. Tokens minted for this identity fail verification
    /// afterwards because the identity lookup fails.
    pub fn delete_user(&self, id: &str) -> AppResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(AppError::not_found("user_not_found", "User not found"));
        }
        Ok(())
    }
}
