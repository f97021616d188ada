//! Login, registration and password-change flows.
//!
//! Login bumps the identity's token version first and mints against the new
//! value, so the freshly issued token is the only live one. Two concurrent
//! logins both bump; the later mint wins and the earlier token comes back
//! superseded ("logged in elsewhere"), which is the intended outcome.

use crate::error::{AppError, AppResult};
use crate::security;
use crate::store::{NewUser, Role, Store, User};
use tracing::info;

use super::token::TokenSigner;

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
}

pub fn login(store: &Store, signer: &TokenSigner, email: &str, password: &str) -> AppResult<LoginOutcome> {
    let Some(user) = store.find_user_by_email(email)? else {
        return Err(AppError::unauthenticated("invalid_credentials", "Invalid credentials"));
    };
    if !security::verify_password(&user.password_hash, password) {
        return Err(AppError::unauthenticated("invalid_credentials", "Invalid credentials"));
    }
    // Bump first, then mint against the new version: older sessions die here.
    store.bump_token_version(&user.id)?;
    let user = store
        .find_user_by_id(&user.id)?
        .ok_or_else(|| AppError::unauthenticated("identity_not_found", "User not found"))?;
    let token = signer.mint(&user);
    info!(target: "auth", "login user={} version={}", user.id, user.token_version);
    Ok(LoginOutcome { user, token })
}

/// Create an identity and mint its first token (version 0; registration does
/// not bump).
pub fn register(
    store: &Store,
    signer: &TokenSigner,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> AppResult<LoginOutcome> {
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(AppError::validation("missing_field", "Please add all fields"));
    }
    let hash = security::hash_password(password)?;
    let user = store.create_user(NewUser::new(name, email, &hash, role))?;
    let token = signer.mint(&user);
    info!(target: "auth", "register user={} role={}", user.id, user.role.as_str());
    Ok(LoginOutcome { user, token })
}

/// Self-service or admin-forced password change. The store bumps the version
/// as part of `set_password`, so every outstanding session is revoked; the
/// returned token is minted against the new version for the caller to hand
/// back when the change is self-service.
pub fn change_password(store: &Store, signer: &TokenSigner, user_id: &str, new_password: &str) -> AppResult<String> {
    if new_password.is_empty() {
        return Err(AppError::validation("missing_field", "Please add a password"));
    }
    let hash = security::hash_password(new_password)?;
    store.set_password(user_id, &hash)?;
    let user = store
        .find_user_by_id(user_id)?
        .ok_or_else(|| AppError::not_found("user_not_found", "User not found"))?;
    info!(target: "auth", "password_change user={} version={}", user.id, user.token_version);
    Ok(signer.mint(&user))
}
