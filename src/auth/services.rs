use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::auth::{
    dto::RegisterRequest,
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::error::{AppError, AppResult};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validate, hash and insert. The unique index on `users.email` is what
/// actually rules out duplicates; the store maps it to `Conflict`.
pub async fn register(users: &dyn UserStore, req: RegisterRequest) -> AppResult<User> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }

    let password_hash = hash_password(&req.password)?;
    let user = users
        .create(NewUser {
            email,
            password_hash,
            name: name.to_string(),
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Check an email/password pair. Unknown email and wrong password both come
/// back as `InvalidCredentials`.
pub async fn authenticate(users: &dyn UserStore, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    let Some(user) = users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(%email, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}
