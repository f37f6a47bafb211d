use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand_core::OsRng;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::info;

use kickfund_db::models::{NewUser, UserRow};
use kickfund_types::api::{
    EmailCheckRequest, EmailCheckResponse, LoginRequest, RegisterRequest, UserResponse,
};

use crate::error::{ApiError, respond};
use crate::state::{AppState, with_db};
use crate::storage::public_url;

const INVALID_LOGIN: &str = "Invalid email or password.";

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ApiError::check(req.field_errors())?;
    let email = req.email.trim().to_lowercase();

    let lookup = email.clone();
    if with_db(&state, move |db| db.get_user_by_email(&lookup)).await?.is_some() {
        return Err(ApiError::Conflict("Email is already registered."));
    }

    let password_hash = hash_password(&req.password)?;

    let user = with_db(&state, move |db| {
        let Some(id) = db.create_user(&NewUser {
            name: req.name.trim(),
            occupation: req.occupation.trim(),
            email: &email,
            password_hash: &password_hash,
        })?
        else {
            return Ok(None);
        };
        let user = db
            .get_user_by_id(id)?
            .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))?;
        Ok(Some(user))
    })
    .await?
    // another registration took the email after the check above
    .ok_or(ApiError::Conflict("Email is already registered."))?;

    let token = issue_token(&state, user.id)?;
    info!("Registered user {} ({})", user.id, user.email);

    Ok(respond(
        StatusCode::CREATED,
        "Account registered.",
        "created",
        user_response(&user, token),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ApiError::check(req.field_errors())?;
    let email = req.email.trim().to_lowercase();

    // Unknown email and wrong password answer identically.
    let user = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthenticated(INVALID_LOGIN))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthenticated(INVALID_LOGIN));
    }

    let token = issue_token(&state, user.id)?;

    Ok(respond(StatusCode::OK, "Logged in.", "success", user_response(&user, token)))
}

pub async fn check_email(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<EmailCheckRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    ApiError::check(req.field_errors())?;
    let email = req.email.trim().to_lowercase();

    let taken = with_db(&state, move |db| db.get_user_by_email(&email)).await?.is_some();
    let message = if taken { "Email is already registered." } else { "Email is available." };

    Ok(respond(
        StatusCode::OK,
        message,
        "success",
        EmailCheckResponse { is_available: !taken },
    ))
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub(crate) fn issue_token(state: &AppState, user_id: i64) -> Result<String, ApiError> {
    state
        .credentials
        .issue(user_id)
        .map_err(|e| ApiError::Server(e.into()))
}

pub(crate) fn user_response(user: &UserRow, token: String) -> UserResponse {
    UserResponse {
        id: user.id,
        name: user.name.clone(),
        occupation: user.occupation.clone(),
        email: user.email.clone(),
        avatar: public_url(user.avatar.as_deref()),
        token,
    }
}
