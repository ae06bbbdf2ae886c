//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stylecal_core::ports::PortError;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorBody, HttpError};
use crate::web::middleware::session_cookie;
use crate::web::state::AppState;

/// Lifetime of a login session and its cookie.
const SESSION_DAYS: i64 = 30;

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

fn session_set_cookie(auth_session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

/// Creates a login session for `user_id` and returns its Set-Cookie value.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, HttpError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .accounts
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            HttpError::internal("Failed to create session")
        })?;
    Ok(session_set_cookie(&auth_session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(HttpError::bad_request("A valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(HttpError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            HttpError::internal("Failed to hash password")
        })?
        .to_string();

    // 2. Create user in database
    let user = state
        .accounts
        .create_user_with_email(&email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                HttpError::new(StatusCode::CONFLICT, "email_taken", "Email is already registered")
            }
            other => {
                error!("Failed to create user: {:?}", other);
                HttpError::internal("Failed to create user")
            }
        })?;
    info!("Created user {}", user.user_id);

    // 3. Log the new user in
    let cookie = start_session(&state, user.user_id).await?;
    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or(email),
    };

    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    // 1. Get user by email
    let user_creds = state
        .accounts
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => HttpError::unauthorized("Invalid email or password"),
            other => {
                error!("Failed to get user: {:?}", other);
                HttpError::internal("Authentication error")
            }
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        HttpError::internal("Authentication error")
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(HttpError::unauthorized("Invalid email or password"));
    }

    // 3. Start the session
    let cookie = start_session(&state, user_creds.user_id).await?;
    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let auth_session_id =
        session_cookie(&headers).ok_or_else(|| HttpError::unauthorized("No session found"))?;

    state
        .accounts
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            HttpError::internal("Failed to logout")
        })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
