//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, logout and the profile of
//! the signed-in user, plus the session-token helpers used by the middleware.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use course_market_core::domain::{NewUser, Role, User};
use course_market_core::ports::PortError;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use crate::web::views::{CourseView, MessageResponse, UserView};

/// Name of the HTTP-only cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";
/// Lifetime of a session token.
pub const TOKEN_TTL_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 6;

//=========================================================================================
// Session Tokens
//=========================================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a token for `user` that expires after `TOKEN_TTL_DAYS`.
pub fn issue_token(secret: &str, user: &User) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role.to_string(),
        name: user.name.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign session token: {e}")))
}

/// Verifies a session token and returns the caller it names.
pub fn decode_token(secret: &str, token: &str) -> Result<AuthUser, PortError> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => {
            PortError::Unauthenticated("Session expired. Please login again.".to_string())
        }
        _ => PortError::Unauthenticated("Invalid token".to_string()),
    })?;

    let claims = data.claims;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|_| PortError::Unauthenticated("Invalid token".to_string()))?;
    Ok(AuthUser {
        id: claims.user_id,
        email: claims.email,
        role,
        name: claims.name,
    })
}

fn session_cookie(config: &Config, token: &str, max_age: i64) -> String {
    let flags = if config.production {
        "Secure; SameSite=None"
    } else {
        "SameSite=Lax"
    };
    format!(
        "{}={}; HttpOnly; {}; Path=/; Max-Age={}",
        TOKEN_COOKIE, token, flags, max_age
    )
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: UserView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: UserView,
    pub enrolled_courses: Vec<CourseView>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub success: bool,
    pub message: String,
    pub user: UserView,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: ProfileView,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /user/register - Create a new user account
#[utoipa::path(
    post,
    path = "/api/v1/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Missing fields, short password or duplicate email"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(name), Some(email), Some(password)) =
        (required(req.name), required(req.email), req.password)
    else {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    };
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create user in database
    let user = state
        .db
        .create_user(NewUser {
            name,
            email: email.to_lowercase(),
            hashed_password: password_hash,
            // Instructor accounts are provisioned out of band.
            role: Role::Student,
        })
        .await?;
    info!(user_id = %user.id, role = %user.role, "User registered");

    // 3. Issue the session cookie
    let token = issue_token(&state.config.jwt_secret, &user)?;
    let cookie = session_cookie(
        &state.config,
        &token,
        Duration::days(TOKEN_TTL_DAYS).num_seconds(),
    );

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            success: true,
            message: "Account created successfully".to_string(),
            user: UserView::from(&user),
        }),
    ))
}

/// POST /user/login - Login with existing account
#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let (Some(email), Some(password)) = (required(req.email), req.password) else {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    };
    let invalid = || PortError::Unauthenticated("Invalid credentials".to_string());

    // 1. Get user by email
    let creds = match state.db.get_user_credentials(&email.to_lowercase()).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => return Err(invalid().into()),
        Err(e) => return Err(e.into()),
    };

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid().into());
    }

    // 3. Issue the session cookie
    let user = creds.user;
    let token = issue_token(&state.config.jwt_secret, &user)?;
    let cookie = session_cookie(
        &state.config,
        &token,
        Duration::days(TOKEN_TTL_DAYS).num_seconds(),
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            success: true,
            message: format!("Welcome back, {}", user.name),
            user: UserView::from(&user),
        }),
    ))
}

/// POST /user/logout - Clear the session cookie
#[utoipa::path(
    post,
    path = "/api/v1/user/logout",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse)
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cookie = session_cookie(&state.config, "", 0);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    )
}

/// GET /user/profile - The signed-in user with enrolled courses
#[utoipa::path(
    get,
    path = "/api/v1/user/profile",
    responses(
        (status = 200, description = "Profile of the signed-in user", body = ProfileResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.get_user_by_id(auth.id).await?;
    let courses = state.db.list_courses_by_ids(&user.enrolled_courses).await?;

    Ok(Json(ProfileResponse {
        success: true,
        user: ProfileView {
            user: UserView::from(&user),
            enrolled_courses: courses.iter().map(CourseView::from).collect(),
        },
    }))
}

/// PUT /user/profile/update - Rename the signed-in user
#[utoipa::path(
    put,
    path = "/api/v1/user/profile/update",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UpdateProfileResponse),
        (status = 400, description = "Missing name"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let name = required(req.name)
        .ok_or_else(|| ApiError::BadRequest("Name is required".to_string()))?;

    let user = state.db.update_user_name(auth.id, &name).await?;
    info!(user_id = %user.id, "Profile updated");

    // The token carries the display name, so hand out a fresh one.
    let token = issue_token(&state.config.jwt_secret, &user)?;
    let cookie = session_cookie(
        &state.config,
        &token,
        Duration::days(TOKEN_TTL_DAYS).num_seconds(),
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(UpdateProfileResponse {
            success: true,
            message: "Profile updated successfully".to_string(),
            user: UserView::from(&user),
        }),
    ))
}
