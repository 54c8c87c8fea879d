use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::info;

use flick_db::models::{NewUser, UserRow};
use flick_types::api::{AuthResponse, LoginRequest, RegisterRequest};

use crate::error::ApiError;
use crate::password;
use crate::state::{AppState, run_blocking, run_db};
use crate::token::TokenSubject;
use crate::users::default_avatar_url;

const MAX_DISPLAY_NAME_CHARS: usize = 32;
const MAX_PASSWORD_BYTES: usize = 128;

/// Trimmed, 1..=32 characters, no interior whitespace.
pub(crate) fn validate_display_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(ApiError::validation("display name must be 1 to 32 characters"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("display name must not contain whitespace"));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.is_empty() || password.len() > MAX_PASSWORD_BYTES {
        return Err(ApiError::validation("password must be 1 to 128 bytes"));
    }
    Ok(())
}

fn validate_name(raw: &str, field: &'static str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation(format!("{field} must not be empty")));
    }
    Ok(name.to_string())
}

fn auth_response(state: &AppState, user: UserRow) -> Result<AuthResponse, ApiError> {
    let access_token = state.tokens.issue(&TokenSubject {
        user_id: user.id,
        first_name: &user.first_name,
        last_name: &user.last_name,
        pfp_url: user.pfp_url.as_deref(),
    })?;

    Ok(AuthResponse {
        access_token,
        user_id: user.id,
        display_name: user.display_name,
        pfp_url: user.pfp_url,
    })
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = validate_display_name(&req.display_name)?;
    let first_name = validate_name(&req.first_name, "first name")?;
    let last_name = validate_name(&req.last_name, "last name")?;
    validate_password(&req.password)?;

    let password = req.password;
    let password_hash = run_blocking(move || Ok(password::hash_password(&password)?)).await?;

    let new_user = NewUser {
        pfp_url: Some(default_avatar_url(&display_name)),
        display_name,
        first_name,
        last_name,
        password_hash,
    };
    let user = run_db(&state, move |db| db.create_user(&new_user)).await?;

    info!(user_id = user.id, display_name = %user.display_name, "user registered");
    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = req.display_name.trim().to_string();
    if display_name.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("display_name and password are required"));
    }
    let user = run_db(&state, move |db| db.user_by_display_name(&display_name)).await?;

    let password = req.password;
    let (user, verified) = run_blocking(move || match user {
        Some(user) => {
            let ok = password::verify_password(&password, &user.password_hash)?;
            Ok((Some(user), ok))
        }
        None => {
            password::verify_dummy(&password);
            Ok((None, false))
        }
    })
    .await?;

    match user {
        Some(user) if verified => Ok(Json(auth_response(&state, user)?)),
        _ => Err(ApiError::Unauthorized),
    }
}
