use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::info;

use flick_db::StoreError;
use flick_db::models::UserRow;
use flick_types::api::{
    PfpResponse, ProfileResponse, UpdateDisplayNameRequest, UpdatePasswordRequest, UpdatePfpRequest,
};

use crate::auth::{validate_display_name, validate_password};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::password;
use crate::state::{AppState, run_blocking, run_db};

const DEFAULT_AVATAR_BASE: &str = "https://api.dicebear.com/7.x/notionists-neutral/png?seed=";
const MAX_URL_LEN: usize = 2048;

/// Deterministic generated avatar seeded by the display name.
pub fn default_avatar_url(display_name: &str) -> String {
    format!("{DEFAULT_AVATAR_BASE}{}", urlencoding::encode(display_name))
}

fn profile(user: UserRow) -> ProfileResponse {
    ProfileResponse {
        user_id: user.id,
        display_name: user.display_name,
        first_name: user.first_name,
        last_name: user.last_name,
        pfp_url: user.pfp_url,
        created_at: user.created_at,
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_db(&state, move |db| {
        db.user_by_id(caller.id)?.ok_or(StoreError::NotFound("user not found"))
    })
    .await?;
    Ok(Json(profile(user)))
}

pub async fn update_pfp(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePfpRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let url = req.profile_picture_url.trim().to_string();
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(ApiError::validation("profile_picture_url must be 1 to 2048 bytes"));
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ApiError::validation("profile_picture_url must be an http(s) URL"));
    }

    let stored = url.clone();
    run_db(&state, move |db| db.update_pfp(caller.id, &stored)).await?;
    Ok(Json(PfpResponse { pfp_url: url }))
}

pub async fn reset_pfp(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let pfp_url = run_db(&state, move |db| db.reset_pfp(caller.id, default_avatar_url)).await?;
    Ok(Json(PfpResponse { pfp_url }))
}

pub async fn update_display_name(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateDisplayNameRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = validate_display_name(&req.display_name)?;
    let user = run_db(&state, move |db| db.update_display_name(caller.id, &display_name)).await?;

    info!(user_id = user.id, display_name = %user.display_name, "display name changed");
    Ok(Json(profile(user)))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePasswordRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&req.new_password)?;
    let user_id = caller.id;

    let user = run_db(&state, move |db| {
        db.user_by_id(user_id)?.ok_or(StoreError::NotFound("user not found"))
    })
    .await?;

    let UpdatePasswordRequest {
        current_password,
        new_password,
    } = req;
    let new_hash = run_blocking(move || {
        if !password::verify_password(&current_password, &user.password_hash)? {
            return Err(ApiError::Unauthorized);
        }
        Ok(password::hash_password(&new_password)?)
    })
    .await?;

    run_db(&state, move |db| db.update_password_hash(user_id, &new_hash)).await?;

    info!(user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_avatar_is_seeded_and_encoded() {
        assert_eq!(
            default_avatar_url("alice"),
            "https://api.dicebear.com/7.x/notionists-neutral/png?seed=alice"
        );
        assert_eq!(
            default_avatar_url("a&b"),
            "https://api.dicebear.com/7.x/notionists-neutral/png?seed=a%26b"
        );
        assert_eq!(default_avatar_url("bob"), default_avatar_url("bob"));
    }
}
