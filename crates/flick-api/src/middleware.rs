use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::{debug, warn};

use flick_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;
use crate::token::{TokenError, subject_user_id};

/// Identity of a verified caller, inserted as a request extension by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub claims: Claims,
}

impl TryFrom<Claims> for AuthUser {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = subject_user_id(&claims)?;
        Ok(Self { id, claims })
    }
}

/// Reject the request with 401 unless it carries a valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let Some(Authorization(bearer)) = req.headers().typed_get::<Authorization<Bearer>>() else {
        warn!(%method, %path, "rejected request: missing or malformed bearer credential");
        return Err(ApiError::Unauthorized);
    };

    let user = state
        .tokens
        .verify(bearer.token())
        .and_then(AuthUser::try_from)
        .map_err(|e| {
            warn!(%method, %path, reason = %e, "rejected request: invalid token");
            ApiError::Unauthorized
        })?;

    debug!(%method, %path, user_id = user.id, "token verified");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
