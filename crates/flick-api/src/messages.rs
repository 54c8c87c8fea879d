use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::debug;

use flick_crypto::MessageCipher;
use flick_db::models::MessageRow;
use flick_types::api::{MessageResponse, SendMessageRequest};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, run_db};

const DEFAULT_PAGE: u32 = 50;
const MAX_PAGE: u32 = 100;
const MAX_CONTENT_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub limit: Option<u32>,
    /// Only messages with an id below this one (older history).
    pub before: Option<i64>,
}

impl MessageQuery {
    fn page_size(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }
}

fn open(cipher: &MessageCipher, row: MessageRow) -> Result<MessageResponse, ApiError> {
    let plaintext = cipher.decrypt(&row.ciphertext)?;
    let content = String::from_utf8(plaintext)
        .map_err(|_| ApiError::Integrity(format!("message {} is not valid UTF-8", row.id)))?;

    Ok(MessageResponse {
        message_id: row.id,
        sender_id: row.sender_id,
        content,
        created_at: row.created_at,
    })
}

/// Encrypt the content and store it. Responds with the bare id of the new
/// message.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Path(chat_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let chars = req.content.chars().count();
    if chars == 0 || chars > MAX_CONTENT_CHARS {
        return Err(ApiError::validation("content must be 1 to 4000 characters"));
    }

    let ciphertext = state.cipher.encrypt(req.content.as_bytes())?;
    let sender_id = caller.id;
    let message = run_db(&state, move |db| db.create_message(sender_id, chat_id, &ciphertext)).await?;

    debug!(chat_id, sender_id, message_id = message.id, "message stored");
    Ok((StatusCode::CREATED, Json(message.id)))
}

/// Newest first. Any row that fails authentication fails the whole request.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Path(chat_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<MessageQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.page_size();
    let before = query.before;
    let rows = run_db(&state, move |db| db.get_messages(caller.id, chat_id, limit, before)).await?;

    let messages = rows
        .into_iter()
        .map(|row| open(&state.cipher, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(messages))
}
