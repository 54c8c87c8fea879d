use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::{debug, info};

use flick_db::models::ChatRow;
use flick_types::api::{
    ChatSummary, ChatsResponse, CreateChatRequest, CreateChatResponse, LastMessage, MarkReadRequest,
    Participant,
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, run_db};

fn summary(chat: ChatRow) -> ChatSummary {
    ChatSummary {
        chat_id: chat.chat_id,
        last_message: chat.last_message.map(|m| LastMessage {
            message_id: m.message_id,
            sender_id: m.sender_id,
            created_at: m.created_at,
        }),
        participants: chat
            .participants
            .into_iter()
            .map(|p| Participant {
                user_id: p.user_id,
                display_name: p.display_name,
                first_name: p.first_name,
                last_name: p.last_name,
                pfp_url: p.pfp_url,
                is_typing: p.is_typing,
                last_read_message_id: p.last_read_message_id,
            })
            .collect(),
    }
}

/// Accepts the same spellings as a conventional boolean parser:
/// `1 t T true TRUE True` and `0 f F false FALSE False`.
fn parse_status(raw: &str) -> Result<bool, ApiError> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ApiError::validation("typing status must be true or false")),
    }
}

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<CreateChatRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if req.participant_id <= 0 {
        return Err(ApiError::validation("participant_id must be a positive user id"));
    }

    let participant_id = req.participant_id;
    let chat = run_db(&state, move |db| db.create_direct_chat(caller.id, participant_id)).await?;

    let status = if chat.created {
        info!(chat_id = chat.chat_id, participant_id, "chat created");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateChatResponse { chat_id: chat.chat_id })))
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let chats = run_db(&state, move |db| db.list_chats(caller.id)).await?;
    Ok(Json(ChatsResponse {
        chats: chats.into_iter().map(summary).collect(),
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Path(chat_id), _): WithRejection<Path<i64>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<MarkReadRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = req.message_id;
    run_db(&state, move |db| db.set_last_read_message(caller.id, chat_id, message_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_typing(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Path((chat_id, status)), _): WithRejection<Path<(i64, String)>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let is_typing = parse_status(&status)?;
    let user_id = caller.id;
    run_db(&state, move |db| db.set_typing_status(user_id, chat_id, is_typing)).await?;

    debug!(chat_id, user_id, is_typing, "typing status updated");
    Ok(StatusCode::NO_CONTENT)
}
