use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use flick_db::models::PendingRequestRow;
use flick_types::api::{
    AcceptRequestResponse, DeleteRequestResponse, FriendRequestResponse, FriendResponse,
    PendingRequest, PendingRequestsResponse, SendFriendRequest,
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, run_db};

fn pending(rows: Vec<PendingRequestRow>) -> PendingRequestsResponse {
    let requests = rows
        .into_iter()
        .map(|row| PendingRequest {
            request_id: row.request_id,
            user_id: row.user_id,
            display_name: row.display_name,
            first_name: row.first_name,
            last_name: row.last_name,
            pfp_url: row.pfp_url,
            created_at: row.created_at,
        })
        .collect();
    PendingRequestsResponse { requests }
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_friends(caller.id)).await?;

    let friends: Vec<FriendResponse> = rows
        .into_iter()
        .map(|row| FriendResponse {
            user_id: row.user_id,
            pfp_url: row.pfp_url,
            display_name: row.display_name,
            first_name: row.first_name,
            last_name: row.last_name,
            friendship_ts: row.friendship_ts,
        })
        .collect();
    Ok(Json(friends))
}

pub async fn received_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_received_requests(caller.id)).await?;
    Ok(Json(pending(rows)))
}

pub async fn sent_requests(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_sent_requests(caller.id)).await?;
    Ok(Json(pending(rows)))
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<SendFriendRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let display_name = req.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::validation("display_name must not be empty"));
    }

    let row = run_db(&state, move |db| db.send_friend_request(caller.id, &display_name)).await?;

    info!(request_id = row.id, sender_id = row.sender_id, receiver_id = row.receiver_id, "friend request sent");
    Ok((
        StatusCode::CREATED,
        Json(FriendRequestResponse {
            request_id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            created_at: row.created_at,
        }),
    ))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Path(request_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let friendship = run_db(&state, move |db| db.accept_friend_request(caller.id, request_id)).await?;

    info!(request_id, friend_id = friendship.friend_id, "friend request accepted");
    Ok(Json(AcceptRequestResponse {
        request_id,
        friend_id: friendship.friend_id,
        friendship_ts: friendship.created_at,
    }))
}

pub async fn delete_request(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    WithRejection(Path(request_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.delete_friend_request(caller.id, request_id)).await?;
    Ok(Json(DeleteRequestResponse { request_id: row.id }))
}
