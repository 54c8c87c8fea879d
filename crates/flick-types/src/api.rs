use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Token Claims --

/// Signed identity assertions carried in every bearer token. Shared between
/// token issuance (login/register) and the authorization middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Stringified numeric user id.
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub profile_image: String,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub display_name: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub display_name: String,
    pub password: String,
}

/// Returned by both register (201) and login (200).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user_id: i64,
    pub display_name: String,
    pub pfp_url: Option<String>,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePfpRequest {
    pub profile_picture_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PfpResponse {
    pub pfp_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDisplayNameRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub pfp_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Friends --

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendResponse {
    pub user_id: i64,
    pub pfp_url: Option<String>,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub friendship_ts: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFriendRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FriendRequestResponse {
    pub request_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A pending request as seen by one side; `user_*` fields describe the
/// other party (the sender for received requests, the receiver for sent ones).
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub pfp_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingRequestsResponse {
    pub requests: Vec<PendingRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptRequestResponse {
    pub request_id: i64,
    pub friend_id: i64,
    pub friendship_ts: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequestResponse {
    pub request_id: i64,
}

// -- Chats --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChatRequest {
    pub participant_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateChatResponse {
    pub chat_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatsResponse {
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    pub participants: Vec<Participant>,
}

/// Metadata only; list views never carry decrypted content.
#[derive(Debug, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_id: i64,
    pub sender_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub pfp_url: Option<String>,
    pub is_typing: bool,
    pub last_read_message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub message_id: i64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
