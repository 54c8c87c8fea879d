/// Database row types. Distinct from the flick-types API models to keep the
/// storage layer independent of the wire format.
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub pfp_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub pfp_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FriendRequestRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A pending request joined with the profile of the other party.
#[derive(Debug, Clone)]
pub struct PendingRequestRow {
    pub request_id: i64,
    pub user_id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub pfp_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FriendRow {
    pub user_id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub pfp_url: Option<String>,
    pub friendship_ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FriendshipRow {
    pub friend_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectChat {
    pub chat_id: i64,
    /// False when an existing chat for the pair was returned.
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<LastMessageRow>,
    pub participants: Vec<ParticipantRow>,
}

#[derive(Debug, Clone)]
pub struct LastMessageRow {
    pub message_id: i64,
    pub sender_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub user_id: i64,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub pfp_url: Option<String>,
    pub is_typing: bool,
    pub last_read_message_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
}
