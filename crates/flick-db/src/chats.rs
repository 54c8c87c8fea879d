use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::is_unique_violation;
use crate::friends::{are_friends, ordered_pair};
use crate::models::{ChatRow, DirectChat, LastMessageRow, ParticipantRow};
use crate::{Database, StoreError, StoreResult};

impl Database {
    /// Return the direct chat between `caller_id` and `participant_id`,
    /// creating it (with both participant rows) if the two are friends.
    ///
    /// Lookup and insert share one `BEGIN IMMEDIATE` transaction, so callers
    /// on other connections to the same file wait for the winner and then find
    /// its chat. The UNIQUE pair on `chats` still guards writers that bypass
    /// this path; a violation there falls back to the existing row.
    pub fn create_direct_chat(&self, caller_id: i64, participant_id: i64) -> StoreResult<DirectChat> {
        if caller_id == participant_id {
            return Err(StoreError::Invalid("cannot start a chat with yourself"));
        }
        let (low, high) = ordered_pair(caller_id, participant_id);
        let created_at = Utc::now();

        let result = self.write_tx(|tx| {
            if let Some(chat_id) = find_direct_chat(tx, low, high)? {
                return Ok(DirectChat { chat_id, created: false });
            }

            if !are_friends(tx, caller_id, participant_id)? {
                return Err(StoreError::Forbidden("you must be friends to start a direct chat"));
            }

            tx.execute(
                "INSERT INTO chats (direct_low, direct_high, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![low, high, created_at],
            )?;
            let chat_id = tx.last_insert_rowid();

            for user_id in [caller_id, participant_id] {
                add_participant(tx, chat_id, user_id, created_at)?;
            }

            debug!(chat_id, caller_id, participant_id, "direct chat created");
            Ok(DirectChat { chat_id, created: true })
        });

        match result {
            Err(StoreError::Sqlite(e)) if is_unique_violation(&e) => {
                warn!(caller_id, participant_id, "direct chat creation raced; returning existing chat");
                let chat_id = self
                    .with_conn_mut(|conn| find_direct_chat(conn, low, high))?
                    .ok_or(StoreError::Conflict("direct chat already exists"))?;
                Ok(DirectChat { chat_id, created: false })
            }
            other => other,
        }
    }

    /// Every chat `user_id` participates in, with all participants and the
    /// last message's metadata, most recently active first.
    pub fn list_chats(&self, user_id: i64) -> StoreResult<Vec<ChatRow>> {
        self.read_tx(|tx| {
            let mut stmt = tx.prepare(
                "SELECT c.id, c.created_at, m.id, m.sender_id, m.created_at
                 FROM participants p
                 JOIN chats c ON c.id = p.chat_id
                 LEFT JOIN messages m ON m.id = c.last_message_id
                 WHERE p.user_id = ?1
                 ORDER BY COALESCE(c.last_message_id, 0) DESC, c.id DESC",
            )?;

            let mut chats = stmt
                .query_map([user_id], |row| {
                    let message_id: Option<i64> = row.get(2)?;
                    let sender_id: Option<i64> = row.get(3)?;
                    let sent_at: Option<DateTime<Utc>> = row.get(4)?;

                    let last_message = match (message_id, sender_id, sent_at) {
                        (Some(message_id), Some(sender_id), Some(created_at)) => Some(LastMessageRow {
                            message_id,
                            sender_id,
                            created_at,
                        }),
                        _ => None,
                    };

                    Ok(ChatRow {
                        chat_id: row.get(0)?,
                        created_at: row.get(1)?,
                        last_message,
                        participants: Vec::new(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = tx.prepare(
                "SELECT p.chat_id, u.id, u.display_name, u.first_name, u.last_name, u.pfp_url,
                        p.is_typing, p.last_read_message_id
                 FROM participants p
                 JOIN users u ON u.id = p.user_id
                 WHERE p.chat_id IN (SELECT chat_id FROM participants WHERE user_id = ?1)
                 ORDER BY p.chat_id, u.id",
            )?;

            let mut by_chat: HashMap<i64, Vec<ParticipantRow>> = HashMap::new();
            let rows = stmt.query_map([user_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    ParticipantRow {
                        user_id: row.get(1)?,
                        display_name: row.get(2)?,
                        first_name: row.get(3)?,
                        last_name: row.get(4)?,
                        pfp_url: row.get(5)?,
                        is_typing: row.get(6)?,
                        last_read_message_id: row.get(7)?,
                    },
                ))
            })?;
            for row in rows {
                let (chat_id, participant) = row?;
                by_chat.entry(chat_id).or_default().push(participant);
            }

            for chat in &mut chats {
                chat.participants = by_chat.remove(&chat.chat_id).unwrap_or_default();
            }
            Ok(chats)
        })
    }

    pub fn set_typing_status(&self, user_id: i64, chat_id: i64, is_typing: bool) -> StoreResult<()> {
        self.write_tx(|tx| {
            require_participant(tx, chat_id, user_id)?;
            tx.execute(
                "UPDATE participants SET is_typing = ?1 WHERE chat_id = ?2 AND user_id = ?3",
                rusqlite::params![is_typing, chat_id, user_id],
            )?;
            Ok(())
        })
    }

    /// Move the caller's read pointer. The message must belong to the chat.
    pub fn set_last_read_message(&self, user_id: i64, chat_id: i64, message_id: i64) -> StoreResult<()> {
        self.write_tx(|tx| {
            require_participant(tx, chat_id, user_id)?;

            let in_chat: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1 AND chat_id = ?2)",
                [message_id, chat_id],
                |r| r.get(0),
            )?;
            if !in_chat {
                return Err(StoreError::NotFound("message not found in this chat"));
            }

            tx.execute(
                "UPDATE participants SET last_read_message_id = ?1 WHERE chat_id = ?2 AND user_id = ?3",
                rusqlite::params![message_id, chat_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn is_participant(&self, chat_id: i64, user_id: i64) -> StoreResult<bool> {
        self.with_conn(|conn| is_participant(conn, chat_id, user_id))
    }
}

fn find_direct_chat(conn: &Connection, low: i64, high: i64) -> StoreResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM chats WHERE direct_low = ?1 AND direct_high = ?2",
            [low, high],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

fn add_participant(
    conn: &Connection,
    chat_id: i64,
    user_id: i64,
    joined_at: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO participants (chat_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![chat_id, user_id, joined_at],
    )?;
    Ok(())
}

pub(crate) fn is_participant(conn: &Connection, chat_id: i64, user_id: i64) -> StoreResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM participants WHERE chat_id = ?1 AND user_id = ?2)",
        [chat_id, user_id],
        |r| r.get(0),
    )?;
    Ok(exists)
}

pub(crate) fn require_participant(conn: &Connection, chat_id: i64, user_id: i64) -> StoreResult<()> {
    if is_participant(conn, chat_id, user_id)? {
        Ok(())
    } else {
        Err(StoreError::Forbidden("not a participant in this chat"))
    }
}
