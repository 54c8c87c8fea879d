use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::is_unique_violation;
use crate::models::{FriendRequestRow, FriendRow, FriendshipRow, PendingRequestRow};
use crate::users::query_user_by_display_name;
use crate::{Database, StoreError, StoreResult};

impl Database {
    // -- Friend requests --

    /// Send a request from `sender_id` to the user named `display_name`.
    pub fn send_friend_request(
        &self,
        sender_id: i64,
        display_name: &str,
    ) -> StoreResult<FriendRequestRow> {
        let created_at = Utc::now();
        self.write_tx(|tx| {
            let receiver = query_user_by_display_name(tx, display_name)?
                .ok_or(StoreError::NotFound("user not found"))?;

            if receiver.id == sender_id {
                return Err(StoreError::Invalid("cannot send a friend request to yourself"));
            }
            if request_exists(tx, sender_id, receiver.id)? {
                return Err(StoreError::Conflict("friend request already exists"));
            }
            if are_friends(tx, sender_id, receiver.id)? {
                return Err(StoreError::Conflict("users are already friends"));
            }

            tx.execute(
                "INSERT INTO friend_requests (sender_id, receiver_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender_id, receiver.id, created_at],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("friend request already exists")
                } else {
                    e.into()
                }
            })?;

            Ok(FriendRequestRow {
                id: tx.last_insert_rowid(),
                sender_id,
                receiver_id: receiver.id,
                created_at,
            })
        })
    }

    /// Accept a request addressed to `accepter_id`: materializes the friendship
    /// and removes the pending request(s) between the pair in one transaction.
    pub fn accept_friend_request(
        &self,
        accepter_id: i64,
        request_id: i64,
    ) -> StoreResult<FriendshipRow> {
        let created_at = Utc::now();
        self.write_tx(|tx| {
            let request = query_request(tx, request_id)?
                .ok_or(StoreError::NotFound("friend request not found"))?;
            if request.receiver_id != accepter_id {
                return Err(StoreError::Forbidden("friend request is not addressed to you"));
            }

            let (low, high) = ordered_pair(accepter_id, request.sender_id);
            tx.execute(
                "INSERT INTO friendships (user_low, user_high, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![low, high, created_at],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("users are already friends")
                } else {
                    e.into()
                }
            })?;

            tx.execute(
                "DELETE FROM friend_requests WHERE id = ?1 AND sender_id = ?2",
                rusqlite::params![request_id, request.sender_id],
            )?;
            // A crossing request in the other direction is now moot.
            tx.execute(
                "DELETE FROM friend_requests WHERE sender_id = ?1 AND receiver_id = ?2",
                rusqlite::params![accepter_id, request.sender_id],
            )?;

            debug!(accepter_id, friend_id = request.sender_id, "friendship created");
            Ok(FriendshipRow {
                friend_id: request.sender_id,
                created_at,
            })
        })
    }

    /// Decline (receiver) or withdraw (sender) a pending request.
    pub fn delete_friend_request(
        &self,
        caller_id: i64,
        request_id: i64,
    ) -> StoreResult<FriendRequestRow> {
        self.write_tx(|tx| {
            let request = query_request(tx, request_id)?
                .ok_or(StoreError::NotFound("friend request not found"))?;
            if caller_id != request.sender_id && caller_id != request.receiver_id {
                return Err(StoreError::Forbidden("friend request does not involve you"));
            }

            tx.execute(
                "DELETE FROM friend_requests WHERE id = ?1 AND sender_id = ?2",
                rusqlite::params![request_id, request.sender_id],
            )?;
            Ok(request)
        })
    }

    pub fn list_received_requests(&self, user_id: i64) -> StoreResult<Vec<PendingRequestRow>> {
        self.with_conn(|conn| {
            query_pending(
                conn,
                "SELECT r.id, u.id, u.display_name, u.first_name, u.last_name, u.pfp_url, r.created_at
                 FROM friend_requests r
                 JOIN users u ON u.id = r.sender_id
                 WHERE r.receiver_id = ?1
                 ORDER BY r.id DESC",
                user_id,
            )
        })
    }

    pub fn list_sent_requests(&self, user_id: i64) -> StoreResult<Vec<PendingRequestRow>> {
        self.with_conn(|conn| {
            query_pending(
                conn,
                "SELECT r.id, u.id, u.display_name, u.first_name, u.last_name, u.pfp_url, r.created_at
                 FROM friend_requests r
                 JOIN users u ON u.id = r.receiver_id
                 WHERE r.sender_id = ?1
                 ORDER BY r.id DESC",
                user_id,
            )
        })
    }

    // -- Friendships --

    pub fn list_friends(&self, user_id: i64) -> StoreResult<Vec<FriendRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.display_name, u.first_name, u.last_name, u.pfp_url, f.created_at
                 FROM friendships f
                 JOIN users u
                   ON u.id = CASE WHEN f.user_low = ?1 THEN f.user_high ELSE f.user_low END
                 WHERE f.user_low = ?1 OR f.user_high = ?1
                 ORDER BY u.display_name",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(FriendRow {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        pfp_url: row.get(4)?,
                        friendship_ts: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn are_friends(&self, a: i64, b: i64) -> StoreResult<bool> {
        self.with_conn(|conn| are_friends(conn, a, b))
    }
}

/// Normalize an unordered pair to `(min, max)`.
pub(crate) fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b { (a, b) } else { (b, a) }
}

pub(crate) fn are_friends(conn: &Connection, a: i64, b: i64) -> StoreResult<bool> {
    let (low, high) = ordered_pair(a, b);
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_low = ?1 AND user_high = ?2)",
        [low, high],
        |r| r.get(0),
    )?;
    Ok(exists)
}

fn request_exists(conn: &Connection, sender_id: i64, receiver_id: i64) -> StoreResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friend_requests WHERE sender_id = ?1 AND receiver_id = ?2)",
        [sender_id, receiver_id],
        |r| r.get(0),
    )?;
    Ok(exists)
}

fn query_request(conn: &Connection, request_id: i64) -> StoreResult<Option<FriendRequestRow>> {
    let row = conn
        .query_row(
            "SELECT id, sender_id, receiver_id, created_at FROM friend_requests WHERE id = ?1",
            [request_id],
            |row| {
                Ok(FriendRequestRow {
                    id: row.get(0)?,
                    sender_id: row.get(1)?,
                    receiver_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn query_pending(conn: &Connection, sql: &str, user_id: i64) -> StoreResult<Vec<PendingRequestRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id], map_pending)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_pending(row: &Row<'_>) -> rusqlite::Result<PendingRequestRow> {
    Ok(PendingRequestRow {
        request_id: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        pfp_url: row.get(5)?,
        created_at: row.get(6)?,
    })
}
