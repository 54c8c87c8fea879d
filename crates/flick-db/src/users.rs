use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::is_unique_violation;
use crate::models::{NewUser, UserRow};
use crate::{Database, StoreError, StoreResult};

const USER_COLUMNS: &str =
    "id, display_name, first_name, last_name, password_hash, pfp_url, created_at";

impl Database {
    /// Display names are unique; a taken name is a `Conflict`.
    pub fn create_user(&self, user: &NewUser) -> StoreResult<UserRow> {
        let created_at = Utc::now();
        self.write_tx(|tx| {
            tx.execute(
                "INSERT INTO users (display_name, first_name, last_name, password_hash, pfp_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.display_name,
                    user.first_name,
                    user.last_name,
                    user.password_hash,
                    user.pfp_url,
                    created_at,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict("display name unavailable")
                } else {
                    e.into()
                }
            })?;

            Ok(UserRow {
                id: tx.last_insert_rowid(),
                display_name: user.display_name.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                password_hash: user.password_hash.clone(),
                pfp_url: user.pfp_url.clone(),
                created_at,
            })
        })
    }

    pub fn user_by_display_name(&self, display_name: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_display_name(conn, display_name))
    }

    pub fn user_by_id(&self, id: i64) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn update_pfp(&self, user_id: i64, pfp_url: &str) -> StoreResult<()> {
        self.write_tx(|tx| {
            let updated = tx.execute(
                "UPDATE users SET pfp_url = ?1 WHERE id = ?2",
                rusqlite::params![pfp_url, user_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("user not found"));
            }
            Ok(())
        })
    }

    /// Replace the profile picture with the generated default derived from the
    /// user's current display name. Returns the new URL.
    pub fn reset_pfp<F>(&self, user_id: i64, default_url: F) -> StoreResult<String>
    where
        F: FnOnce(&str) -> String,
    {
        self.write_tx(|tx| {
            let user = query_user_by_id(tx, user_id)?.ok_or(StoreError::NotFound("user not found"))?;
            let url = default_url(&user.display_name);
            tx.execute(
                "UPDATE users SET pfp_url = ?1 WHERE id = ?2",
                rusqlite::params![url, user_id],
            )?;
            Ok(url)
        })
    }

    pub fn update_display_name(&self, user_id: i64, display_name: &str) -> StoreResult<UserRow> {
        self.write_tx(|tx| {
            let updated = tx
                .execute(
                    "UPDATE users SET display_name = ?1 WHERE id = ?2",
                    rusqlite::params![display_name, user_id],
                )
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        StoreError::Conflict("display name unavailable")
                    } else {
                        e.into()
                    }
                })?;
            if updated == 0 {
                return Err(StoreError::NotFound("user not found"));
            }
            query_user_by_id(tx, user_id)?.ok_or(StoreError::NotFound("user not found"))
        })
    }

    pub fn update_password_hash(&self, user_id: i64, password_hash: &str) -> StoreResult<()> {
        self.write_tx(|tx| {
            let updated = tx.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                rusqlite::params![password_hash, user_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("user not found"));
            }
            Ok(())
        })
    }
}

pub(crate) fn query_user_by_display_name(
    conn: &Connection,
    display_name: &str,
) -> StoreResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE display_name = ?1");
    let row = conn
        .query_row(&sql, [display_name], map_user)
        .optional()?;
    Ok(row)
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> StoreResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        display_name: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        password_hash: row.get(4)?,
        pfp_url: row.get(5)?,
        created_at: row.get(6)?,
    })
}
