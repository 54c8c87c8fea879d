use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &mut Connection) -> StoreResult<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                display_name    TEXT NOT NULL UNIQUE,
                first_name      TEXT NOT NULL,
                last_name       TEXT NOT NULL,
                password_hash   TEXT NOT NULL,
                pfp_url         TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE friend_requests (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id   INTEGER NOT NULL REFERENCES users(id),
                receiver_id INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                CHECK (sender_id <> receiver_id),
                UNIQUE (sender_id, receiver_id)
            );

            CREATE INDEX idx_friend_requests_receiver
                ON friend_requests(receiver_id);

            -- One row per unordered pair: user_low < user_high.
            CREATE TABLE friendships (
                user_low    INTEGER NOT NULL REFERENCES users(id),
                user_high   INTEGER NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_low, user_high),
                CHECK (user_low < user_high)
            );

            CREATE INDEX idx_friendships_high
                ON friendships(user_high);

            -- direct_low/direct_high hold the normalized member pair of a
            -- direct chat; the UNIQUE constraint allows one chat per pair.
            CREATE TABLE chats (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                direct_low      INTEGER REFERENCES users(id),
                direct_high     INTEGER REFERENCES users(id),
                last_message_id INTEGER REFERENCES messages(id),
                created_at      TEXT NOT NULL,
                UNIQUE (direct_low, direct_high)
            );

            CREATE TABLE participants (
                chat_id                 INTEGER NOT NULL REFERENCES chats(id),
                user_id                 INTEGER NOT NULL REFERENCES users(id),
                is_typing               INTEGER NOT NULL DEFAULT 0,
                last_read_message_id    INTEGER REFERENCES messages(id),
                joined_at               TEXT NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );

            CREATE INDEX idx_participants_user
                ON participants(user_id);

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     INTEGER NOT NULL REFERENCES chats(id),
                sender_id   INTEGER NOT NULL REFERENCES users(id),
                ciphertext  BLOB NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_chat
                ON messages(chat_id, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}
