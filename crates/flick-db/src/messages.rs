use chrono::Utc;

use crate::chats::require_participant;
use crate::models::MessageRow;
use crate::{Database, StoreResult};

impl Database {
    /// Store an already-encrypted message and make it the chat's last message.
    /// The sender must be a participant of the chat.
    pub fn create_message(&self, sender_id: i64, chat_id: i64, ciphertext: &[u8]) -> StoreResult<MessageRow> {
        let created_at = Utc::now();
        self.write_tx(|tx| {
            require_participant(tx, chat_id, sender_id)?;

            tx.execute(
                "INSERT INTO messages (chat_id, sender_id, ciphertext, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![chat_id, sender_id, ciphertext, created_at],
            )?;
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE chats SET last_message_id = ?1 WHERE id = ?2",
                rusqlite::params![id, chat_id],
            )?;

            Ok(MessageRow {
                id,
                chat_id,
                sender_id,
                ciphertext: ciphertext.to_vec(),
                created_at,
            })
        })
    }

    /// Most recent messages of a chat, newest first. `before` restricts the
    /// page to messages with a smaller id (cursor for older history).
    pub fn get_messages(
        &self,
        caller_id: i64,
        chat_id: i64,
        limit: u32,
        before: Option<i64>,
    ) -> StoreResult<Vec<MessageRow>> {
        self.read_tx(|tx| {
            require_participant(tx, chat_id, caller_id)?;

            let mut stmt = tx.prepare(
                "SELECT id, chat_id, sender_id, ciphertext, created_at
                 FROM messages
                 WHERE chat_id = ?1 AND (?3 IS NULL OR id < ?3)
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![chat_id, limit, before], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        ciphertext: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::StoreError;
    use crate::test_support;

    #[test]
    fn non_participant_cannot_write_or_read() {
        let db = test_support::db();
        let (alice, bob) = test_support::friends(&db, "alice", "bob");
        let carol = test_support::user(&db, "carol");
        let chat = db.create_direct_chat(alice, bob).unwrap();

        assert!(matches!(
            db.create_message(carol, chat.chat_id, b"x"),
            Err(StoreError::Forbidden(_))
        ));
        assert!(matches!(
            db.get_messages(carol, chat.chat_id, 50, None),
            Err(StoreError::Forbidden(_))
        ));
        assert!(matches!(
            db.get_messages(alice, chat.chat_id + 10, 50, None),
            Err(StoreError::Forbidden(_))
        ));
    }

    #[test]
    fn new_message_becomes_last_message() {
        let db = test_support::db();
        let (alice, bob) = test_support::friends(&db, "alice", "bob");
        let chat = db.create_direct_chat(alice, bob).unwrap();

        db.create_message(alice, chat.chat_id, b"first").unwrap();
        let second = db.create_message(bob, chat.chat_id, b"second").unwrap();

        let chats = db.list_chats(alice).unwrap();
        let last = chats[0].last_message.as_ref().unwrap();
        assert_eq!(last.message_id, second.id);
        assert_eq!(last.sender_id, bob);
    }

    #[test]
    fn messages_page_newest_first() {
        let db = test_support::db();
        let (alice, bob) = test_support::friends(&db, "alice", "bob");
        let chat = db.create_direct_chat(alice, bob).unwrap();

        let ids: Vec<i64> = (0..5)
            .map(|i| db.create_message(alice, chat.chat_id, &[i]).unwrap().id)
            .collect();

        let page = db.get_messages(bob, chat.chat_id, 3, None).unwrap();
        let got: Vec<i64> = page.iter().map(|m| m.id).collect();
        assert_eq!(got, vec![ids[4], ids[3], ids[2]]);
        assert_eq!(page[0].ciphertext, vec![4u8]);

        let older = db.get_messages(bob, chat.chat_id, 3, Some(ids[2])).unwrap();
        let got: Vec<i64> = older.iter().map(|m| m.id).collect();
        assert_eq!(got, vec![ids[1], ids[0]]);
    }

    #[test]
    fn messages_stay_in_their_chat() {
        let db = test_support::db();
        let (alice, bob) = test_support::friends(&db, "alice", "bob");
        let carol = test_support::user(&db, "carol");
        let request = db.send_friend_request(alice, "carol").unwrap();
        db.accept_friend_request(carol, request.id).unwrap();

        let with_bob = db.create_direct_chat(alice, bob).unwrap();
        let with_carol = db.create_direct_chat(alice, carol).unwrap();
        db.create_message(alice, with_bob.chat_id, b"to bob").unwrap();

        assert!(db.get_messages(carol, with_carol.chat_id, 50, None).unwrap().is_empty());
        assert_eq!(db.get_messages(bob, with_bob.chat_id, 50, None).unwrap().len(), 1);
    }
}
