use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashSet;

use kozosseg_types::{ChatContent, ChatRoom, ChatRoomSummary, MessageStatus, Personal};

use super::personal_repository::{map_personal, PERSONAL_COLUMNS};
use crate::db::DbPool;

const ROOM_COLUMNS: &str = "id, sender_id, receiver_id, started_at, ended_at";
const CONTENT_COLUMNS: &str = "message_id, chat_room_id, author_id, message, sent_at, status";

fn map_room(row: &Row) -> rusqlite::Result<ChatRoom> {
    Ok(ChatRoom {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        contents: Vec::new(),
    })
}

fn map_content(row: &Row) -> rusqlite::Result<ChatContent> {
    let status: String = row.get(5)?;
    Ok(ChatContent {
        message_id: row.get(0)?,
        chat_room_id: row.get(1)?,
        author_id: row.get(2)?,
        message: row.get(3)?,
        sent_at: row.get(4)?,
        status: MessageStatus::parse(&status).unwrap_or_default(),
    })
}

/// Contents of a room, oldest first
fn load_contents(conn: &Connection, room_id: i64) -> rusqlite::Result<Vec<ChatContent>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CONTENT_COLUMNS} FROM chat_contents
         WHERE chat_room_id = ?
         ORDER BY sent_at, message_id"
    ))?;
    let contents = stmt
        .query_map([room_id], map_content)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contents)
}

pub struct ChatRepository {
    pool: DbPool,
}

impl ChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Room with its contents sorted by send time
    pub fn get_chat_room_by_id(&self, id: i64) -> Result<Option<ChatRoom>> {
        let conn = self.pool.get()?;
        let room = conn
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = ?"),
                [id],
                map_room,
            )
            .optional()?;

        match room {
            Some(mut room) => {
                room.contents = load_contents(&conn, room.id)?;
                Ok(Some(room))
            }
            None => Ok(None),
        }
    }

    /// Rooms the user takes part in, most recent activity first
    pub fn get_all_chat_rooms(&self, user_id: i64) -> Result<Vec<ChatRoom>> {
        let conn = self.pool.get()?;
        let mut rooms = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ROOM_COLUMNS} FROM chat_rooms
                 WHERE sender_id = ?1 OR receiver_id = ?1
                 ORDER BY COALESCE(ended_at, started_at) DESC, id DESC"
            ))?;
            let rooms = stmt
                .query_map([user_id], map_room)?
                .collect::<Result<Vec<_>, _>>()?;
            rooms
        };

        for room in &mut rooms {
            room.contents = load_contents(&conn, room.id)?;
        }
        Ok(rooms)
    }

    /// Distinct personals on the other side of `rooms`, in room order
    pub fn get_message_partners(&self, rooms: &[ChatRoom], user_id: i64) -> Result<Vec<Personal>> {
        let mut seen = HashSet::new();
        let partner_ids: Vec<i64> = rooms
            .iter()
            .filter(|room| room.involves(user_id))
            .map(|room| room.partner_of(user_id))
            .filter(|id| *id != user_id && seen.insert(*id))
            .collect();

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERSONAL_COLUMNS} FROM personals p WHERE p.id = ?"
        ))?;
        let mut partners = Vec::with_capacity(partner_ids.len());
        for id in partner_ids {
            if let Some(personal) = stmt.query_row([id], |row| map_personal(row, 0)).optional()? {
                partners.push(personal);
            }
        }
        Ok(partners)
    }

    /// Ids of everyone the user has a chat room with
    pub fn get_chat_partner_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END
             FROM chat_rooms
             WHERE sender_id = ?1 OR receiver_id = ?1",
        )?;
        let ids = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids.into_iter().filter(|id| *id != user_id).collect())
    }

    /// Rooms of the user paired with the partner's profile. A search key keeps
    /// only rooms whose messages or partner name contain it (case-insensitive).
    pub fn get_room_summaries(&self, user_id: i64, search: Option<&str>) -> Result<Vec<ChatRoomSummary>> {
        let rooms = self.get_all_chat_rooms(user_id)?;
        let partners = self.get_message_partners(&rooms, user_id)?;
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let summaries = rooms
            .into_iter()
            .filter_map(|room| {
                let partner_id = room.partner_of(user_id);
                let partner = partners.iter().find(|p| p.id == partner_id)?.clone();
                Some(ChatRoomSummary { room, partner })
            })
            .filter(|summary| match &needle {
                None => true,
                Some(needle) => {
                    summary.partner.full_name().to_lowercase().contains(needle)
                        || summary
                            .room
                            .contents
                            .iter()
                            .any(|c| c.message.to_lowercase().contains(needle))
                }
            })
            .collect();

        Ok(summaries)
    }

    /// The room of a user pair, whichever of them started it (without contents)
    pub fn find_room_between(&self, a: i64, b: i64) -> Result<Option<ChatRoom>> {
        let conn = self.pool.get()?;
        let room = conn
            .query_row(
                &format!(
                    "SELECT {ROOM_COLUMNS} FROM chat_rooms
                     WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
                     ORDER BY id LIMIT 1"
                ),
                (a, b),
                map_room,
            )
            .optional()?;
        Ok(room)
    }

    pub fn create_room(&self, sender_id: i64, receiver_id: i64) -> Result<ChatRoom> {
        let conn = self.pool.get()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO chat_rooms (sender_id, receiver_id, started_at, ended_at) VALUES (?, ?, ?, ?)",
            (sender_id, receiver_id, now, now),
        )
        .context("Failed to create chat room")?;

        Ok(ChatRoom {
            id: conn.last_insert_rowid(),
            sender_id,
            receiver_id,
            started_at: now,
            ended_at: Some(now),
            contents: Vec::new(),
        })
    }

    /// The room of a user pair, opened on first contact. Concurrent first
    /// messages from both sides end up in the same room.
    ///
    /// Returns the room (without contents) and whether this call created it.
    pub fn get_or_create_room(&self, sender_id: i64, receiver_id: i64) -> Result<(ChatRoom, bool)> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO chat_rooms (sender_id, receiver_id, started_at, ended_at)
                 VALUES (?, ?, ?, ?)",
                (sender_id, receiver_id, now, now),
            )
            .context("Failed to create chat room")?;

        let room = tx
            .query_row(
                &format!(
                    "SELECT {ROOM_COLUMNS} FROM chat_rooms
                     WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)"
                ),
                (sender_id, receiver_id),
                map_room,
            )
            .context("Chat room missing after insert")?;
        tx.commit()?;

        Ok((room, inserted > 0))
    }

    /// Append a message and move the room's last activity
    pub fn add_content(&self, room_id: i64, author_id: i64, message: &str) -> Result<ChatContent> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO chat_contents (chat_room_id, author_id, message, sent_at, status)
             VALUES (?, ?, ?, ?, ?)",
            (room_id, author_id, message, now, MessageStatus::Sent.as_str()),
        )
        .context("Failed to store chat message")?;
        let message_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE chat_rooms SET ended_at = ? WHERE id = ?",
            (now, room_id),
        )
        .context("Failed to update chat room activity")?;
        tx.commit()?;

        Ok(ChatContent {
            message_id,
            chat_room_id: room_id,
            author_id,
            message: message.to_string(),
            sent_at: now,
            status: MessageStatus::Sent,
        })
    }

    /// Contents of a room, newest first
    pub fn get_contents(&self, room_id: i64) -> Result<Vec<ChatContent>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTENT_COLUMNS} FROM chat_contents
             WHERE chat_room_id = ?
             ORDER BY sent_at DESC, message_id DESC"
        ))?;
        let contents = stmt
            .query_map([room_id], map_content)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contents)
    }

    /// Mark every message the reader did not write as read
    pub fn mark_read(&self, room_id: i64, reader_id: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE chat_contents SET status = ?
                 WHERE chat_room_id = ? AND author_id <> ? AND status <> ?",
                (
                    MessageStatus::Read.as_str(),
                    room_id,
                    reader_id,
                    MessageStatus::Read.as_str(),
                ),
            )
            .context("Failed to mark messages read")?;
        Ok(rows)
    }
}
