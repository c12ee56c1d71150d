use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row, TransactionBehavior};

use kozosseg_types::{Friend, FriendStatus, Personal, RelationStatus};

use super::personal_repository::{map_personal, PERSONAL_COLUMNS};
use crate::db::DbPool;

fn map_friend(row: &Row) -> rusqlite::Result<Friend> {
    let code: i64 = row.get(3)?;
    let status = FriendStatus::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Integer,
            format!("unknown friend status {code}").into(),
        )
    })?;
    Ok(Friend {
        friendship_id: row.get(0)?,
        user_id: row.get(1)?,
        friend_id: row.get(2)?,
        status,
        friendship_since: row.get(4)?,
    })
}

pub struct FriendRepository {
    pool: DbPool,
}

impl FriendRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Personals joined to `user_id` by an accepted friendship in either direction
    pub fn get_all_friends(&self, user_id: i64) -> Result<Vec<Personal>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERSONAL_COLUMNS}
             FROM friends f
             JOIN personals p
               ON p.id = CASE WHEN f.user_id = ?1 THEN f.friend_id ELSE f.user_id END
             WHERE (f.user_id = ?1 OR f.friend_id = ?1) AND f.status = ?2
             ORDER BY p.last_name, p.first_name"
        ))?;

        let friends = stmt
            .query_map((user_id, FriendStatus::Accepted.code()), |row| {
                map_personal(row, 0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(friends)
    }

    /// Ids of accepted friends of `user_id`
    pub fn get_friend_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT CASE WHEN user_id = ?1 THEN friend_id ELSE user_id END
             FROM friends
             WHERE (user_id = ?1 OR friend_id = ?1) AND status = ?2",
        )?;

        let ids = stmt
            .query_map((user_id, FriendStatus::Accepted.code()), |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// The friendship row between two users, whichever direction it was stored in
    pub fn find_between(&self, a: i64, b: i64) -> Result<Option<Friend>> {
        let conn = self.pool.get()?;
        let friend = conn
            .query_row(
                "SELECT friendship_id, user_id, friend_id, status, friendship_since
                 FROM friends
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                (a, b),
                map_friend,
            )
            .optional()?;
        Ok(friend)
    }

    /// Any row (whatever its status) between the two users
    pub fn friendship_exists(&self, user_id: i64, friend_id: i64) -> Result<bool> {
        Ok(self.find_between(user_id, friend_id)?.is_some())
    }

    pub fn are_friends(&self, a: i64, b: i64) -> Result<bool> {
        Ok(self
            .find_between(a, b)?
            .is_some_and(|f| f.status == FriendStatus::Accepted))
    }

    /// How `viewer_id` relates to `user_id`
    pub fn relation(&self, user_id: i64, viewer_id: i64) -> Result<RelationStatus> {
        if user_id == viewer_id {
            return Ok(RelationStatus::Self_);
        }
        if self.are_friends(user_id, viewer_id)? {
            Ok(RelationStatus::Friend)
        } else {
            Ok(RelationStatus::NonFriend)
        }
    }

    pub fn insert(&self, user_id: i64, friend_id: i64, status: FriendStatus) -> Result<Friend> {
        let conn = self.pool.get()?;
        let since = (status == FriendStatus::Accepted).then(Utc::now);
        conn.execute(
            "INSERT INTO friends (user_id, friend_id, status, friendship_since) VALUES (?, ?, ?, ?)",
            (user_id, friend_id, status.code(), since),
        )
        .context("Failed to insert friendship")?;

        Ok(Friend {
            friendship_id: conn.last_insert_rowid(),
            user_id,
            friend_id,
            status,
            friendship_since: since,
        })
    }

    /// Change the status of a row; accepting stamps `friendship_since`
    pub fn update_status(&self, friendship_id: i64, status: FriendStatus) -> Result<bool> {
        let conn = self.pool.get()?;
        let since = (status == FriendStatus::Accepted).then(Utc::now);
        let rows = conn
            .execute(
                "UPDATE friends SET status = ?, friendship_since = ? WHERE friendship_id = ?",
                (status.code(), since, friendship_id),
            )
            .context("Failed to update friendship status")?;
        Ok(rows > 0)
    }

    /// Record a pending request from `requester_id` unless the pair already has
    /// a row (in either direction). Returns whether a row was added.
    pub fn request_pending(&self, receiver_id: i64, requester_id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO friends (user_id, friend_id, status) VALUES (?, ?, ?)",
                (receiver_id, requester_id, FriendStatus::Pending.code()),
            )
            .context("Failed to record friend request")?;
        Ok(rows > 0)
    }

    /// Store an accepted friendship between `receiver_id` and `requester_id`,
    /// updating an existing row or inserting a new one
    pub fn save_accepted(&self, receiver_id: i64, requester_id: i64) -> Result<Friend> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();
        let accepted = FriendStatus::Accepted.code();

        tx.execute(
            "INSERT OR IGNORE INTO friends (user_id, friend_id, status, friendship_since) VALUES (?, ?, ?, ?)",
            (receiver_id, requester_id, accepted, now),
        )
        .context("Failed to insert friendship")?;
        tx.execute(
            "UPDATE friends SET status = ?3, friendship_since = ?4
             WHERE ((user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1))
               AND status <> ?3",
            (receiver_id, requester_id, accepted, now),
        )
        .context("Failed to accept friendship")?;

        let friend = tx
            .query_row(
                "SELECT friendship_id, user_id, friend_id, status, friendship_since
                 FROM friends
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                (receiver_id, requester_id),
                map_friend,
            )
            .context("Friendship missing after save")?;
        tx.commit()?;

        Ok(friend)
    }

    /// Remove pending rows between the two users; returns how many went
    pub fn delete_pending(&self, a: i64, b: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "DELETE FROM friends
                 WHERE ((user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1))
                   AND status = ?3",
                (a, b, FriendStatus::Pending.code()),
            )
            .context("Failed to delete pending friendship")?;
        Ok(rows)
    }

    pub fn delete(&self, friendship_id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM friends WHERE friendship_id = ?", [friendship_id])
            .context("Failed to delete friendship")?;
        Ok(rows > 0)
    }

    /// Personals whose birthday (month and day) falls on `date`.
    /// In non-leap years people born on 02-29 celebrate on 02-28.
    pub fn get_birthdays_on(&self, date: NaiveDate) -> Result<Vec<Personal>> {
        let day = date.format("%m-%d").to_string();
        let leap_day_moves_here = date.month() == 2
            && date.day() == 28
            && NaiveDate::from_ymd_opt(date.year(), 2, 29).is_none();
        let extra_day = if leap_day_moves_here { "02-29".to_string() } else { day.clone() };

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERSONAL_COLUMNS} FROM personals p
             WHERE p.date_of_birth IS NOT NULL
               AND strftime('%m-%d', p.date_of_birth) IN (?1, ?2)
             ORDER BY p.id"
        ))?;

        let persons = stmt
            .query_map((day, extra_day), |row| map_personal(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(persons)
    }
}
