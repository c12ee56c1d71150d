use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row};

use kozosseg_types::{Notification, NotificationType, NotificationWithAvatar};

use crate::db::DbPool;

const NOTIFICATION_COLUMNS: &str = "n.id, n.receiver_id, n.sender_id, n.content, n.notification_type, n.is_new, n.created_at";

fn map_notification(row: &Row) -> rusqlite::Result<Notification> {
    let kind: String = row.get(4)?;
    let notification_type = NotificationType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown notification type {kind}").into(),
        )
    })?;
    Ok(Notification {
        id: row.get(0)?,
        receiver_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        notification_type,
        is_new: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_with_avatar(row: &Row) -> rusqlite::Result<NotificationWithAvatar> {
    let first: Option<String> = row.get(7)?;
    let last: Option<String> = row.get(8)?;
    Ok(NotificationWithAvatar {
        notification: map_notification(row)?,
        sender_name: format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
            .trim()
            .to_string(),
        sender_avatar: row.get(9)?,
    })
}

pub struct NotificationRepository {
    pool: DbPool,
}

impl NotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Notifications addressed to `receiver_id`, newest first, with sender details
    pub fn get_all_for(&self, receiver_id: i64) -> Result<Vec<NotificationWithAvatar>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS}, p.first_name, p.last_name, p.avatar
             FROM notifications n
             LEFT JOIN personals p ON p.id = n.sender_id
             WHERE n.receiver_id = ?
             ORDER BY n.created_at DESC, n.id DESC"
        ))?;

        let notifications = stmt
            .query_map([receiver_id], map_with_avatar)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let conn = self.pool.get()?;
        let notification = conn
            .query_row(
                &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications n WHERE n.id = ?"),
                [id],
                map_notification,
            )
            .optional()?;
        Ok(notification)
    }

    /// Notification with sender name and avatar, as pushed to clients
    pub fn get_with_avatar(&self, id: i64) -> Result<Option<NotificationWithAvatar>> {
        let conn = self.pool.get()?;
        let notification = conn
            .query_row(
                &format!(
                    "SELECT {NOTIFICATION_COLUMNS}, p.first_name, p.last_name, p.avatar
                     FROM notifications n
                     LEFT JOIN personals p ON p.id = n.sender_id
                     WHERE n.id = ?"
                ),
                [id],
                map_with_avatar,
            )
            .optional()?;
        Ok(notification)
    }

    /// Insert and return the stored notification (with its new id)
    pub fn insert(&self, notification: &Notification) -> Result<Notification> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO notifications (receiver_id, sender_id, content, notification_type, is_new, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                notification.receiver_id,
                notification.sender_id,
                &notification.content,
                notification.notification_type.as_str(),
                notification.is_new,
                notification.created_at,
            ),
        )
        .context("Failed to insert notification")?;

        Ok(Notification {
            id: conn.last_insert_rowid(),
            ..notification.clone()
        })
    }

    /// Overwrite every field of an existing notification
    pub fn update(&self, notification: &Notification) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE notifications
                 SET receiver_id = ?, sender_id = ?, content = ?, notification_type = ?, is_new = ?, created_at = ?
                 WHERE id = ?",
                (
                    notification.receiver_id,
                    notification.sender_id,
                    &notification.content,
                    notification.notification_type.as_str(),
                    notification.is_new,
                    notification.created_at,
                    notification.id,
                ),
            )
            .context("Failed to update notification")?;
        Ok(rows > 0)
    }

    pub fn mark_read(&self, id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("UPDATE notifications SET is_new = 0 WHERE id = ?", [id])
            .context("Failed to mark notification read")?;
        Ok(rows > 0)
    }

    /// Pending friend request notification from `sender_id` to `receiver_id`
    pub fn find_friend_request(&self, receiver_id: i64, sender_id: i64) -> Result<Option<Notification>> {
        let conn = self.pool.get()?;
        let notification = conn
            .query_row(
                &format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
                     WHERE n.receiver_id = ? AND n.sender_id = ? AND n.notification_type = ?
                     ORDER BY n.created_at DESC LIMIT 1"
                ),
                (receiver_id, sender_id, NotificationType::FriendRequest.as_str()),
                map_notification,
            )
            .optional()?;
        Ok(notification)
    }

    /// Whether a notification of this kind was already created for the pair on `date`
    pub fn exists_on_day(
        &self,
        receiver_id: i64,
        sender_id: i64,
        notification_type: NotificationType,
        date: NaiveDate,
    ) -> Result<bool> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .context("Invalid start of day")?
            .and_utc();
        let end = start + chrono::Duration::days(1);

        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications
             WHERE receiver_id = ? AND sender_id = ? AND notification_type = ?
               AND created_at >= ? AND created_at < ?",
            (receiver_id, sender_id, notification_type.as_str(), start, end),
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_unread(&self, receiver_id: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE receiver_id = ? AND is_new = 1",
            [receiver_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: i64, created_at: chrono::DateTime<Utc>) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE notifications SET created_at = ? WHERE id = ?",
            (created_at, id),
        )?;
        Ok(())
    }
}
