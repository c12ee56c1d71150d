use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use kozosseg_types::{Personal, PersonalDetails, RegisterRequest, Settings as UserSettings, User};

use super::personal_repository::{map_personal, PERSONAL_COLUMNS};
use crate::db::DbPool;
use crate::password::PasswordHasher;

const USER_COLUMNS: &str = "u.id, u.email, u.secondary_email, u.is_activated, u.last_online, u.created_at";

fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        secondary_email: row.get(2)?,
        is_activated: row.get(3)?,
        last_online: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an account (not yet activated) with its personal and settings rows.
    /// Returns the user and the activation guid.
    pub fn create(&self, request: &RegisterRequest, password_hash: &str) -> Result<(User, String)> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let guid = Uuid::new_v4().to_string();
        let now = Utc::now();

        tx.execute(
            "INSERT INTO users (guid, email, password_hash, is_activated, created_at)
             VALUES (?, ?, ?, 0, ?)",
            (&guid, request.email.trim(), password_hash, now),
        )
        .context("Failed to create user")?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO personals (id, first_name, last_name, is_male, date_of_birth, place_of_residence)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id,
                request.first_name.trim(),
                request.last_name.trim(),
                request.is_male,
                request.date_of_birth,
                &request.place_of_residence,
            ),
        )
        .context("Failed to create personal")?;

        tx.execute("INSERT INTO settings (user_id) VALUES (?)", [id])
            .context("Failed to create settings")?;
        tx.commit()?;

        let user = User {
            id,
            email: request.email.trim().to_string(),
            secondary_email: None,
            is_activated: false,
            last_online: None,
            created_at: now,
        };
        Ok((user, guid))
    }

    /// Get user by ID
    pub fn get_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?"),
                [user_id],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get user by activation guid
    pub fn get_by_guid(&self, guid: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.guid = ?"),
                [guid],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get user by email, optionally together with its personal
    pub fn get_by_email(
        &self,
        email: &str,
        with_personal: bool,
    ) -> Result<Option<(User, Option<Personal>)>> {
        let conn = self.pool.get()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS}, {PERSONAL_COLUMNS}
                     FROM users u LEFT JOIN personals p ON p.id = u.id
                     WHERE u.email = ? COLLATE NOCASE"
                ),
                [email.trim()],
                |row| {
                    let user = map_user(row)?;
                    let personal = if with_personal {
                        row.get::<_, Option<i64>>(6)?
                            .map(|_| map_personal(row, 6))
                            .transpose()?
                    } else {
                        None
                    };
                    Ok((user, personal))
                },
            )
            .optional()?;
        Ok(found)
    }

    /// Look an account up by credentials.
    ///
    /// With both email and password the password must verify against the
    /// stored hash. With only an email the user is returned by email. Any other
    /// combination finds nobody.
    ///
    /// A password alone deliberately matches no one. Scanning every stored hash
    /// for a match would let a single guess log into whichever account happens
    /// to share that password.
    pub fn find_by_credentials(
        &self,
        email: Option<&str>,
        password: Option<&str>,
        hasher: &PasswordHasher,
    ) -> Result<Option<User>> {
        let Some(email) = email.filter(|e| !e.trim().is_empty()) else {
            return Ok(None);
        };

        let conn = self.pool.get()?;
        let found = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = ? COLLATE NOCASE"),
                [email.trim()],
                |row| Ok((map_user(row)?, row.get::<_, String>(6)?)),
            )
            .optional()?;
        drop(conn);

        match (found, password) {
            (Some((user, hash)), Some(password)) => {
                Ok(hasher.verify(password, &hash).then_some(user))
            }
            (Some((user, _)), None) => Ok(Some(user)),
            (None, _) => Ok(None),
        }
    }

    /// Personal joined with its user and (optional) settings
    pub fn get_personal_with_settings_and_user(&self, id: i64) -> Result<Option<PersonalDetails>> {
        let conn = self.pool.get()?;
        let details = conn
            .query_row(
                &format!(
                    "SELECT {USER_COLUMNS}, {PERSONAL_COLUMNS}, s.user_id, s.next_reminder
                     FROM personals p
                     JOIN users u ON u.id = p.id
                     LEFT JOIN settings s ON s.user_id = p.id
                     WHERE p.id = ?"
                ),
                [id],
                |row| {
                    let settings = row
                        .get::<_, Option<i64>>(14)?
                        .map(|user_id| -> rusqlite::Result<UserSettings> {
                            Ok(UserSettings {
                                user_id,
                                next_reminder: row.get(15)?,
                            })
                        })
                        .transpose()?;
                    Ok(PersonalDetails {
                        user: map_user(row)?,
                        personal: map_personal(row, 6)?,
                        settings,
                    })
                },
            )
            .optional()?;
        Ok(details)
    }

    /// Activate the account behind a guid. Returns false for unknown guids.
    pub fn activate(&self, guid: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("UPDATE users SET is_activated = 1 WHERE guid = ?", [guid])
            .context("Failed to activate user")?;
        Ok(rows > 0)
    }

    pub fn update_password(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            (password_hash, user_id),
        )
        .context("Failed to update password")?;
        Ok(())
    }

    pub fn touch_last_online(&self, user_id: i64) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET last_online = ? WHERE id = ?",
            (Utc::now(), user_id),
        )
        .context("Failed to update last online")?;
        Ok(())
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE",
            [email.trim()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
