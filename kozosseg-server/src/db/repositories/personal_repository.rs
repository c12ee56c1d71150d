use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};

use kozosseg_types::{Personal, UpdatePersonalRequest};

use crate::db::DbPool;

/// Column list matching `map_personal`; the table must be aliased as `p`
pub(crate) const PERSONAL_COLUMNS: &str = "p.id, p.first_name, p.last_name, p.is_male, p.date_of_birth, p.place_of_residence, p.avatar, p.phone_number";

/// Read a personal starting at column `offset`
pub(crate) fn map_personal(row: &Row, offset: usize) -> rusqlite::Result<Personal> {
    Ok(Personal {
        id: row.get(offset)?,
        first_name: row.get(offset + 1)?,
        last_name: row.get(offset + 2)?,
        is_male: row.get(offset + 3)?,
        date_of_birth: row.get(offset + 4)?,
        place_of_residence: row.get(offset + 5)?,
        avatar: row.get(offset + 6)?,
        phone_number: row.get(offset + 7)?,
    })
}

pub struct PersonalRepository {
    pool: DbPool,
}

impl PersonalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn get(&self, id: i64) -> Result<Option<Personal>> {
        let conn = self.pool.get()?;
        let personal = conn
            .query_row(
                &format!("SELECT {PERSONAL_COLUMNS} FROM personals p WHERE p.id = ?"),
                [id],
                |row| map_personal(row, 0),
            )
            .optional()?;
        Ok(personal)
    }

    pub fn exists(&self, id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM personals WHERE id = ?",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Everyone except `user_id`, ordered by place of residence then birth date
    pub fn filter_persons(&self, user_id: i64) -> Result<Vec<Personal>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PERSONAL_COLUMNS} FROM personals p
             WHERE p.id <> ?
             ORDER BY p.place_of_residence, p.date_of_birth, p.id"
        ))?;

        let persons = stmt
            .query_map([user_id], |row| map_personal(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(persons)
    }

    /// Apply the given profile changes; untouched fields keep their value.
    /// Returns false when the personal does not exist.
    pub fn update(&self, id: i64, changes: &UpdatePersonalRequest) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE personals SET
                    first_name = COALESCE(?, first_name),
                    last_name = COALESCE(?, last_name),
                    date_of_birth = COALESCE(?, date_of_birth),
                    place_of_residence = COALESCE(?, place_of_residence),
                    phone_number = COALESCE(?, phone_number)
                 WHERE id = ?",
                (
                    &changes.first_name,
                    &changes.last_name,
                    changes.date_of_birth,
                    &changes.place_of_residence,
                    &changes.phone_number,
                    id,
                ),
            )
            .context("Failed to update personal")?;
        Ok(rows > 0)
    }

    pub fn update_avatar(&self, id: i64, avatar: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("UPDATE personals SET avatar = ? WHERE id = ?", (avatar, id))
            .context("Failed to update avatar")?;
        Ok(rows > 0)
    }
}
