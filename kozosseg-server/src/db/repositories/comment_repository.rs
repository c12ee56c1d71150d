use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use kozosseg_types::Comment;

use crate::db::DbPool;

const COMMENT_COLUMNS: &str = "id, post_id, author_id, text, created_at";

fn map_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Comments of a post, oldest first
pub(crate) fn load_comments(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ? ORDER BY created_at, id"
    ))?;
    let comments = stmt
        .query_map([post_id], map_comment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub struct CommentRepository {
    pool: DbPool,
}

impl CommentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let conn = self.pool.get()?;
        let comment = conn
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"),
                [id],
                map_comment,
            )
            .optional()?;
        Ok(comment)
    }

    pub fn get_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let conn = self.pool.get()?;
        Ok(load_comments(&conn, post_id)?)
    }

    pub fn insert(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment> {
        let conn = self.pool.get()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO comments (post_id, author_id, text, created_at) VALUES (?, ?, ?, ?)",
            (post_id, author_id, text, now),
        )
        .context("Failed to insert comment")?;

        Ok(Comment {
            id: conn.last_insert_rowid(),
            post_id,
            author_id,
            text: text.to_string(),
            created_at: now,
        })
    }

    pub fn update_text(&self, id: i64, text: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("UPDATE comments SET text = ? WHERE id = ?", (text, id))
            .context("Failed to update comment")?;
        Ok(rows > 0)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM comments WHERE id = ?", [id])
            .context("Failed to delete comment")?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup_test_db() -> (Database, CommentRepository) {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_test_data().expect("Failed to seed test data");
        let repo = CommentRepository::new(db.pool.clone());
        (db, repo)
    }

    #[test]
    fn test_insert_and_list_for_post() {
        let (_db, repo) = setup_test_db();
        let stored = repo.insert(1, 3, "Szép!").unwrap();

        let comments = repo.get_for_post(1).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "Gratulálok!");
        assert_eq!(comments[1].id, stored.id);
    }

    #[test]
    fn test_insert_for_missing_post_fails() {
        let (_db, repo) = setup_test_db();
        assert!(repo.insert(99, 3, "Hová?").is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let (_db, repo) = setup_test_db();
        assert!(repo.update_text(1, "Gratulálok, Jakab!").unwrap());
        assert_eq!(repo.get_by_id(1).unwrap().unwrap().text, "Gratulálok, Jakab!");

        assert!(repo.delete(1).unwrap());
        assert!(repo.get_by_id(1).unwrap().is_none());
        assert!(!repo.update_text(1, "x").unwrap());
    }
}
