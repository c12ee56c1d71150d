use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use kozosseg_types::{
    ContentType, MediaContent, Post, PostView, PostWithComments, ReactionCounts, ReactionKind,
};

use super::comment_repository::load_comments;
use crate::db::DbPool;

/// Posts aliased as `p`, authorship from `personal_posts pp`
const POST_COLUMNS: &str = "p.id, p.source_id, COALESCE(pp.person_id, p.source_id), p.content, p.created_at, p.likes, p.dislikes";

fn map_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        source_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        likes: row.get(5)?,
        dislikes: row.get(6)?,
    })
}

fn map_media(row: &Row) -> rusqlite::Result<MediaContent> {
    let kind: String = row.get(3)?;
    let content_type = ContentType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown content type {kind}").into(),
        )
    })?;
    Ok(MediaContent {
        id: row.get(0)?,
        post_id: row.get(1)?,
        file_name: row.get(2)?,
        content_type,
    })
}

fn load_media(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<MediaContent>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, post_id, file_name, content_type FROM media_contents WHERE post_id = ? ORDER BY id",
    )?;
    let media = stmt
        .query_map([post_id], map_media)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

/// Assemble the feed view of a post on an open connection
fn load_view(conn: &Connection, post: Post) -> rusqlite::Result<PostView> {
    let (full_name, author_avatar) = conn
        .query_row(
            "SELECT first_name || ' ' || last_name, avatar FROM personals WHERE id = ?",
            [post.author_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?
        .unwrap_or_default();

    Ok(PostView {
        comments: load_comments(conn, post.id)?,
        media: load_media(conn, post.id)?,
        post_id: post.id,
        source_id: post.source_id,
        author_id: post.author_id,
        full_name,
        author_avatar,
        content: post.content,
        created_at: post.created_at,
        likes: post.likes,
        dislikes: post.dislikes,
    })
}

pub struct PostRepository {
    pool: DbPool,
}

impl PostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let conn = self.pool.get()?;
        let post = conn
            .query_row(
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts p
                     LEFT JOIN personal_posts pp ON pp.post_id = p.id
                     WHERE p.id = ?"
                ),
                [id],
                map_post,
            )
            .optional()?;
        Ok(post)
    }

    /// Posts shown on a profile, newest first
    pub fn get_all_post(&self, profile_id: i64) -> Result<Vec<PostView>> {
        let conn = self.pool.get()?;
        let posts = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts p
                 LEFT JOIN personal_posts pp ON pp.post_id = p.id
                 WHERE p.source_id = ?
                 ORDER BY p.created_at DESC, p.id DESC"
            ))?;
            let posts = stmt
                .query_map([profile_id], map_post)?
                .collect::<Result<Vec<_>, _>>()?;
            posts
        };

        let views = posts
            .into_iter()
            .map(|post| load_view(&conn, post))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    /// Feed view of a single post
    pub fn get_view(&self, id: i64) -> Result<Option<PostView>> {
        let Some(post) = self.get_by_id(id)? else {
            return Ok(None);
        };
        let conn = self.pool.get()?;
        Ok(Some(load_view(&conn, post)?))
    }

    pub fn get_post_with_comments(&self, id: i64) -> Result<Option<PostWithComments>> {
        let Some(post) = self.get_by_id(id)? else {
            return Ok(None);
        };
        let conn = self.pool.get()?;
        let comments = load_comments(&conn, post.id)?;
        Ok(Some(PostWithComments { post, comments }))
    }

    /// Create a post on `source_id`'s profile written by `author_id`
    pub fn insert(&self, source_id: i64, author_id: i64, content: &str) -> Result<Post> {
        let (post, _) = self.insert_with_media(source_id, author_id, content, None)?;
        Ok(post)
    }

    /// Create a post together with its authorship row and optional attachment.
    /// Either all rows are written or none.
    pub fn insert_with_media(
        &self,
        source_id: i64,
        author_id: i64,
        content: &str,
        media: Option<(&str, ContentType)>,
    ) -> Result<(Post, Option<MediaContent>)> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO posts (source_id, content, created_at) VALUES (?, ?, ?)",
            (source_id, content, now),
        )
        .context("Failed to insert post")?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO personal_posts (person_id, post_id) VALUES (?, ?)",
            (author_id, id),
        )
        .context("Failed to record post author")?;

        let media = match media {
            Some((file_name, content_type)) => {
                tx.execute(
                    "INSERT INTO media_contents (post_id, file_name, content_type) VALUES (?, ?, ?)",
                    (id, file_name, content_type.as_str()),
                )
                .context("Failed to insert media content")?;
                Some(MediaContent {
                    id: tx.last_insert_rowid(),
                    post_id: id,
                    file_name: file_name.to_string(),
                    content_type,
                })
            }
            None => None,
        };
        tx.commit()?;

        let post = Post {
            id,
            source_id,
            author_id,
            content: content.to_string(),
            created_at: now,
            likes: 0,
            dislikes: 0,
        };
        Ok((post, media))
    }

    pub fn update_content(&self, id: i64, content: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("UPDATE posts SET content = ? WHERE id = ?", (content, id))
            .context("Failed to update post")?;
        Ok(rows > 0)
    }

    /// Remove a post together with its authorship row, comments, media and reactions
    pub fn delete(&self, id: i64) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for table in ["personal_posts", "comments", "media_contents", "reactions"] {
            tx.execute(&format!("DELETE FROM {table} WHERE post_id = ?"), [id])
                .with_context(|| format!("Failed to delete post rows from {table}"))?;
        }
        let rows = tx
            .execute("DELETE FROM posts WHERE id = ?", [id])
            .context("Failed to delete post")?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Record (or change) a user's reaction and recount the post's totals
    pub fn react(&self, post_id: i64, user_id: i64, kind: ReactionKind) -> Result<ReactionCounts> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO reactions (user_id, post_id, kind, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, post_id)
             DO UPDATE SET kind = excluded.kind, created_at = excluded.created_at",
            (user_id, post_id, kind.as_str(), Utc::now()),
        )
        .context("Failed to upsert reaction")?;

        let counts = tx.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN kind = 'like' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN kind = 'dislike' THEN 1 ELSE 0 END), 0)
             FROM reactions WHERE post_id = ?",
            [post_id],
            |row| {
                Ok(ReactionCounts {
                    likes: row.get(0)?,
                    dislikes: row.get(1)?,
                })
            },
        )?;

        tx.execute(
            "UPDATE posts SET likes = ?, dislikes = ? WHERE id = ?",
            (counts.likes, counts.dislikes, post_id),
        )
        .context("Failed to update reaction counts")?;
        tx.commit()?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup_test_db() -> (Database, PostRepository) {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_test_data().expect("Failed to seed test data");
        let repo = PostRepository::new(db.pool.clone());
        (db, repo)
    }

    #[test]
    fn test_get_by_id_loads_author() {
        let (_db, repo) = setup_test_db();
        let post = repo.get_by_id(1).unwrap().unwrap();
        assert_eq!(post.author_id, 1);
        assert_eq!(post.source_id, 1);
        assert!(repo.get_by_id(50).unwrap().is_none());
    }

    #[test]
    fn test_get_all_post_views_newest_first() {
        let (_db, repo) = setup_test_db();
        let (written, media) = repo
            .insert_with_media(1, 2, "Boldog névnapot!", Some(("abc-torta.jpg", ContentType::Image)))
            .unwrap();
        assert_eq!(media.map(|m| m.post_id), Some(written.id));

        let views = repo.get_all_post(1).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].post_id, written.id);
        assert_eq!(views[0].full_name, "Teszt Elek");
        assert_eq!(views[0].media.len(), 1);
        assert_eq!(views[1].full_name, "Gipsz Jakab");
        assert_eq!(views[1].comments.len(), 1);

        assert!(repo.get_all_post(3).unwrap().is_empty());
    }

    #[test]
    fn test_failed_insert_leaves_no_rows() {
        let (db, repo) = setup_test_db();
        // no personal 999, so the authorship row violates its foreign key
        let result = repo.insert_with_media(1, 999, "árva", Some(("abc-arva.png", ContentType::Image)));
        assert!(result.is_err());

        let conn = db.connection().unwrap();
        let posts: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0)).unwrap();
        let media: i64 = conn
            .query_row("SELECT COUNT(*) FROM media_contents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(posts, 1);
        assert_eq!(media, 0);
    }

    #[test]
    fn test_get_post_with_comments() {
        let (_db, repo) = setup_test_db();
        let post = repo.get_post_with_comments(1).unwrap().unwrap();
        assert_eq!(post.comments[0].text, "Gratulálok!");
    }

    #[test]
    fn test_update_content() {
        let (_db, repo) = setup_test_db();
        assert!(repo.update_content(1, "Javított bejegyzés").unwrap());
        assert_eq!(repo.get_by_id(1).unwrap().unwrap().content, "Javított bejegyzés");
        assert!(!repo.update_content(77, "x").unwrap());
    }

    #[test]
    fn test_delete_removes_dependent_rows() {
        let (db, repo) = setup_test_db();
        let (post, _) = repo
            .insert_with_media(1, 1, "Képes bejegyzés", Some(("abc-kep.png", ContentType::Image)))
            .unwrap();
        repo.react(post.id, 2, ReactionKind::Like).unwrap();
        repo.react(1, 2, ReactionKind::Like).unwrap();

        assert!(repo.delete(post.id).unwrap());
        assert!(repo.delete(1).unwrap());
        assert!(repo.get_by_id(1).unwrap().is_none());

        let conn = db.connection().unwrap();
        for post_id in [1, post.id] {
            for table in ["personal_posts", "comments", "media_contents", "reactions"] {
                let count: i64 = conn
                    .query_row(
                        &format!("SELECT COUNT(*) FROM {table} WHERE post_id = ?"),
                        [post_id],
                        |row| row.get(0),
                    )
                    .unwrap();
                assert_eq!(count, 0, "{table} still references post {post_id}");
            }
        }
        drop(conn);
        assert!(!repo.delete(1).unwrap());
    }

    #[test]
    fn test_react_upserts_and_recounts() {
        let (_db, repo) = setup_test_db();
        let counts = repo.react(1, 2, ReactionKind::Like).unwrap();
        assert_eq!(counts, ReactionCounts { likes: 1, dislikes: 0 });

        let counts = repo.react(1, 3, ReactionKind::Dislike).unwrap();
        assert_eq!(counts, ReactionCounts { likes: 1, dislikes: 1 });

        // changing one's mind replaces the earlier reaction
        let counts = repo.react(1, 2, ReactionKind::Dislike).unwrap();
        assert_eq!(counts, ReactionCounts { likes: 0, dislikes: 2 });

        let post = repo.get_by_id(1).unwrap().unwrap();
        assert_eq!((post.likes, post.dislikes), (0, 2));
    }
}
