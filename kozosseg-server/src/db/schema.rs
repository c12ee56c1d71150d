/// SQL schema for the Kozosseg database
/// Creates all tables with proper constraints, foreign keys, and indexes
pub const SCHEMA: &str = r#"
-- Accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
    secondary_email TEXT,
    password_hash TEXT NOT NULL,
    is_activated INTEGER NOT NULL DEFAULT 0,
    last_online TEXT,
    created_at TEXT NOT NULL
);

-- Public profiles, same id as the owning user
CREATE TABLE IF NOT EXISTS personals (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    is_male INTEGER NOT NULL DEFAULT 0,
    date_of_birth TEXT,
    place_of_residence TEXT,
    avatar TEXT,
    phone_number TEXT,
    FOREIGN KEY (id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS settings (
    user_id INTEGER PRIMARY KEY,
    next_reminder TEXT,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- user_id received the request, friend_id sent it
CREATE TABLE IF NOT EXISTS friends (
    friendship_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    friend_id INTEGER NOT NULL,
    status INTEGER NOT NULL CHECK(status IN (1, 3, 4)),
    friendship_since TEXT,
    UNIQUE (user_id, friend_id),
    CHECK (user_id <> friend_id),
    FOREIGN KEY (user_id) REFERENCES personals(id) ON DELETE CASCADE,
    FOREIGN KEY (friend_id) REFERENCES personals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_friends_user ON friends(user_id);
CREATE INDEX IF NOT EXISTS idx_friends_friend ON friends(friend_id);
-- one row per unordered pair
CREATE UNIQUE INDEX IF NOT EXISTS idx_friends_pair
    ON friends(MIN(user_id, friend_id), MAX(user_id, friend_id));

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    receiver_id INTEGER NOT NULL,
    sender_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    notification_type TEXT NOT NULL,
    is_new INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (receiver_id) REFERENCES personals(id) ON DELETE CASCADE,
    FOREIGN KEY (sender_id) REFERENCES personals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_notifications_receiver ON notifications(receiver_id, created_at DESC);

CREATE TABLE IF NOT EXISTS chat_rooms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id INTEGER NOT NULL,
    receiver_id INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    FOREIGN KEY (sender_id) REFERENCES personals(id) ON DELETE CASCADE,
    FOREIGN KEY (receiver_id) REFERENCES personals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chat_rooms_sender ON chat_rooms(sender_id);
CREATE INDEX IF NOT EXISTS idx_chat_rooms_receiver ON chat_rooms(receiver_id);
-- one room per unordered pair
CREATE UNIQUE INDEX IF NOT EXISTS idx_chat_rooms_pair
    ON chat_rooms(MIN(sender_id, receiver_id), MAX(sender_id, receiver_id));

CREATE TABLE IF NOT EXISTS chat_contents (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_room_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    message TEXT NOT NULL,
    sent_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'sent',
    FOREIGN KEY (chat_room_id) REFERENCES chat_rooms(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES personals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chat_contents_room ON chat_contents(chat_room_id, sent_at);

-- source_id is the profile the post is shown on
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    likes INTEGER NOT NULL DEFAULT 0,
    dislikes INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (source_id) REFERENCES personals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_source ON posts(source_id, created_at DESC);

-- Authorship of posts
CREATE TABLE IF NOT EXISTS personal_posts (
    personal_post_id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL UNIQUE,
    FOREIGN KEY (person_id) REFERENCES personals(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES personals(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);

CREATE TABLE IF NOT EXISTS media_contents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    content_type TEXT NOT NULL CHECK(content_type IN ('image', 'video')),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

-- One reaction per user per post
CREATE TABLE IF NOT EXISTS reactions (
    user_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('like', 'dislike')),
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, post_id),
    FOREIGN KEY (user_id) REFERENCES personals(id) ON DELETE CASCADE,
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
"#;

/// Test data for development and testing:
/// - 4 activated users with personals and settings
/// - an accepted friendship between users 1 and 2
/// - a chat room between users 1 and 2
/// - one post with a comment on user 1's profile
///
/// Seeded accounts carry an unusable password hash; set one through the
/// password reset flow before logging in.
pub const TEST_DATA: &str = r#"
INSERT OR IGNORE INTO users (id, guid, email, password_hash, is_activated, created_at) VALUES
    (1, '6f1c2d3e-0000-4000-8000-000000000001', 'gipsz.jakab@kozosseg.hu', '!', 1, '2024-01-01 08:00:00+00:00'),
    (2, '6f1c2d3e-0000-4000-8000-000000000002', 'teszt.elek@kozosseg.hu', '!', 1, '2024-01-02 08:00:00+00:00'),
    (3, '6f1c2d3e-0000-4000-8000-000000000003', 'kiwikamaho@kozosseg.hu', '!', 1, '2024-01-03 08:00:00+00:00'),
    (4, '6f1c2d3e-0000-4000-8000-000000000004', 'albatrosz.aladin@kozosseg.hu', '!', 1, '2024-01-04 08:00:00+00:00');

INSERT OR IGNORE INTO personals (id, first_name, last_name, is_male, date_of_birth, place_of_residence) VALUES
    (1, 'Gipsz', 'Jakab', 1, '1990-03-14', 'Budapest'),
    (2, 'Teszt', 'Elek', 1, '1985-07-01', 'Debrecen'),
    (3, 'Kiwikamaho', 'Hujahou', 0, '1999-11-23', 'Budapest'),
    (4, 'Albatrosz', 'Aladin', 1, '1978-01-30', 'Szeged');

INSERT OR IGNORE INTO settings (user_id) VALUES (1), (2), (3), (4);

INSERT OR IGNORE INTO friends (friendship_id, user_id, friend_id, status, friendship_since) VALUES
    (1, 1, 2, 1, '2024-02-01 10:00:00+00:00');

INSERT OR IGNORE INTO chat_rooms (id, sender_id, receiver_id, started_at, ended_at) VALUES
    (1, 2, 1, '2024-02-02 09:00:00+00:00', '2024-02-02 09:05:00+00:00');

INSERT OR IGNORE INTO chat_contents (message_id, chat_room_id, author_id, message, sent_at, status) VALUES
    (1, 1, 2, 'Szia Jakab!', '2024-02-02 09:00:00+00:00', 'read'),
    (2, 1, 1, 'Szia Elek, mi újság?', '2024-02-02 09:05:00+00:00', 'sent');

INSERT OR IGNORE INTO posts (id, source_id, content, created_at) VALUES
    (1, 1, 'Első bejegyzés a profilomon.', '2024-02-03 12:00:00+00:00');

INSERT OR IGNORE INTO personal_posts (personal_post_id, person_id, post_id) VALUES
    (1, 1, 1);

INSERT OR IGNORE INTO comments (id, post_id, author_id, text, created_at) VALUES
    (1, 1, 2, 'Gratulálok!', '2024-02-03 12:30:00+00:00');
"#;
