//! SQLite storage layer for reverie.
//!
//! Owns the schema and every query the HTTP handlers run: accounts and
//! profiles, the follow graph, the activity feed, direct messages (thread
//! and inbox views), mood logs, and bearer-token sessions.  Uniqueness of
//! usernames, emails, and follow edges is enforced by the database so that
//! concurrent idempotent writes are arbitrated by constraint violations
//! rather than in-process locking.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
    AlreadyExists(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// User row stored in the database.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: u64,
}

/// Profile row, one-to-one with a user.  Created together with the user;
/// readers fall back to empty strings when no row is found.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    pub user_id: i64,
    pub bio: String,
    pub mood_preference: String,
}

/// A user as returned by search, with bio joined in.
#[derive(Debug, Clone, Serialize)]
pub struct UserSearchRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
}

/// A follower of some user (followers list view).
#[derive(Debug, Clone, Serialize)]
pub struct FollowerEntry {
    pub id: i64,
    pub username: String,
}

/// A user the caller follows, enriched with profile fields.
#[derive(Debug, Clone, Serialize)]
pub struct FollowedEntry {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub mood_preference: String,
}

/// Post row with the author's username joined in.
#[derive(Debug, Clone, Serialize)]
pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub content_text: String,
    pub visibility: String,
    pub timestamp: u64,
}

/// Direct message row.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub timestamp: u64,
    pub is_read: bool,
}

/// One inbox entry: the latest message exchanged with a given partner.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub partner_id: i64,
    pub partner_username: String,
    pub message_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub timestamp: u64,
    pub is_read: bool,
}

/// Mood log row, strictly owner-scoped on read.
#[derive(Debug, Clone, Serialize)]
pub struct MoodLogRow {
    pub id: i64,
    pub user_id: i64,
    pub mood: String,
    pub stress: i64,
    pub sleep: f64,
    pub notes: String,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id         INTEGER PRIMARY KEY
                                REFERENCES users(id) ON DELETE CASCADE,
                bio             TEXT NOT NULL DEFAULT '',
                mood_preference TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS follows (
                follower_id     INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                following_id    INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                created_at      INTEGER NOT NULL,
                PRIMARY KEY (follower_id, following_id)
            );

            CREATE INDEX IF NOT EXISTS idx_follows_following
                ON follows(following_id);

            CREATE TABLE IF NOT EXISTS posts (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                content_text    TEXT NOT NULL,
                visibility      TEXT NOT NULL DEFAULT 'public',
                timestamp       INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_posts_user
                ON posts(user_id, timestamp);

            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id       INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                receiver_id     INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                timestamp       INTEGER NOT NULL,
                is_read         INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_messages_sender
                ON messages(sender_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_messages_receiver
                ON messages(receiver_id, timestamp);

            CREATE TABLE IF NOT EXISTS mood_logs (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                mood            TEXT NOT NULL,
                stress          INTEGER NOT NULL,
                sleep           REAL NOT NULL,
                notes           TEXT NOT NULL DEFAULT '',
                timestamp       INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mood_logs_user
                ON mood_logs(user_id, timestamp);

            CREATE TABLE IF NOT EXISTS sessions (
                token           TEXT PRIMARY KEY,
                user_id         INTEGER NOT NULL
                                REFERENCES users(id) ON DELETE CASCADE,
                kind            TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user
                ON sessions(user_id);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users + profiles
    // -----------------------------------------------------------------------

    /// Create a user and its (empty) profile in one transaction.
    ///
    /// A username or email collision surfaces as [`StorageError::AlreadyExists`],
    /// whether detected here or by a concurrent writer hitting the unique
    /// constraint first.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        now: u64,
    ) -> Result<UserRow, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO users (username, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![username, email, password_hash, now as i64],
        );
        if let Err(e) = inserted {
            if is_constraint_violation(&e) {
                return Err(StorageError::AlreadyExists(
                    "username or email already taken".to_string(),
                ));
            }
            return Err(e.into());
        }
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO profiles (user_id, bio, mood_preference) VALUES (?1, '', '')",
            params![id],
        )?;
        tx.commit()?;
        Ok(UserRow {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>, StorageError> {
        self.query_user("SELECT id, username, email, password_hash, created_at
                         FROM users WHERE id = ?1", params![id])
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StorageError> {
        self.query_user(
            "SELECT id, username, email, password_hash, created_at
             FROM users WHERE username = ?1",
            params![username],
        )
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, StorageError> {
        self.query_user(
            "SELECT id, username, email, password_hash, created_at
             FROM users WHERE email = ?1",
            params![email],
        )
    }

    fn query_user(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> Result<Option<UserRow>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let row = stmt
            .query_row(bind, |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: row.get::<_, i64>(4)? as u64,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn email_exists(&self, email: &str) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Rename a user and change their email.  Collisions with another user's
    /// username or email surface as [`StorageError::AlreadyExists`].
    pub fn update_user(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> Result<(), StorageError> {
        let result = self.conn.execute(
            "UPDATE users SET username = ?1, email = ?2 WHERE id = ?3",
            params![username, email, id],
        );
        match result {
            Ok(affected) if affected > 0 => Ok(()),
            Ok(_) => Err(StorageError::NotFound(format!("user {id}"))),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::AlreadyExists(
                "username or email already taken".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a user.  Profile, follows, posts, messages, mood logs, and
    /// sessions all go with it via `ON DELETE CASCADE`.
    pub fn delete_user(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Search users by case-insensitive substring on username or email.
    /// An empty query returns everyone.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserSearchRow>, StorageError> {
        let pattern = format!("%{}%", query.to_lowercase());
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.username, u.email, IFNULL(p.bio, '')
             FROM users u
             LEFT JOIN profiles p ON p.user_id = u.id
             WHERE lower(u.username) LIKE ?1 OR lower(u.email) LIKE ?1
             ORDER BY u.id",
        )?;
        let rows = stmt.query_map(params![pattern], |row| {
            Ok(UserSearchRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                bio: row.get(3)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_profile(&self, user_id: i64) -> Result<Option<ProfileRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, bio, mood_preference FROM profiles WHERE user_id = ?1",
        )?;
        let row = stmt
            .query_row(params![user_id], |row| {
                Ok(ProfileRow {
                    user_id: row.get(0)?,
                    bio: row.get(1)?,
                    mood_preference: row.get(2)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    pub fn upsert_profile(
        &self,
        user_id: i64,
        bio: &str,
        mood_preference: &str,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO profiles (user_id, bio, mood_preference)
             VALUES (?1, ?2, ?3)",
            params![user_id, bio, mood_preference],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Follow graph
    // -----------------------------------------------------------------------

    /// Create a follow edge if absent.  Returns whether the edge is new;
    /// a repeat call (or a concurrent duplicate) reports `false`.
    pub fn insert_follow(
        &self,
        follower_id: i64,
        following_id: i64,
        now: u64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![follower_id, following_id, now as i64],
        )?;
        Ok(affected > 0)
    }

    /// Remove a follow edge.  Returns whether an edge existed.
    pub fn delete_follow(&self, follower_id: i64, following_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
        )?;
        Ok(affected > 0)
    }

    /// Users with an edge pointing at `user_id`.
    pub fn list_followers(&self, user_id: i64) -> Result<Vec<FollowerEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.username
             FROM follows f
             JOIN users u ON u.id = f.follower_id
             WHERE f.following_id = ?1
             ORDER BY f.created_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(FollowerEntry {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Users `user_id` follows, enriched with profile fields.  A missing
    /// profile yields empty strings rather than an error.
    pub fn list_following(&self, user_id: i64) -> Result<Vec<FollowedEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.username, u.email,
                    IFNULL(p.bio, ''), IFNULL(p.mood_preference, '')
             FROM follows f
             JOIN users u ON u.id = f.following_id
             LEFT JOIN profiles p ON p.user_id = u.id
             WHERE f.follower_id = ?1
             ORDER BY f.created_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(FollowedEntry {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                bio: row.get(3)?,
                mood_preference: row.get(4)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    pub fn insert_post(
        &self,
        user_id: i64,
        content_text: &str,
        now: u64,
    ) -> Result<PostRow, StorageError> {
        self.conn.execute(
            "INSERT INTO posts (user_id, content_text, visibility, timestamp)
             VALUES (?1, ?2, 'public', ?3)",
            params![user_id, content_text, now as i64],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_post(id)?
            .ok_or_else(|| StorageError::NotFound(format!("post {id}")))
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.user_id, u.username, p.content_text, p.visibility, p.timestamp
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], Self::post_from_row)
            .optional()?;
        Ok(row)
    }

    /// All posts visible to `user_id`: their own plus anyone they follow,
    /// newest first.  Unbounded by design (no pagination).
    pub fn list_feed(&self, user_id: i64) -> Result<Vec<PostRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.user_id, u.username, p.content_text, p.visibility, p.timestamp
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.user_id = ?1
                OR p.user_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
             ORDER BY p.timestamp DESC, p.id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], Self::post_from_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Delete a post owned by `user_id`.  A post that exists but belongs to
    /// someone else is indistinguishable from a missing one: both report
    /// `false`.
    pub fn delete_post(&self, post_id: i64, user_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM posts WHERE id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(affected > 0)
    }

    fn post_from_row(row: &rusqlite::Row<'_>) -> Result<PostRow, rusqlite::Error> {
        Ok(PostRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            username: row.get(2)?,
            content_text: row.get(3)?,
            visibility: row.get(4)?,
            timestamp: row.get::<_, i64>(5)? as u64,
        })
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn insert_message(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
        now: u64,
    ) -> Result<MessageRow, StorageError> {
        self.conn.execute(
            "INSERT INTO messages (sender_id, receiver_id, content, timestamp, is_read)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![sender_id, receiver_id, content, now as i64],
        )?;
        Ok(MessageRow {
            id: self.conn.last_insert_rowid(),
            sender_id,
            receiver_id,
            content: content.to_string(),
            timestamp: now,
            is_read: false,
        })
    }

    /// Full thread between `user_id` and `other_id`, oldest first.
    ///
    /// Reading a conversation is not side-effect-free: within the same
    /// transaction, every unread message from the other user to the caller
    /// is marked read before the rows are returned, so the result already
    /// reflects the update and a repeat call sees the messages as read.
    pub fn conversation(
        &self,
        user_id: i64,
        other_id: i64,
    ) -> Result<Vec<MessageRow>, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE messages SET is_read = 1
             WHERE sender_id = ?1 AND receiver_id = ?2 AND is_read = 0",
            params![other_id, user_id],
        )?;
        let mut result = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT id, sender_id, receiver_id, content, timestamp, is_read
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY timestamp ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![user_id, other_id], Self::message_from_row)?;
            for row in rows {
                result.push(row?);
            }
        }
        tx.commit()?;
        Ok(result)
    }

    /// Latest message per conversation partner.
    ///
    /// Collects every message where `user_id` is sender or receiver, newest
    /// first, and keeps the first message seen per distinct partner.  Equal
    /// timestamps within a pair resolve to the higher message id (the later
    /// insert); output order follows the walk, so partners appear by latest
    /// activity, newest first.
    pub fn inbox(&self, user_id: i64) -> Result<Vec<InboxEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.sender_id, m.receiver_id, m.content, m.timestamp, m.is_read,
                    CASE WHEN m.sender_id = ?1 THEN m.receiver_id ELSE m.sender_id END,
                    u.username
             FROM messages m
             JOIN users u ON u.id =
                  CASE WHEN m.sender_id = ?1 THEN m.receiver_id ELSE m.sender_id END
             WHERE m.sender_id = ?1 OR m.receiver_id = ?1
             ORDER BY m.timestamp DESC, m.id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(InboxEntry {
                message_id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                timestamp: row.get::<_, i64>(4)? as u64,
                is_read: row.get::<_, i32>(5)? != 0,
                partner_id: row.get(6)?,
                partner_username: row.get(7)?,
            })
        })?;

        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for row in rows {
            let entry = row?;
            if seen.insert(entry.partner_id) {
                result.push(entry);
            }
        }
        Ok(result)
    }

    fn message_from_row(row: &rusqlite::Row<'_>) -> Result<MessageRow, rusqlite::Error> {
        Ok(MessageRow {
            id: row.get(0)?,
            sender_id: row.get(1)?,
            receiver_id: row.get(2)?,
            content: row.get(3)?,
            timestamp: row.get::<_, i64>(4)? as u64,
            is_read: row.get::<_, i32>(5)? != 0,
        })
    }

    // -----------------------------------------------------------------------
    // Mood logs
    // -----------------------------------------------------------------------

    pub fn insert_mood_log(
        &self,
        user_id: i64,
        mood: &str,
        stress: i64,
        sleep: f64,
        notes: &str,
        now: u64,
    ) -> Result<MoodLogRow, StorageError> {
        self.conn.execute(
            "INSERT INTO mood_logs (user_id, mood, stress, sleep, notes, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, mood, stress, sleep, notes, now as i64],
        )?;
        Ok(MoodLogRow {
            id: self.conn.last_insert_rowid(),
            user_id,
            mood: mood.to_string(),
            stress,
            sleep,
            notes: notes.to_string(),
            timestamp: now,
        })
    }

    /// Mood logs for one owner only, newest first.
    pub fn list_mood_logs(&self, user_id: i64) -> Result<Vec<MoodLogRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, mood, stress, sleep, notes, timestamp
             FROM mood_logs
             WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(MoodLogRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                mood: row.get(2)?,
                stress: row.get(3)?,
                sleep: row.get(4)?,
                notes: row.get(5)?,
                timestamp: row.get::<_, i64>(6)? as u64,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub fn insert_session(
        &self,
        token: &str,
        user_id: i64,
        kind: &str,
        now: u64,
    ) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, kind, now as i64],
        )?;
        Ok(())
    }

    /// Resolve an access token to its user.  Refresh tokens do not
    /// authenticate requests.
    pub fn session_user(&self, token: &str) -> Result<Option<UserRow>, StorageError> {
        self.query_user(
            "SELECT u.id, u.username, u.email, u.password_hash, u.created_at
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1 AND s.kind = 'access'",
            params![token],
        )
    }

    pub fn delete_sessions_for_user(&self, user_id: i64) -> Result<u32, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(affected as u32)
    }
}

/// Path of the database file inside a data directory.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("reverie.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> Storage {
        Storage::open_in_memory().unwrap()
    }

    fn make_user(storage: &Storage, username: &str) -> UserRow {
        storage
            .create_user(
                username,
                &format!("{username}@example.com"),
                "salt$digest",
                1000,
            )
            .unwrap()
    }

    #[test]
    fn test_user_crud_and_profile_created_together() {
        let storage = test_storage();

        let alice = make_user(&storage, "alice");
        assert!(alice.id > 0);

        let loaded = storage.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(loaded.id, alice.id);
        assert_eq!(loaded.email, "alice@example.com");

        // Profile exists from the moment the user does, with empty fields
        let profile = storage.get_profile(alice.id).unwrap().unwrap();
        assert_eq!(profile.bio, "");
        assert_eq!(profile.mood_preference, "");

        let by_email = storage.get_user_by_email("alice@example.com").unwrap();
        assert!(by_email.is_some());
        assert!(storage.username_exists("alice").unwrap());
        assert!(!storage.username_exists("nobody").unwrap());
    }

    #[test]
    fn test_duplicate_username_and_email_rejected() {
        let storage = test_storage();
        make_user(&storage, "alice");

        let dup_name = storage.create_user("alice", "other@example.com", "h", 1001);
        assert!(matches!(dup_name, Err(StorageError::AlreadyExists(_))));

        let dup_email = storage.create_user("alice2", "alice@example.com", "h", 1002);
        assert!(matches!(dup_email, Err(StorageError::AlreadyExists(_))));

        // The failed inserts left nothing behind
        assert!(storage.get_user_by_username("alice2").unwrap().is_none());
    }

    #[test]
    fn test_update_user_and_collision() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        make_user(&storage, "bob");

        storage
            .update_user(alice.id, "alicia", "alicia@example.com")
            .unwrap();
        let renamed = storage.get_user(alice.id).unwrap().unwrap();
        assert_eq!(renamed.username, "alicia");

        let clash = storage.update_user(alice.id, "bob", "alicia@example.com");
        assert!(matches!(clash, Err(StorageError::AlreadyExists(_))));

        let missing = storage.update_user(9999, "ghost", "ghost@example.com");
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete_user_cascades() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");

        storage.insert_follow(alice.id, bob.id, 1000).unwrap();
        storage.insert_post(alice.id, "hello", 1000).unwrap();
        storage
            .insert_message(alice.id, bob.id, "hi bob", 1000)
            .unwrap();
        storage
            .insert_mood_log(alice.id, "calm", 2, 7.5, "", 1000)
            .unwrap();
        storage.insert_session("tok", alice.id, "access", 1000).unwrap();

        assert!(storage.delete_user(alice.id).unwrap());
        assert!(!storage.delete_user(alice.id).unwrap());

        assert!(storage.get_profile(alice.id).unwrap().is_none());
        assert!(storage.list_followers(bob.id).unwrap().is_empty());
        assert!(storage.list_feed(bob.id).unwrap().is_empty());
        assert!(storage.inbox(bob.id).unwrap().is_empty());
        assert!(storage.session_user("tok").unwrap().is_none());
    }

    #[test]
    fn test_search_users_matches_username_and_email() {
        let storage = test_storage();
        make_user(&storage, "alice");
        make_user(&storage, "bob");
        make_user(&storage, "carol");

        let all = storage.search_users("").unwrap();
        assert_eq!(all.len(), 3);

        let by_name = storage.search_users("ALI").unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].username, "alice");

        let by_email = storage.search_users("bob@").unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].username, "bob");

        assert!(storage.search_users("zzz").unwrap().is_empty());
    }

    #[test]
    fn test_follow_idempotent_and_unfollow() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");

        assert!(storage.insert_follow(alice.id, bob.id, 1000).unwrap());
        // Repeat reports "already there" instead of erroring
        assert!(!storage.insert_follow(alice.id, bob.id, 1001).unwrap());

        let followers = storage.list_followers(bob.id).unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "alice");

        assert!(storage.delete_follow(alice.id, bob.id).unwrap());
        assert!(!storage.delete_follow(alice.id, bob.id).unwrap());
        assert!(storage.list_followers(bob.id).unwrap().is_empty());
    }

    #[test]
    fn test_list_following_enriched_with_profile() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");
        let carol = make_user(&storage, "carol");

        storage.upsert_profile(bob.id, "bob here", "focused").unwrap();
        storage.insert_follow(alice.id, bob.id, 1000).unwrap();
        storage.insert_follow(alice.id, carol.id, 1001).unwrap();

        let following = storage.list_following(alice.id).unwrap();
        assert_eq!(following.len(), 2);
        assert_eq!(following[0].username, "bob");
        assert_eq!(following[0].bio, "bob here");
        assert_eq!(following[0].mood_preference, "focused");
        // Carol never touched her profile; fields default to empty strings
        assert_eq!(following[1].username, "carol");
        assert_eq!(following[1].bio, "");
        assert_eq!(following[1].mood_preference, "");
    }

    #[test]
    fn test_feed_visibility() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");
        let carol = make_user(&storage, "carol");

        storage.insert_post(alice.id, "mine", 100).unwrap();
        storage.insert_post(bob.id, "from bob", 200).unwrap();
        storage.insert_post(carol.id, "from carol", 300).unwrap();

        // Alice follows Bob only; Carol's post must not appear
        storage.insert_follow(alice.id, bob.id, 50).unwrap();

        let feed = storage.list_feed(alice.id).unwrap();
        let contents: Vec<&str> = feed.iter().map(|p| p.content_text.as_str()).collect();
        assert_eq!(contents, vec!["from bob", "mine"]);
        assert_eq!(feed[0].username, "bob");
    }

    #[test]
    fn test_feed_is_newest_first() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");

        storage.insert_post(alice.id, "first", 100).unwrap();
        storage.insert_post(alice.id, "second", 300).unwrap();
        storage.insert_post(alice.id, "third", 200).unwrap();

        let feed = storage.list_feed(alice.id).unwrap();
        let contents: Vec<&str> = feed.iter().map(|p| p.content_text.as_str()).collect();
        assert_eq!(contents, vec!["second", "third", "first"]);
    }

    #[test]
    fn test_delete_post_ownership_folded_into_lookup() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");
        let post = storage.insert_post(alice.id, "keep out", 100).unwrap();

        // Bob deleting Alice's post looks exactly like a missing post
        assert!(!storage.delete_post(post.id, bob.id).unwrap());
        assert!(storage.get_post(post.id).unwrap().is_some());

        assert!(storage.delete_post(post.id, alice.id).unwrap());
        assert!(storage.get_post(post.id).unwrap().is_none());
    }

    #[test]
    fn test_conversation_order_and_read_marking() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");

        storage.insert_message(alice.id, bob.id, "t1", 100).unwrap();
        storage.insert_message(bob.id, alice.id, "t2", 200).unwrap();
        storage.insert_message(alice.id, bob.id, "t3", 300).unwrap();
        storage.insert_message(bob.id, alice.id, "t4", 400).unwrap();

        let thread = storage.conversation(alice.id, bob.id).unwrap();
        let contents: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["t1", "t2", "t3", "t4"]);

        // Messages from Bob to Alice were marked read as part of the call
        for m in &thread {
            if m.sender_id == bob.id {
                assert!(m.is_read, "message {} should be read", m.content);
            } else {
                assert!(!m.is_read, "alice's own sends stay unread for bob");
            }
        }

        // Second call does not error and observes the same state
        let again = storage.conversation(alice.id, bob.id).unwrap();
        assert_eq!(again.len(), 4);
        assert!(again.iter().filter(|m| m.sender_id == bob.id).all(|m| m.is_read));
    }

    #[test]
    fn test_conversation_excludes_third_parties() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");
        let carol = make_user(&storage, "carol");

        storage.insert_message(alice.id, bob.id, "to bob", 100).unwrap();
        storage.insert_message(carol.id, alice.id, "from carol", 200).unwrap();

        let thread = storage.conversation(alice.id, bob.id).unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].content, "to bob");

        // Carol's message to Alice is untouched by reading the Bob thread
        let carol_thread = storage.conversation(carol.id, alice.id).unwrap();
        assert!(!carol_thread[0].is_read);
    }

    #[test]
    fn test_inbox_latest_per_partner() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");
        let carol = make_user(&storage, "carol");

        // Old A->B, newer B->A; old A->C, newer C->A
        storage.insert_message(alice.id, bob.id, "old to bob", 100).unwrap();
        storage.insert_message(bob.id, alice.id, "new from bob", 400).unwrap();
        storage.insert_message(alice.id, carol.id, "old to carol", 200).unwrap();
        storage.insert_message(carol.id, alice.id, "new from carol", 300).unwrap();

        let inbox = storage.inbox(alice.id).unwrap();
        assert_eq!(inbox.len(), 2);

        // Walk order: partners by latest activity, newest first
        assert_eq!(inbox[0].partner_username, "bob");
        assert_eq!(inbox[0].content, "new from bob");
        assert_eq!(inbox[1].partner_username, "carol");
        assert_eq!(inbox[1].content, "new from carol");
    }

    #[test]
    fn test_inbox_equal_timestamps_pick_later_insert() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");

        storage.insert_message(alice.id, bob.id, "earlier insert", 500).unwrap();
        storage.insert_message(bob.id, alice.id, "later insert", 500).unwrap();

        let inbox = storage.inbox(alice.id).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "later insert");
    }

    #[test]
    fn test_inbox_empty_without_messages() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        assert!(storage.inbox(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_mood_logs_owner_scoped_and_newest_first() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");
        let bob = make_user(&storage, "bob");

        storage.insert_mood_log(alice.id, "calm", 2, 8.0, "slept well", 100).unwrap();
        storage.insert_mood_log(alice.id, "stressed", 8, 5.5, "deadline", 300).unwrap();
        storage.insert_mood_log(bob.id, "happy", 1, 9.0, "", 200).unwrap();

        let alice_logs = storage.list_mood_logs(alice.id).unwrap();
        assert_eq!(alice_logs.len(), 2);
        assert_eq!(alice_logs[0].mood, "stressed");
        assert_eq!(alice_logs[1].mood, "calm");
        assert!(alice_logs.iter().all(|l| l.user_id == alice.id));

        let bob_logs = storage.list_mood_logs(bob.id).unwrap();
        assert_eq!(bob_logs.len(), 1);
        assert_eq!(bob_logs[0].mood, "happy");
    }

    #[test]
    fn test_sessions_access_vs_refresh() {
        let storage = test_storage();
        let alice = make_user(&storage, "alice");

        storage.insert_session("acc", alice.id, "access", 1000).unwrap();
        storage.insert_session("ref", alice.id, "refresh", 1000).unwrap();

        let user = storage.session_user("acc").unwrap().unwrap();
        assert_eq!(user.username, "alice");

        // Refresh tokens do not authenticate requests
        assert!(storage.session_user("ref").unwrap().is_none());
        assert!(storage.session_user("bogus").unwrap().is_none());

        assert_eq!(storage.delete_sessions_for_user(alice.id).unwrap(), 2);
        assert!(storage.session_user("acc").unwrap().is_none());
    }
}
