use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::User;

/// Create a new session for a user. Returns the bearer token.
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    hours: u64,
) -> Result<String, rusqlite::Error> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token. Returns whether a row was removed.
pub fn delete_session(conn: &Connection, token: &str) -> Result<bool, rusqlite::Error> {
    let removed = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(removed > 0)
}

/// Resolve a bearer token to its user, ignoring expired sessions.
pub fn find_session_user(conn: &Connection, token: &str) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        "SELECT u.id, u.username, u.password_hash, u.avatar_path, u.created_at
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        User::from_row,
    )
    .optional()
}

/// Drop sessions whose expiry has passed.
pub fn purge_expired(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
