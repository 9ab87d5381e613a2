use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::uploads::public_url;
use crate::wire::{UserSummary, UserView};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub avatar_path: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
            avatar_path: row.get("avatar_path")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_path.as_deref().map(public_url),
        }
    }

    pub fn view(&self, num_posts: i64, viewer_id: Option<&str>) -> UserView {
        UserView {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_path.as_deref().map(public_url),
            num_posts,
            is_current_user: viewer_id == Some(self.id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub image_path: String,
    pub body: String,
    pub created_at: String,
}

/// Parse SQLite's `datetime('now')` text format as UTC.
pub fn parse_db_time(db_time: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| {
            tracing::warn!("Unparseable timestamp in database: {}", db_time);
            DateTime::<Utc>::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_db_time_handles_sqlite_format() {
        let dt = parse_db_time("2025-01-15 12:30:05");
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.second(), 5);
    }

    #[test]
    fn parse_db_time_bad_input_is_epoch() {
        assert_eq!(parse_db_time("not-a-date"), DateTime::<Utc>::default());
    }

    #[test]
    fn user_view_marks_viewer() {
        let user = User {
            id: "u1".into(),
            username: "alice".into(),
            password_hash: "x".into(),
            avatar_path: Some("avatars/abc-photo.png".into()),
            created_at: "2025-01-15 12:00:00".into(),
        };
        let view = user.view(3, Some("u1"));
        assert!(view.is_current_user);
        assert_eq!(view.num_posts, 3);
        assert_eq!(
            view.avatar_url.as_deref(),
            Some("/uploads/avatars/abc-photo.png")
        );
        assert!(!user.view(0, Some("u2")).is_current_user);
        assert!(!user.view(0, None).is_current_user);
    }
}
