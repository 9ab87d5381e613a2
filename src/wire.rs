//! JSON bodies shared by the HTTP handlers and the client.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 15;
pub const PASSWORD_MIN: usize = 3;
pub const PASSWORD_MAX: usize = 15;
pub const COMMENT_MAX: usize = 500;
pub const POST_TEXT_MAX: usize = 2000;

// --- Errors ---

/// Machine-readable error category carried in every 4xx/5xx body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Validation,
    UsernameTaken,
    InvalidCredentials,
    Unauthorized,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    UnsupportedMediaType,
    Internal,
    /// Anything this build does not recognise, or no body at all.
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "VALIDATION" => Self::Validation,
            "USERNAME_TAKEN" => Self::UsernameTaken,
            "INVALID_CREDENTIALS" => Self::InvalidCredentials,
            "UNAUTHORIZED" => Self::Unauthorized,
            "FORBIDDEN" => Self::Forbidden,
            "NOT_FOUND" => Self::NotFound,
            "PAYLOAD_TOO_LARGE" => Self::PayloadTooLarge,
            "UNSUPPORTED_MEDIA_TYPE" => Self::UnsupportedMediaType,
            "INTERNAL" => Self::Internal,
            _ => Self::Unknown,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_type: ErrorType,
    pub message: String,
}

// --- Credentials ---

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("username must be 3 to 15 characters")]
    UsernameLength,
    #[error("username may only contain letters, digits, '_' and '.'")]
    UsernameCharacters,
    #[error("password must be 3 to 15 characters")]
    PasswordLength,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Form-level checks run before anything touches the network or the database.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        let username_len = self.username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
            return Err(CredentialsError::UsernameLength);
        }
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(CredentialsError::UsernameCharacters);
        }
        let password_len = self.password.chars().count();
        if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&password_len) || self.password.trim().is_empty()
        {
            return Err(CredentialsError::PasswordLength);
        }
        Ok(())
    }
}

// --- Views ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub num_posts: i64,
    pub is_current_user: bool,
}

impl UserView {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub creator_id: String,
    pub creator: UserSummary,
    pub image_url: String,
    pub text: String,
    pub num_likes: i64,
    pub num_comments: i64,
    pub liked_by_current_user: bool,
    pub is_created_by_current_user: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub creator: UserSummary,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// --- Envelopes ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersEnvelope {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEnvelope {
    pub post: PostView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsEnvelope {
    pub posts: Vec<PostView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEnvelope {
    pub comment: CommentView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsEnvelope {
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub text: String,
}

// --- Queries ---

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_liked_id: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub exclude_current: bool,
}

/// Clamp a client-supplied page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_accept_bounds() {
        assert!(Credentials::new("abc", "xyz").validate().is_ok());
        assert!(Credentials::new("a".repeat(15), "p".repeat(15))
            .validate()
            .is_ok());
    }

    #[test]
    fn credentials_reject_short_and_long() {
        assert_eq!(
            Credentials::new("ab", "secret").validate(),
            Err(CredentialsError::UsernameLength)
        );
        assert_eq!(
            Credentials::new("alice", "p".repeat(16)).validate(),
            Err(CredentialsError::PasswordLength)
        );
    }

    #[test]
    fn credentials_reject_blank_password() {
        assert_eq!(
            Credentials::new("alice", "   ").validate(),
            Err(CredentialsError::PasswordLength)
        );
    }

    #[test]
    fn credentials_reject_odd_characters() {
        assert_eq!(
            Credentials::new("al ice", "secret").validate(),
            Err(CredentialsError::UsernameCharacters)
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("alice", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn error_type_serializes_screaming_snake() {
        let body = ErrorBody {
            error_type: ErrorType::UsernameTaken,
            message: "taken".into(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["errorType"], "USERNAME_TAKEN");
    }

    #[test]
    fn error_type_parse_unknown_falls_back() {
        assert_eq!("NOPE".parse::<ErrorType>().unwrap(), ErrorType::Unknown);
        assert_eq!(
            "INVALID_CREDENTIALS".parse::<ErrorType>().unwrap(),
            ErrorType::InvalidCredentials
        );
    }

    #[test]
    fn users_query_defaults() {
        let q: UsersQuery = serde_json::from_str(r#"{"postLikedId":"p1"}"#).unwrap();
        assert_eq!(q.post_liked_id.as_deref(), Some("p1"));
        assert_eq!(q.offset, 0);
        assert_eq!(q.limit, DEFAULT_PAGE_SIZE);
        assert!(!q.exclude_current);
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(500), MAX_PAGE_SIZE);
        assert_eq!(clamp_limit(20), 20);
    }
}
