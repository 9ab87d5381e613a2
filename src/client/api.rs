use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::client::error::ClientError;
use crate::wire::{
    AuthResponse, CommentView, Credentials, FeedQuery, PageQuery, PostView, UserSummary, UserView,
    UsersQuery,
};

/// A file picked by the user for a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(file_name, content_type, bytes))
    }
}

/// Every endpoint the client talks to. Authenticated calls take the bearer
/// token explicitly; the token store stays on the client side.
#[async_trait]
pub trait SocialApi: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError>;
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError>;
    async fn current_user(&self, token: &str) -> Result<UserView, ClientError>;
    async fn logout(&self, token: &str) -> Result<(), ClientError>;

    async fn user(&self, token: Option<&str>, user_id: &str) -> Result<UserView, ClientError>;
    async fn users(
        &self,
        token: Option<&str>,
        query: &UsersQuery,
    ) -> Result<Vec<UserSummary>, ClientError>;
    async fn update_avatar(&self, token: &str, avatar: UploadFile)
        -> Result<UserView, ClientError>;

    async fn feed(&self, token: Option<&str>, query: &FeedQuery)
        -> Result<Vec<PostView>, ClientError>;
    async fn post(&self, token: Option<&str>, post_id: &str) -> Result<PostView, ClientError>;
    async fn create_post(
        &self,
        token: &str,
        image: UploadFile,
        text: &str,
    ) -> Result<PostView, ClientError>;
    async fn delete_post(&self, token: &str, post_id: &str) -> Result<(), ClientError>;
    async fn like_post(&self, token: &str, post_id: &str) -> Result<PostView, ClientError>;
    async fn remove_like(&self, token: &str, post_id: &str) -> Result<PostView, ClientError>;

    async fn comments(
        &self,
        token: Option<&str>,
        post_id: &str,
        page: &PageQuery,
    ) -> Result<Vec<CommentView>, ClientError>;
    async fn add_comment(
        &self,
        token: &str,
        post_id: &str,
        text: &str,
    ) -> Result<CommentView, ClientError>;
}
