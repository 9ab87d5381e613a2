use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::client::api::{SocialApi, UploadFile};
use crate::client::error::ClientError;
use crate::wire::{
    AuthResponse, CommentEnvelope, CommentView, CommentsEnvelope, Credentials, ErrorType,
    FeedQuery, NewComment, PageQuery, PostEnvelope, PostView, PostsEnvelope, UserEnvelope,
    UserSummary, UserView, UsersEnvelope, UsersQuery,
};

/// `SocialApi` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(http: reqwest::Client, mut base: Url) -> Self {
        // Treat the base as a directory when joining relative upload URLs
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { http, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Append `segments` to the base path, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Transport(format!("bad base url: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        segments: &[&str],
        token: Option<&str>,
    ) -> Result<RequestBuilder, ClientError> {
        let mut req = self.http.request(method, self.url(segments)?);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }
}

/// Loosely typed error body; a proxy or crash page may not carry one at all.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawErrorBody {
    error_type: Option<String>,
    message: Option<String>,
}

async fn ensure_success(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let (error_type, message) = match serde_json::from_str::<RawErrorBody>(&text) {
        Ok(body) => (
            body.error_type
                .map(|t| t.parse().unwrap_or(ErrorType::Unknown))
                .unwrap_or(ErrorType::Unknown),
            body.message.unwrap_or_default(),
        ),
        Err(_) => (ErrorType::Unknown, text),
    };

    tracing::debug!(status = %status, error_type = %error_type, "Request rejected");

    Err(ClientError::Api {
        status: status.as_u16(),
        error_type,
        message,
    })
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ClientError> {
    let resp = ensure_success(req.send().await?).await?;
    Ok(resp.json::<T>().await?)
}

async fn send_empty(req: RequestBuilder) -> Result<(), ClientError> {
    ensure_success(req.send().await?).await?;
    Ok(())
}

fn file_part(file: UploadFile) -> Result<Part, ClientError> {
    Ok(Part::bytes(file.bytes.to_vec())
        .file_name(file.file_name)
        .mime_str(&file.content_type)?)
}

#[async_trait]
impl SocialApi for HttpApi {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        let req = self.request(reqwest::Method::POST, &["register"], None)?;
        send_json(req.json(credentials)).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ClientError> {
        let req = self.request(reqwest::Method::POST, &["login"], None)?;
        send_json(req.json(credentials)).await
    }

    async fn current_user(&self, token: &str) -> Result<UserView, ClientError> {
        let req = self.request(reqwest::Method::GET, &["current-user"], Some(token))?;
        let envelope: UserEnvelope = send_json(req).await?;
        Ok(envelope.user)
    }

    async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let req = self.request(reqwest::Method::POST, &["logout"], Some(token))?;
        send_empty(req).await
    }

    async fn user(&self, token: Option<&str>, user_id: &str) -> Result<UserView, ClientError> {
        let req = self.request(reqwest::Method::GET, &["users", user_id], token)?;
        let envelope: UserEnvelope = send_json(req).await?;
        Ok(envelope.user)
    }

    async fn users(
        &self,
        token: Option<&str>,
        query: &UsersQuery,
    ) -> Result<Vec<UserSummary>, ClientError> {
        let req = self.request(reqwest::Method::GET, &["users"], token)?;
        let envelope: UsersEnvelope = send_json(req.query(query)).await?;
        Ok(envelope.users)
    }

    async fn update_avatar(
        &self,
        token: &str,
        avatar: UploadFile,
    ) -> Result<UserView, ClientError> {
        let form = Form::new().part("avatar", file_part(avatar)?);
        let req = self.request(reqwest::Method::PUT, &["users", "me", "avatar"], Some(token))?;
        let envelope: UserEnvelope = send_json(req.multipart(form)).await?;
        Ok(envelope.user)
    }

    async fn feed(
        &self,
        token: Option<&str>,
        query: &FeedQuery,
    ) -> Result<Vec<PostView>, ClientError> {
        let req = self.request(reqwest::Method::GET, &["posts"], token)?;
        let envelope: PostsEnvelope = send_json(req.query(query)).await?;
        Ok(envelope.posts)
    }

    async fn post(&self, token: Option<&str>, post_id: &str) -> Result<PostView, ClientError> {
        let req = self.request(reqwest::Method::GET, &["posts", post_id], token)?;
        let envelope: PostEnvelope = send_json(req).await?;
        Ok(envelope.post)
    }

    async fn create_post(
        &self,
        token: &str,
        image: UploadFile,
        text: &str,
    ) -> Result<PostView, ClientError> {
        let form = Form::new()
            .part("image", file_part(image)?)
            .text("text", text.to_string());
        let req = self.request(reqwest::Method::POST, &["posts"], Some(token))?;
        let envelope: PostEnvelope = send_json(req.multipart(form)).await?;
        Ok(envelope.post)
    }

    async fn delete_post(&self, token: &str, post_id: &str) -> Result<(), ClientError> {
        let req = self.request(reqwest::Method::DELETE, &["posts", post_id], Some(token))?;
        send_empty(req).await
    }

    async fn like_post(&self, token: &str, post_id: &str) -> Result<PostView, ClientError> {
        let req = self.request(reqwest::Method::POST, &["posts", post_id, "like"], Some(token))?;
        let envelope: PostEnvelope = send_json(req).await?;
        Ok(envelope.post)
    }

    async fn remove_like(&self, token: &str, post_id: &str) -> Result<PostView, ClientError> {
        let req = self.request(reqwest::Method::DELETE, &["posts", post_id, "like"], Some(token))?;
        let envelope: PostEnvelope = send_json(req).await?;
        Ok(envelope.post)
    }

    async fn comments(
        &self,
        token: Option<&str>,
        post_id: &str,
        page: &PageQuery,
    ) -> Result<Vec<CommentView>, ClientError> {
        let req = self.request(reqwest::Method::GET, &["posts", post_id, "comments"], token)?;
        let envelope: CommentsEnvelope = send_json(req.query(page)).await?;
        Ok(envelope.comments)
    }

    async fn add_comment(
        &self,
        token: &str,
        post_id: &str,
        text: &str,
    ) -> Result<CommentView, ClientError> {
        let req = self.request(
            reqwest::Method::POST,
            &["posts", post_id, "comments"],
            Some(token),
        )?;
        let body = NewComment {
            text: text.to_string(),
        };
        let envelope: CommentEnvelope = send_json(req.json(&body)).await?;
        Ok(envelope.comment)
    }
}
