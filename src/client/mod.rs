//! Client-side state for the snapfeed API.
//!
//! [`Client`] wires an API port, a token store and a [`Store`] together.
//! Every operation is an async fn that records its progress in the store as
//! it goes; callers that want fire-and-forget behavior spawn the future.

pub mod api;
pub mod auth;
pub mod error;
pub mod http;
pub mod in_flight;
pub mod likers;
pub mod persistence;
pub mod posts;
pub mod status;
pub mod store;
pub mod ui;

use tokio::sync::Mutex;

pub use api::{SocialApi, UploadFile};
pub use auth::{AuthAction, AuthState, SessionPhase};
pub use error::ClientError;
pub use http::HttpApi;
pub use in_flight::{InFlight, InFlightGuard};
pub use likers::{LikersPager, PageTicket};
pub use persistence::{FileTokenStore, MemoryTokenStore, TokenStore, AUTH_TOKEN_KEY};
pub use posts::{PostsAction, PostsState};
pub use status::RequestStatus;
pub use store::{Action, RootState, Store};
pub use ui::{Modal, UiAction, UiState};

use crate::wire::{
    clamp_limit, CommentView, Credentials, ErrorType, FeedQuery, PageQuery, PostView, UserView,
    COMMENT_MAX, POST_TEXT_MAX,
};

#[derive(Debug, Clone, Copy)]
enum Entry {
    Login,
    Register,
}

pub struct Client<A, T> {
    api: A,
    tokens: T,
    store: Store,
}

impl<A: SocialApi, T: TokenStore> Client<A, T> {
    pub fn new(api: A, tokens: T) -> Self {
        Self::with_store(api, tokens, Store::new())
    }

    pub fn with_store(api: A, tokens: T, store: Store) -> Self {
        Self { api, tokens, store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    fn stored_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.tokens.load()?)
    }

    fn require_token(&self) -> Result<String, ClientError> {
        self.stored_token()?.ok_or(ClientError::NotAuthenticated)
    }

    // --- Auth ---

    pub async fn login(&self, credentials: Credentials) -> Result<UserView, ClientError> {
        self.authenticate(Entry::Login, credentials).await
    }

    pub async fn register(&self, credentials: Credentials) -> Result<UserView, ClientError> {
        self.authenticate(Entry::Register, credentials).await
    }

    async fn authenticate(
        &self,
        entry: Entry,
        credentials: Credentials,
    ) -> Result<UserView, ClientError> {
        credentials.validate()?;

        let (pending, fulfilled, rejected): (
            AuthAction,
            fn(UserView) -> AuthAction,
            fn(ErrorType) -> AuthAction,
        ) = match entry {
            Entry::Login => (
                AuthAction::LoginPending,
                AuthAction::LoginFulfilled,
                AuthAction::LoginRejected,
            ),
            Entry::Register => (
                AuthAction::RegisterPending,
                AuthAction::RegisterFulfilled,
                AuthAction::RegisterRejected,
            ),
        };

        self.store.dispatch(pending);

        let result = match entry {
            Entry::Login => self.api.login(&credentials).await,
            Entry::Register => self.api.register(&credentials).await,
        };
        let response = result.and_then(|response| {
            self.tokens.save(&response.token)?;
            Ok(response)
        });

        match response {
            Ok(response) => {
                tracing::info!(username = %response.user.username, ?entry, "Signed in");
                self.store.dispatch(PostsAction::Cleared);
                self.store.dispatch(fulfilled(response.user.clone()));
                Ok(response.user)
            }
            Err(e) => {
                tracing::warn!(error = %e, ?entry, "Sign-in failed");
                self.store.dispatch(rejected(e.error_type()));
                Err(e)
            }
        }
    }

    /// Resolve the stored token to a user. `Ok(None)` means no token was
    /// stored and nothing was sent.
    pub async fn fetch_current_user(&self) -> Result<Option<UserView>, ClientError> {
        let token = match self.stored_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.store.dispatch(AuthAction::NoStoredSession);
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read stored token");
                self.store
                    .dispatch(AuthAction::FetchCurrentUserRejected(e.error_type()));
                return Err(e);
            }
        };

        self.store.dispatch(AuthAction::FetchCurrentUserPending);

        match self.api.current_user(&token).await {
            Ok(user) => {
                self.store
                    .dispatch(AuthAction::FetchCurrentUserFulfilled(user.clone()));
                Ok(Some(user))
            }
            Err(e) => {
                if e.is_rejection() {
                    tracing::info!(error = %e, "Stored token rejected, discarding it");
                    if let Err(clear_err) = self.tokens.clear() {
                        tracing::warn!(error = %clear_err, "Could not clear stored token");
                    }
                } else {
                    tracing::warn!(error = %e, "Could not reach server to restore session");
                }
                self.store
                    .dispatch(AuthAction::FetchCurrentUserRejected(e.error_type()));
                Err(e)
            }
        }
    }

    /// App-start hook: restore the session if a token survived the last run.
    pub async fn bootstrap(&self) -> SessionPhase {
        if let Err(e) = self.fetch_current_user().await {
            tracing::debug!(error = %e, "Session not restored");
        }
        self.store.select(|s| s.auth.phase())
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let token = self.stored_token();

        if let Ok(Some(token)) = &token {
            if let Err(e) = self.api.logout(token).await {
                tracing::warn!(error = %e, "Server logout failed, dropping token locally");
            }
        }

        let cleared = self.tokens.clear();

        self.store.dispatch(AuthAction::LoggedOut);
        self.store.dispatch(PostsAction::Cleared);
        self.store.dispatch(UiAction::CloseModal);

        token?;
        cleared?;
        Ok(())
    }

    pub async fn update_avatar(&self, avatar: UploadFile) -> Result<UserView, ClientError> {
        let token = self.require_token()?;
        match self.api.update_avatar(&token, avatar).await {
            Ok(user) => {
                self.store.dispatch(AuthAction::UserUpdated(user.clone()));
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Avatar upload failed");
                Err(e)
            }
        }
    }

    pub async fn fetch_user(&self, user_id: &str) -> Result<UserView, ClientError> {
        let token = self.stored_token()?;
        self.api.user(token.as_deref(), user_id).await
    }

    // --- Posts ---

    /// Load one feed page. Offset 0 replaces the stored feed.
    pub async fn fetch_feed(&self, offset: u32, limit: u32) -> Result<usize, ClientError> {
        let token = self.stored_token()?;
        let limit = clamp_limit(limit);
        let query = FeedQuery {
            offset,
            limit,
            creator_id: None,
        };

        self.store.dispatch(PostsAction::FeedPending);

        match self.api.feed(token.as_deref(), &query).await {
            Ok(posts) => {
                let count = posts.len();
                self.store.dispatch(PostsAction::FeedFulfilled {
                    offset,
                    limit,
                    posts,
                });
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, offset, "Feed request failed");
                self.store.dispatch(PostsAction::FeedRejected(e.error_type()));
                Err(e)
            }
        }
    }

    pub async fn create_post(
        &self,
        image: UploadFile,
        text: &str,
    ) -> Result<PostView, ClientError> {
        if text.chars().count() > POST_TEXT_MAX {
            return Err(ClientError::Validation(format!(
                "post text may be at most {} characters",
                POST_TEXT_MAX
            )));
        }
        let token = self.require_token()?;

        match self.api.create_post(&token, image, text).await {
            Ok(post) => {
                self.store.dispatch(PostsAction::PostCreated(post.clone()));
                Ok(post)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Create post failed");
                Err(e)
            }
        }
    }

    /// Like a post. Sends nothing and returns `Busy` while `control` is held.
    pub async fn like_post(
        &self,
        control: &InFlight,
        post_id: &str,
    ) -> Result<PostView, ClientError> {
        self.set_liked(control, post_id, true).await
    }

    /// Remove the viewer's like. Sends nothing and returns `Busy` while
    /// `control` is held.
    pub async fn remove_like(
        &self,
        control: &InFlight,
        post_id: &str,
    ) -> Result<PostView, ClientError> {
        self.set_liked(control, post_id, false).await
    }

    async fn set_liked(
        &self,
        control: &InFlight,
        post_id: &str,
        liked: bool,
    ) -> Result<PostView, ClientError> {
        let _guard = control.try_begin().ok_or(ClientError::Busy)?;
        let token = self.require_token()?;

        let result = if liked {
            self.api.like_post(&token, post_id).await
        } else {
            self.api.remove_like(&token, post_id).await
        };

        match result {
            Ok(post) => {
                self.store.dispatch(PostsAction::PostUpdated(post.clone()));
                Ok(post)
            }
            Err(e) => {
                tracing::warn!(error = %e, post_id, liked, "Like update failed");
                Err(e)
            }
        }
    }

    /// Refresh one post from the server, replacing the stored copy.
    pub async fn fetch_post(&self, post_id: &str) -> Result<PostView, ClientError> {
        let token = self.stored_token()?;
        match self.api.post(token.as_deref(), post_id).await {
            Ok(post) => {
                self.store.dispatch(PostsAction::PostUpdated(post.clone()));
                Ok(post)
            }
            Err(e) => {
                tracing::warn!(error = %e, post_id, "Fetch post failed");
                Err(e)
            }
        }
    }

    /// Delete a post. Sends nothing and returns `Busy` while `control` is held.
    pub async fn delete_post(&self, control: &InFlight, post_id: &str) -> Result<(), ClientError> {
        let _guard = control.try_begin().ok_or(ClientError::Busy)?;
        let token = self.require_token()?;

        if let Err(e) = self.api.delete_post(&token, post_id).await {
            tracing::warn!(error = %e, post_id, "Delete post failed");
            return Err(e);
        }

        self.store.dispatch(PostsAction::PostDeleted(post_id.to_string()));
        if self.store.select(|s| s.ui.post_viewing_comments.as_deref() == Some(post_id)) {
            self.store.dispatch(UiAction::CloseModal);
        }
        Ok(())
    }

    // --- Comments ---

    pub async fn add_comment(&self, post_id: &str, text: &str) -> Result<CommentView, ClientError> {
        let text = text.trim();
        let len = text.chars().count();
        if len == 0 || len > COMMENT_MAX {
            return Err(ClientError::Validation(format!(
                "comment must be 1 to {} characters",
                COMMENT_MAX
            )));
        }
        let token = self.require_token()?;

        match self.api.add_comment(&token, post_id, text).await {
            Ok(comment) => {
                self.store.dispatch(PostsAction::CommentAdded {
                    post_id: post_id.to_string(),
                });
                Ok(comment)
            }
            Err(e) => {
                tracing::warn!(error = %e, post_id, "Add comment failed");
                Err(e)
            }
        }
    }

    pub async fn fetch_comments(
        &self,
        post_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<CommentView>, ClientError> {
        let token = self.stored_token()?;
        let page = PageQuery {
            offset,
            limit: clamp_limit(limit),
        };
        match self.api.comments(token.as_deref(), post_id, &page).await {
            Ok(comments) => Ok(comments),
            Err(e) => {
                tracing::warn!(error = %e, post_id, "Fetch comments failed");
                Err(e)
            }
        }
    }

    // --- Likers ---

    /// Fetch the next likers page into `pager`. Returns whether the response
    /// was applied; a stale one is dropped and reported as `Ok(false)`.
    pub async fn load_likers(&self, pager: &Mutex<LikersPager>) -> Result<bool, ClientError> {
        let token = self.stored_token()?;

        let (ticket, query) = {
            let mut pager = pager.lock().await;
            let ticket = pager.begin();
            let query = pager.query(&ticket);
            (ticket, query)
        };

        match self.api.users(token.as_deref(), &query).await {
            Ok(users) => Ok(pager.lock().await.apply(ticket, Ok(users))),
            Err(e) => {
                tracing::warn!(error = %e, "Likers request failed");
                pager.lock().await.apply(ticket, Err(e.error_type()));
                Err(e)
            }
        }
    }
}
