use std::sync::Arc;

use tokio::sync::watch;

use crate::client::auth::{self, AuthAction, AuthState};
use crate::client::posts::{self, PostsAction, PostsState};
use crate::client::ui::{self, UiAction, UiState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    pub auth: AuthState,
    pub posts: PostsState,
    pub ui: UiState,
}

#[derive(Debug, Clone)]
pub enum Action {
    Auth(AuthAction),
    Posts(PostsAction),
    Ui(UiAction),
}

impl From<AuthAction> for Action {
    fn from(action: AuthAction) -> Self {
        Action::Auth(action)
    }
}

impl From<PostsAction> for Action {
    fn from(action: PostsAction) -> Self {
        Action::Posts(action)
    }
}

impl From<UiAction> for Action {
    fn from(action: UiAction) -> Self {
        Action::Ui(action)
    }
}

impl RootState {
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::Auth(action) => auth::reduce(&mut self.auth, action),
            Action::Posts(action) => posts::reduce(&mut self.posts, action),
            Action::Ui(action) => ui::reduce(&mut self.ui, action),
        }
    }
}

/// Single owner of the client state. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct Store {
    tx: Arc<watch::Sender<RootState>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(RootState::default())
    }

    pub fn with_state(state: RootState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    pub fn dispatch(&self, action: impl Into<Action>) {
        let action = action.into();
        tracing::trace!(?action, "dispatch");
        self.tx.send_modify(|state| state.reduce(action));
    }

    pub fn snapshot(&self) -> RootState {
        self.tx.borrow().clone()
    }

    /// Read part of the state without cloning all of it.
    pub fn select<R>(&self, f: impl FnOnce(&RootState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Receiver woken on every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<RootState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ui::Modal;

    #[test]
    fn dispatch_routes_to_slice() {
        let store = Store::new();
        store.dispatch(UiAction::OpenModal(Modal::CreatePost));
        assert_eq!(
            store.select(|s| s.ui.active_modal),
            Some(Modal::CreatePost)
        );
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = Store::new();
        let mut rx = store.subscribe();
        store.dispatch(UiAction::ViewComments("p1".into()));
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow().ui.post_viewing_comments.as_deref(),
            Some("p1")
        );
    }

    #[test]
    fn clones_share_state() {
        let store = Store::new();
        let other = store.clone();
        other.dispatch(UiAction::OpenModal(Modal::UpdateProfile));
        assert_eq!(store.snapshot().ui.active_modal, Some(Modal::UpdateProfile));
    }
}
