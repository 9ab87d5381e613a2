use crate::client::status::RequestStatus;
use crate::wire::{ErrorType, PostView};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostsState {
    /// Newest first, as served by the feed.
    pub posts: Vec<PostView>,
    pub feed: RequestStatus,
    pub has_more: bool,
}

impl PostsState {
    pub fn get(&self, post_id: &str) -> Option<&PostView> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    fn get_mut(&mut self, post_id: &str) -> Option<&mut PostView> {
        self.posts.iter_mut().find(|p| p.id == post_id)
    }
}

#[derive(Debug, Clone)]
pub enum PostsAction {
    FeedPending,
    FeedFulfilled {
        offset: u32,
        limit: u32,
        posts: Vec<PostView>,
    },
    FeedRejected(ErrorType),
    PostCreated(PostView),
    /// Server-acknowledged copy of a post, e.g. after a like.
    PostUpdated(PostView),
    PostDeleted(String),
    CommentAdded {
        post_id: String,
    },
    /// Viewer changed; per-viewer flags are no longer valid.
    Cleared,
}

pub fn reduce(state: &mut PostsState, action: PostsAction) {
    match action {
        PostsAction::FeedPending => state.feed = RequestStatus::Pending,
        PostsAction::FeedFulfilled {
            offset,
            limit,
            posts,
        } => {
            state.feed = RequestStatus::Succeeded;
            state.has_more = posts.len() as u32 >= limit;
            if offset == 0 {
                state.posts = posts;
            } else {
                for post in posts {
                    match state.get_mut(&post.id) {
                        Some(existing) => *existing = post,
                        None => state.posts.push(post),
                    }
                }
            }
        }
        PostsAction::FeedRejected(error_type) => state.feed = RequestStatus::Failed(error_type),
        PostsAction::PostCreated(post) => {
            state.posts.retain(|p| p.id != post.id);
            state.posts.insert(0, post);
        }
        PostsAction::PostUpdated(post) => {
            if let Some(existing) = state.get_mut(&post.id) {
                *existing = post;
            }
        }
        PostsAction::PostDeleted(post_id) => state.posts.retain(|p| p.id != post_id),
        PostsAction::CommentAdded { post_id } => {
            if let Some(post) = state.get_mut(&post_id) {
                post.num_comments += 1;
            }
        }
        PostsAction::Cleared => *state = PostsState::default(),
    }
}
