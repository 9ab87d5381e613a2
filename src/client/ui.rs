#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    Comments,
    CreatePost,
    UpdateProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub active_modal: Option<Modal>,
    pub post_viewing_comments: Option<String>,
}

#[derive(Debug, Clone)]
pub enum UiAction {
    OpenModal(Modal),
    /// Open the comments modal for one post.
    ViewComments(String),
    CloseModal,
}

pub fn reduce(state: &mut UiState, action: UiAction) {
    match action {
        UiAction::OpenModal(modal) => {
            state.active_modal = Some(modal);
            if modal != Modal::Comments {
                state.post_viewing_comments = None;
            }
        }
        UiAction::ViewComments(post_id) => {
            state.active_modal = Some(Modal::Comments);
            state.post_viewing_comments = Some(post_id);
        }
        UiAction::CloseModal => *state = UiState::default(),
    }
}
