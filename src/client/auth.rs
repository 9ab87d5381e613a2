use crate::client::status::RequestStatus;
use crate::wire::{ErrorType, UserView};

/// Where the app stands on "who is using it".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Nothing attempted yet.
    #[default]
    Idle,
    Loading,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub current_user: Option<UserView>,
    pub login: RequestStatus,
    pub register: RequestStatus,
    pub fetch_current_user: RequestStatus,
    phase: SessionPhase,
}

impl AuthState {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_loading_current_user(&self) -> bool {
        self.fetch_current_user.is_pending()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    fn settle_phase(&mut self) {
        self.phase = if self.current_user.is_some() {
            SessionPhase::Authenticated
        } else {
            SessionPhase::Unauthenticated
        };
    }
}

#[derive(Debug, Clone)]
pub enum AuthAction {
    LoginPending,
    LoginFulfilled(UserView),
    LoginRejected(ErrorType),
    RegisterPending,
    RegisterFulfilled(UserView),
    RegisterRejected(ErrorType),
    FetchCurrentUserPending,
    FetchCurrentUserFulfilled(UserView),
    FetchCurrentUserRejected(ErrorType),
    /// No token stored, so there is nobody to fetch.
    NoStoredSession,
    UserUpdated(UserView),
    LoggedOut,
}

pub fn reduce(state: &mut AuthState, action: AuthAction) {
    match action {
        AuthAction::LoginPending => state.login = RequestStatus::Pending,
        AuthAction::LoginFulfilled(user) => {
            state.login = RequestStatus::Succeeded;
            state.current_user = Some(user);
            state.settle_phase();
        }
        AuthAction::LoginRejected(error_type) => {
            state.login = RequestStatus::Failed(error_type);
            state.settle_phase();
        }
        AuthAction::RegisterPending => state.register = RequestStatus::Pending,
        AuthAction::RegisterFulfilled(user) => {
            state.register = RequestStatus::Succeeded;
            state.current_user = Some(user);
            state.settle_phase();
        }
        AuthAction::RegisterRejected(error_type) => {
            state.register = RequestStatus::Failed(error_type);
            state.settle_phase();
        }
        AuthAction::FetchCurrentUserPending => {
            state.fetch_current_user = RequestStatus::Pending;
            state.current_user = None;
            state.phase = SessionPhase::Loading;
        }
        AuthAction::FetchCurrentUserFulfilled(user) => {
            state.fetch_current_user = RequestStatus::Succeeded;
            state.current_user = Some(user);
            state.settle_phase();
        }
        AuthAction::FetchCurrentUserRejected(error_type) => {
            state.fetch_current_user = RequestStatus::Failed(error_type);
            state.current_user = None;
            state.settle_phase();
        }
        AuthAction::NoStoredSession => {
            state.fetch_current_user = RequestStatus::Idle;
            state.current_user = None;
            state.settle_phase();
        }
        AuthAction::UserUpdated(user) => {
            state.current_user = Some(user);
            state.settle_phase();
        }
        AuthAction::LoggedOut => {
            *state = AuthState::default();
            state.phase = SessionPhase::Unauthenticated;
        }
    }
}
