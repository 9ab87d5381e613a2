use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rusqlite::{params, ErrorCode};

use crate::auth::{password, session};
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::routes::users::{find_user_by_username, user_view};
use crate::state::AppState;
use crate::wire::{AuthResponse, Credentials, UserEnvelope};

fn validate(credentials: &Credentials) -> AppResult<()> {
    credentials
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// POST /register: create an account and open a session for it
pub async fn register(
    State(state): State<AppState>,
    AppJson(credentials): AppJson<Credentials>,
) -> AppResult<Response> {
    validate(&credentials)?;
    let Credentials { username, password } = credentials;

    {
        let conn = state.db.get()?;
        if find_user_by_username(&conn, &username)?.is_some() {
            return Err(AppError::UsernameTaken);
        }
    }

    let hash = password::hash_password(password, state.config.auth.bcrypt_cost).await?;
    let user_id = uuid::Uuid::now_v7().to_string();

    let conn = state.db.get()?;
    // The pre-check above can race with a concurrent registration
    conn.execute(
        "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3)",
        params![user_id, username, hash],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => AppError::UsernameTaken,
        _ => AppError::Database(e),
    })?;

    let token = session::create_session(&conn, &user_id, state.config.auth.session_hours)?;
    let user = find_user_by_username(&conn, &username)?
        .ok_or_else(|| AppError::Internal("registered user vanished".into()))?;
    let user = user_view(&conn, &user, Some(&user_id))?;

    tracing::info!(user_id = %user_id, username = %username, "Registered user");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })).into_response())
}

/// POST /login: exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    AppJson(credentials): AppJson<Credentials>,
) -> AppResult<Json<AuthResponse>> {
    validate(&credentials)?;

    let user = {
        let conn = state.db.get()?;
        find_user_by_username(&conn, &credentials.username)?
    }
    .ok_or(AppError::InvalidCredentials)?;

    if !password::verify_password(credentials.password, user.password_hash.clone()).await? {
        tracing::info!(username = %user.username, "Rejected login");
        return Err(AppError::InvalidCredentials);
    }

    let conn = state.db.get()?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
    let view = user_view(&conn, &user, Some(&user.id))?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { token, user: view }))
}

/// GET /current-user: resolve the bearer token to its user
pub async fn current_user(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<UserEnvelope>> {
    let conn = state.db.get()?;
    let user = user_view(&conn, &current.user, Some(current.id()))?;
    Ok(Json(UserEnvelope { user }))
}

/// POST /logout: revoke the presented token
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    session::delete_session(&conn, &current.token)?;
    tracing::info!(user_id = %current.id(), "User logged out");
    Ok(StatusCode::NO_CONTENT)
}
