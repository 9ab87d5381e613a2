use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppQuery, CurrentUser, MaybeUser};
use crate::routes::posts::post_exists;
use crate::state::AppState;
use crate::uploads::{Avatars, Uploaded};
use crate::wire::{clamp_limit, UserEnvelope, UserSummary, UserView, UsersEnvelope, UsersQuery};

const USER_COLUMNS: &str = "u.id, u.username, u.password_hash, u.avatar_path, u.created_at";

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me/avatar", put(update_avatar))
        .route("/users/{id}", get(get_user))
}

// --- Handlers ---

/// GET /users?postLikedId=&offset=&limit=&excludeCurrent=
///
/// With `postLikedId`, lists the users who liked that post in the order the
/// likes arrived; otherwise lists every user by username.
async fn list_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppQuery(query): AppQuery<UsersQuery>,
) -> AppResult<Json<UsersEnvelope>> {
    let conn = state.db.get()?;
    let limit = clamp_limit(query.limit);
    let exclude = if query.exclude_current {
        viewer.id().unwrap_or("")
    } else {
        ""
    };

    let users = match query.post_liked_id.as_deref() {
        Some(post_id) => {
            if !post_exists(&conn, post_id)? {
                return Err(AppError::NotFound);
            }
            query_likers(&conn, post_id, exclude, query.offset, limit)?
        }
        None => query_all_users(&conn, exclude, query.offset, limit)?,
    };

    Ok(Json(UsersEnvelope { users }))
}

async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<UserEnvelope>> {
    let conn = state.db.get()?;
    let user = find_user_by_id(&conn, &id)?.ok_or(AppError::NotFound)?;
    let user = user_view(&conn, &user, viewer.id())?;
    Ok(Json(UserEnvelope { user }))
}

/// PUT /users/me/avatar: multipart field `avatar`
async fn update_avatar(
    State(state): State<AppState>,
    current: CurrentUser,
    upload: Uploaded<Avatars>,
) -> AppResult<Json<UserEnvelope>> {
    let replaced = replace_avatar(&state, current.id(), &upload.file.relative_path);
    let (user, previous) = match replaced {
        Ok(replaced) => replaced,
        Err(e) => {
            state.uploads.remove(&upload.file.relative_path).await;
            return Err(e);
        }
    };

    if let Some(previous) = previous {
        state.uploads.remove(&previous).await;
    }

    tracing::info!(user_id = %current.id(), file = %upload.file.filename, "Updated avatar");

    Ok(Json(UserEnvelope { user }))
}

// --- Query helpers ---

/// Swap in a new avatar path and return the one it replaced, read and
/// written under one immediate transaction.
fn replace_avatar(
    state: &AppState,
    user_id: &str,
    avatar_path: &str,
) -> AppResult<(UserView, Option<String>)> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let previous: Option<String> = tx
        .query_row(
            "SELECT avatar_path FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;
    tx.execute(
        "UPDATE users SET avatar_path = ?1 WHERE id = ?2",
        params![avatar_path, user_id],
    )?;
    let user = find_user_by_id(&tx, user_id)?.ok_or(AppError::NotFound)?;
    let view = user_view(&tx, &user, Some(user_id))?;
    tx.commit()?;

    Ok((view, previous))
}

pub(crate) fn find_user_by_id(conn: &Connection, id: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            params![id],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn find_user_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1"),
            params![username],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn user_view(conn: &Connection, user: &User, viewer: Option<&str>) -> AppResult<UserView> {
    let num_posts: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
        params![user.id],
        |row| row.get(0),
    )?;
    Ok(user.view(num_posts, viewer))
}

fn query_likers(
    conn: &Connection,
    post_id: &str,
    exclude: &str,
    offset: u32,
    limit: u32,
) -> AppResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS}
         FROM likes l
         JOIN users u ON u.id = l.user_id
         WHERE l.post_id = ?1 AND u.id != ?2
         ORDER BY l.created_at ASC, l.rowid ASC
         LIMIT ?3 OFFSET ?4"
    ))?;

    let users = stmt
        .query_map(params![post_id, exclude, limit, offset], User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users.iter().map(User::summary).collect())
}

fn query_all_users(
    conn: &Connection,
    exclude: &str,
    offset: u32,
    limit: u32,
) -> AppResult<Vec<UserSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS}
         FROM users u
         WHERE u.id != ?1
         ORDER BY u.username ASC
         LIMIT ?2 OFFSET ?3"
    ))?;

    let users = stmt
        .query_map(params![exclude, limit, offset], User::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(users.iter().map(User::summary).collect())
}
