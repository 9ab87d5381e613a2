use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{parse_db_time, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, AppQuery, CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::uploads::{public_url, PostsImages, Uploaded};
use crate::wire::{
    clamp_limit, CommentEnvelope, CommentView, CommentsEnvelope, FeedQuery, NewComment,
    PageQuery, PostEnvelope, PostView, PostsEnvelope, UserSummary, COMMENT_MAX, POST_TEXT_MAX,
};

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/like", post(like_post).delete(remove_like))
        .route(
            "/posts/{id}/comments",
            get(list_comments).post(create_comment),
        )
}

// --- Handlers ---

async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppQuery(query): AppQuery<FeedQuery>,
) -> AppResult<Json<PostsEnvelope>> {
    let conn = state.db.get()?;
    let posts = query_feed(
        &conn,
        viewer.id(),
        query.creator_id.as_deref(),
        query.offset,
        clamp_limit(query.limit),
    )?;
    Ok(Json(PostsEnvelope { posts }))
}

async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostEnvelope>> {
    let conn = state.db.get()?;
    let post = query_post(&conn, &id, viewer.id())?.ok_or(AppError::NotFound)?;
    Ok(Json(PostEnvelope { post }))
}

/// POST /posts: multipart `image` file plus optional `text`
async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    upload: Uploaded<PostsImages>,
) -> AppResult<Response> {
    let text = upload.field("text").unwrap_or_default().trim().to_string();
    if text.chars().count() > POST_TEXT_MAX {
        state.uploads.remove(&upload.file.relative_path).await;
        return Err(AppError::BadRequest(format!(
            "Post text must be {} characters or less",
            POST_TEXT_MAX
        )));
    }

    let post_id = uuid::Uuid::now_v7().to_string();
    let inserted = insert_post(
        &state,
        &post_id,
        current.id(),
        &upload.file.relative_path,
        &text,
    );
    let post = match inserted {
        Ok(post) => post,
        Err(e) => {
            state.uploads.remove(&upload.file.relative_path).await;
            return Err(e);
        }
    };

    tracing::info!(post_id = %post_id, user_id = %current.id(), "Created post");

    Ok((StatusCode::CREATED, Json(PostEnvelope { post })).into_response())
}

fn insert_post(
    state: &AppState,
    post_id: &str,
    user_id: &str,
    image_path: &str,
    text: &str,
) -> AppResult<PostView> {
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO posts (id, user_id, image_path, body) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, user_id, image_path, text],
    )?;
    query_post(&conn, post_id, Some(user_id))?
        .ok_or_else(|| AppError::Internal("created post vanished".into()))
}

async fn delete_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let post = {
        let conn = state.db.get()?;
        let post = find_post(&conn, &id)?.ok_or(AppError::NotFound)?;
        if post.user_id != current.id() {
            return Err(AppError::Forbidden);
        }
        conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        post
    };

    state.uploads.remove(&post.image_path).await;
    tracing::info!(post_id = %id, user_id = %current.id(), "Deleted post");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /posts/{id}/like: idempotent
async fn like_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostEnvelope>> {
    let conn = state.db.get()?;
    if !post_exists(&conn, &id)? {
        return Err(AppError::NotFound);
    }

    conn.execute(
        "INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?1, ?2)",
        params![id, current.id()],
    )?;

    let post = query_post(&conn, &id, Some(current.id()))?.ok_or(AppError::NotFound)?;
    Ok(Json(PostEnvelope { post }))
}

/// DELETE /posts/{id}/like: idempotent
async fn remove_like(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostEnvelope>> {
    let conn = state.db.get()?;
    if !post_exists(&conn, &id)? {
        return Err(AppError::NotFound);
    }

    conn.execute(
        "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
        params![id, current.id()],
    )?;

    let post = query_post(&conn, &id, Some(current.id()))?.ok_or(AppError::NotFound)?;
    Ok(Json(PostEnvelope { post }))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    AppQuery(page): AppQuery<PageQuery>,
) -> AppResult<Json<CommentsEnvelope>> {
    let conn = state.db.get()?;
    if !post_exists(&conn, &post_id)? {
        return Err(AppError::NotFound);
    }
    let comments = query_comments(&conn, &post_id, page.offset, clamp_limit(page.limit))?;
    Ok(Json(CommentsEnvelope { comments }))
}

async fn create_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(post_id): Path<String>,
    AppJson(form): AppJson<NewComment>,
) -> AppResult<Response> {
    let text = form.text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if text.chars().count() > COMMENT_MAX {
        return Err(AppError::BadRequest(format!(
            "Comment must be {} characters or less",
            COMMENT_MAX
        )));
    }

    let comment_id = uuid::Uuid::now_v7().to_string();
    let comment = {
        let conn = state.db.get()?;
        if !post_exists(&conn, &post_id)? {
            return Err(AppError::NotFound);
        }
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, body) VALUES (?1, ?2, ?3, ?4)",
            params![comment_id, post_id, current.id(), text],
        )?;
        find_comment(&conn, &comment_id)?
            .ok_or_else(|| AppError::Internal("created comment vanished".into()))?
    };

    Ok((StatusCode::CREATED, Json(CommentEnvelope { comment })).into_response())
}

// --- Query helpers ---

const POST_VIEW_SELECT: &str = "
    SELECT p.id, p.user_id, p.image_path, p.body, p.created_at,
           u.username, u.avatar_path,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS num_likes,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS num_comments,
           EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1) AS liked
    FROM posts p
    JOIN users u ON u.id = p.user_id";

fn post_view_from_row(row: &rusqlite::Row<'_>, viewer: &str) -> rusqlite::Result<PostView> {
    let creator_id: String = row.get(1)?;
    let image_path: String = row.get(2)?;
    let created_at: String = row.get(4)?;
    let avatar_path: Option<String> = row.get(6)?;

    Ok(PostView {
        id: row.get(0)?,
        is_created_by_current_user: creator_id == viewer,
        creator: UserSummary {
            id: creator_id.clone(),
            username: row.get(5)?,
            avatar_url: avatar_path.as_deref().map(public_url),
        },
        creator_id,
        image_url: public_url(&image_path),
        text: row.get(3)?,
        num_likes: row.get(7)?,
        num_comments: row.get(8)?,
        liked_by_current_user: row.get(9)?,
        created_at: parse_db_time(&created_at),
    })
}

pub(crate) fn post_exists(conn: &Connection, id: &str) -> AppResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn find_post(conn: &Connection, id: &str) -> AppResult<Option<Post>> {
    let post = conn
        .query_row(
            "SELECT id, user_id, image_path, body, created_at FROM posts WHERE id = ?1",
            params![id],
            |row| {
                Ok(Post {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    image_path: row.get(2)?,
                    body: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(post)
}

pub(crate) fn query_post(
    conn: &Connection,
    id: &str,
    viewer: Option<&str>,
) -> AppResult<Option<PostView>> {
    let viewer = viewer.unwrap_or("");
    let post = conn
        .query_row(
            &format!("{POST_VIEW_SELECT} WHERE p.id = ?2"),
            params![viewer, id],
            |row| post_view_from_row(row, viewer),
        )
        .optional()?;
    Ok(post)
}

fn query_feed(
    conn: &Connection,
    viewer: Option<&str>,
    creator_id: Option<&str>,
    offset: u32,
    limit: u32,
) -> AppResult<Vec<PostView>> {
    let viewer = viewer.unwrap_or("");
    let mut stmt = conn.prepare(&format!(
        "{POST_VIEW_SELECT}
         WHERE (?2 IS NULL OR p.user_id = ?2)
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?3 OFFSET ?4"
    ))?;

    let posts = stmt
        .query_map(params![viewer, creator_id, limit, offset], |row| {
            post_view_from_row(row, viewer)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

const COMMENT_VIEW_SELECT: &str = "
    SELECT c.id, c.post_id, c.body, c.created_at, u.id, u.username, u.avatar_path
    FROM comments c
    JOIN users u ON u.id = c.user_id";

fn comment_view_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentView> {
    let created_at: String = row.get(3)?;
    let avatar_path: Option<String> = row.get(6)?;
    Ok(CommentView {
        id: row.get(0)?,
        post_id: row.get(1)?,
        text: row.get(2)?,
        created_at: parse_db_time(&created_at),
        creator: UserSummary {
            id: row.get(4)?,
            username: row.get(5)?,
            avatar_url: avatar_path.as_deref().map(public_url),
        },
    })
}

fn find_comment(conn: &Connection, id: &str) -> AppResult<Option<CommentView>> {
    let comment = conn
        .query_row(
            &format!("{COMMENT_VIEW_SELECT} WHERE c.id = ?1"),
            params![id],
            comment_view_from_row,
        )
        .optional()?;
    Ok(comment)
}

fn query_comments(
    conn: &Connection,
    post_id: &str,
    offset: u32,
    limit: u32,
) -> AppResult<Vec<CommentView>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_VIEW_SELECT}
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC
         LIMIT ?2 OFFSET ?3"
    ))?;

    let comments = stmt
        .query_map(params![post_id, limit, offset], comment_view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}
