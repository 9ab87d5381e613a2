use std::net::SocketAddr;

use tempfile::TempDir;
use url::Url;

use snapfeed::client::{
    Client, ClientError, HttpApi, InFlight, LikersPager, MemoryTokenStore, SessionPhase,
    TokenStore, UploadFile,
};
use snapfeed::config::Config;
use snapfeed::state::AppState;
use snapfeed::wire::{Credentials, ErrorType};
use snapfeed::{db, routes};

/// Spawn a server on an ephemeral port and return its base URL.
async fn spawn_server() -> (TempDir, Url) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config.resolve_paths(dir.path());

    let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    let app = routes::build_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, Url::parse(&format!("http://{}/", addr)).unwrap())
}

fn client(base: &Url) -> Client<HttpApi, MemoryTokenStore> {
    Client::new(HttpApi::new(base.clone()), MemoryTokenStore::new())
}

#[tokio::test]
async fn test_register_login_and_upload_avatar() {
    let (_dir, base) = spawn_server().await;

    let alice = client(&base);
    let registered = alice
        .register(Credentials::new("alice", "secret"))
        .await
        .unwrap();
    assert_eq!(registered.username, "alice");

    let fresh = client(&base);
    let user = fresh
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap();
    assert_eq!(user.id, registered.id);
    assert!(!fresh.tokens().load().unwrap().unwrap().is_empty());

    let updated = fresh
        .update_avatar(UploadFile::new("photo.png", "image/png", &b"\x89PNG data"[..]))
        .await
        .unwrap();
    let avatar_url = updated.avatar_url.expect("avatar url set");
    let stored_name = avatar_url.rsplit('/').next().unwrap();
    assert_ne!(stored_name, "photo.png");

    let bytes = reqwest::get(base.join(avatar_url.trim_start_matches('/')).unwrap())
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), b"\x89PNG data");
}

#[tokio::test]
async fn test_error_bodies_decode_into_error_types() {
    let (_dir, base) = spawn_server().await;

    let first = client(&base);
    first
        .register(Credentials::new("alice", "secret"))
        .await
        .unwrap();

    let second = client(&base);
    let err = second
        .register(Credentials::new("alice", "secret"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Api {
            status: 409,
            error_type: ErrorType::UsernameTaken,
            ..
        }
    ));

    let err = second
        .login(Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.error_type(), ErrorType::InvalidCredentials);
}

#[tokio::test]
async fn test_stale_token_is_discarded_on_bootstrap() {
    let (_dir, base) = spawn_server().await;

    let client = Client::new(
        HttpApi::new(base.clone()),
        MemoryTokenStore::with_token("not-a-real-token"),
    );
    assert_eq!(client.bootstrap().await, SessionPhase::Unauthenticated);
    assert_eq!(client.tokens().load().unwrap(), None);
}

#[tokio::test]
async fn test_post_like_and_likers_round_trip() {
    let (_dir, base) = spawn_server().await;

    let alice = client(&base);
    alice
        .register(Credentials::new("alice", "secret"))
        .await
        .unwrap();
    let post = alice
        .create_post(UploadFile::new("sunset.png", "image/png", &b"img"[..]), "evening")
        .await
        .unwrap();

    let bob = client(&base);
    bob.register(Credentials::new("bob", "secret")).await.unwrap();
    bob.fetch_feed(0, 10).await.unwrap();

    let control = InFlight::new();
    let liked = bob.like_post(&control, &post.id).await.unwrap();
    assert!(liked.liked_by_current_user);
    assert_eq!(liked.num_likes, 1);

    let pager = tokio::sync::Mutex::new(LikersPager::new(post.id.clone()));
    assert!(alice.load_likers(&pager).await.unwrap());
    let names: Vec<String> = pager
        .lock()
        .await
        .users()
        .iter()
        .map(|u| u.username.clone())
        .collect();
    assert_eq!(names, vec!["bob"]);

    let unliked = bob.remove_like(&control, &post.id).await.unwrap();
    assert!(!unliked.liked_by_current_user);
    let state = bob.store().snapshot();
    assert!(!state.posts.get(&post.id).unwrap().liked_by_current_user);

    let err = bob.delete_post(&control, &post.id).await.unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Forbidden);
    alice.delete_post(&InFlight::new(), &post.id).await.unwrap();
}
