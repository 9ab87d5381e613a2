//! On-disk storage for uploaded images.
//!
//! Files are grouped into one directory per [`UploadCategory`] under the
//! configured uploads root. Stored names are `<uuid-v7>-<original name>`,
//! so two uploads never share a path even when the client sends the same
//! original filename at the same instant.

mod extract;

pub use extract::{Avatars, Category, PostsImages, Uploaded};

use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    Avatars,
    PostsImages,
}

impl UploadCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Avatars => "avatars",
            Self::PostsImages => "posts-images",
        }
    }

    /// Multipart field carrying the file for this category.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Avatars => "avatar",
            Self::PostsImages => "image",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file exceeds maximum upload size of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("file type {0} is not allowed")]
    UnsupportedType(String),

    #[error("{0} field is required")]
    MissingFile(&'static str),

    #[error("invalid multipart data: {0}")]
    Multipart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            UploadError::UnsupportedType(_) => AppError::UnsupportedMediaType(err.to_string()),
            UploadError::MissingFile(_) | UploadError::Multipart(_) => {
                AppError::BadRequest(err.to_string())
            }
            UploadError::Io(e) => AppError::Storage(e),
        }
    }
}

/// Descriptor handed to route handlers once a file is on disk.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub category: UploadCategory,
    pub filename: String,
    /// Absolute location on disk.
    pub path: PathBuf,
    /// `<category>/<filename>`, the form persisted in the database.
    pub relative_path: String,
    pub content_type: String,
    pub size: u64,
}

impl StoredUpload {
    pub fn url(&self) -> String {
        public_url(&self.relative_path)
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: usize,
    allowed_types: Vec<String>,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize, allowed_types: Vec<String>) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            allowed_types,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.uploads_path(),
            config.storage.max_upload_bytes,
            config.storage.allowed_types.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn category_dir(&self, category: UploadCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Create the category directory if it does not exist yet. Safe to race.
    pub async fn ensure_dir(&self, category: UploadCategory) -> std::io::Result<PathBuf> {
        let dir = self.category_dir(category);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Match the media type against the allow-list, ignoring parameters
    /// such as `; charset=binary`.
    pub fn check_type(&self, content_type: &str) -> Result<(), UploadError> {
        if self.allowed_types.is_empty() {
            return Ok(());
        }
        let Ok(mime) = content_type.parse::<mime_guess::mime::Mime>() else {
            return Err(UploadError::UnsupportedType(content_type.to_string()));
        };
        let essence = mime.essence_str();
        if self
            .allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
        {
            Ok(())
        } else {
            Err(UploadError::UnsupportedType(content_type.to_string()))
        }
    }

    pub async fn store(
        &self,
        category: UploadCategory,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        if data.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                limit: self.max_bytes,
            });
        }
        self.check_type(content_type)?;

        let dir = self.ensure_dir(category).await?;
        let filename = stored_filename(original_name);
        let path = dir.join(&filename);

        // create_new: never clobber an existing file
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;

        tracing::debug!(
            category = category.dir_name(),
            filename = %filename,
            size = data.len(),
            "Stored upload"
        );

        Ok(StoredUpload {
            category,
            relative_path: format!("{}/{}", category.dir_name(), filename),
            filename,
            path,
            content_type: content_type.to_string(),
            size: data.len() as u64,
        })
    }

    /// Map a `<category>/<filename>` path back onto disk, refusing anything
    /// that would escape the uploads root.
    pub fn resolve(&self, relative_path: &str) -> Option<PathBuf> {
        let rel = Path::new(relative_path);
        if rel
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            Some(self.root.join(rel))
        } else {
            None
        }
    }

    /// Best-effort delete; a missing file is not an error.
    pub async fn remove(&self, relative_path: &str) {
        let Some(path) = self.resolve(relative_path) else {
            tracing::warn!("Refusing to remove upload outside root: {}", relative_path);
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

/// URL under which a stored file is served.
pub fn public_url(relative_path: &str) -> String {
    format!("/uploads/{}", relative_path)
}

pub fn stored_filename(original_name: &str) -> String {
    format!("{}-{}", uuid::Uuid::now_v7(), sanitize_filename(original_name))
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]`.
pub fn sanitize_filename(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> UploadStore {
        UploadStore::new(root, 1024, vec!["image/png".to_string()])
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\photo.png"), "photo.png");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
    }

    #[test]
    fn sanitize_handles_empty_and_dotfiles() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
        assert_eq!(sanitize_filename(".htaccess"), "htaccess");
    }

    #[test]
    fn stored_filename_keeps_original_as_suffix() {
        let name = stored_filename("photo.png");
        assert!(name.ends_with("-photo.png"));
        assert_ne!(name, "photo.png");
        let (prefix, _) = name.split_at(36);
        assert!(uuid::Uuid::parse_str(prefix).is_ok());
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = store(Path::new("/srv/uploads"));
        assert!(store.resolve("../secret").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert_eq!(
            store.resolve("avatars/a.png"),
            Some(PathBuf::from("/srv/uploads/avatars/a.png"))
        );
    }

    #[tokio::test]
    async fn store_creates_category_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let stored = store
            .store(UploadCategory::Avatars, "photo.png", "image/png", b"png")
            .await
            .unwrap();

        assert!(tmp.path().join("avatars").is_dir());
        assert!(stored.relative_path.starts_with("avatars/"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"png");
        assert_eq!(stored.url(), format!("/uploads/{}", stored.relative_path));
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        store.ensure_dir(UploadCategory::PostsImages).await.unwrap();
        store.ensure_dir(UploadCategory::PostsImages).await.unwrap();
        assert!(tmp.path().join("posts-images").is_dir());
    }

    #[tokio::test]
    async fn concurrent_same_name_uploads_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let (a, b) = tokio::join!(
            store.store(UploadCategory::PostsImages, "same.png", "image/png", b"first"),
            store.store(UploadCategory::PostsImages, "same.png", "image/png", b"second"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.path, b.path);
        assert_eq!(std::fs::read(&a.path).unwrap(), b"first");
        assert_eq!(std::fs::read(&b.path).unwrap(), b"second");
        let count = std::fs::read_dir(tmp.path().join("posts-images"))
            .unwrap()
            .count();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn store_rejects_oversized_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let err = store
            .store(UploadCategory::Avatars, "big.png", "image/png", &[0u8; 2048])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TooLarge { limit: 1024 }));
    }

    #[tokio::test]
    async fn store_rejects_disallowed_types() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let err = store
            .store(UploadCategory::Avatars, "x.exe", "application/x-msdownload", b"MZ")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
        assert!(!tmp.path().join("avatars").exists());
    }

    #[test]
    fn check_type_ignores_parameters() {
        let store = store(Path::new("/srv/uploads"));
        assert!(store.check_type("image/png; charset=binary").is_ok());
        assert!(store.check_type("IMAGE/PNG").is_ok());
        assert!(matches!(
            store.check_type("text/plain; charset=utf-8"),
            Err(UploadError::UnsupportedType(_))
        ));
        assert!(matches!(
            store.check_type("not a mime"),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn remove_missing_file_is_quiet() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        store.remove("avatars/nothing-here.png").await;

        let stored = store
            .store(UploadCategory::Avatars, "a.png", "image/png", b"x")
            .await
            .unwrap();
        store.remove(&stored.relative_path).await;
        assert!(!stored.path.exists());
    }

    #[test]
    fn upload_errors_map_to_app_errors() {
        use crate::wire::ErrorType;
        let err: AppError = UploadError::TooLarge { limit: 1 }.into();
        assert_eq!(err.error_type(), ErrorType::PayloadTooLarge);
        let err: AppError = UploadError::MissingFile("avatar").into();
        assert_eq!(err.error_type(), ErrorType::Validation);
        let err: AppError = UploadError::UnsupportedType("text/plain".into()).into();
        assert_eq!(err.error_type(), ErrorType::UnsupportedMediaType);
    }
}
