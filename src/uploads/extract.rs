use std::collections::HashMap;
use std::marker::PhantomData;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;

use super::{StoredUpload, UploadCategory, UploadError};
use crate::error::AppError;
use crate::state::AppState;

/// Type-level selector for the upload category a route accepts.
pub trait Category {
    const CATEGORY: UploadCategory;
}

pub struct Avatars;

impl Category for Avatars {
    const CATEGORY: UploadCategory = UploadCategory::Avatars;
}

pub struct PostsImages;

impl Category for PostsImages {
    const CATEGORY: UploadCategory = UploadCategory::PostsImages;
}

/// A multipart form whose file has already been written to disk.
///
/// Runs before the handler body: the file field named by the category is
/// persisted through the [`UploadStore`](super::UploadStore), every other
/// text field is collected into `fields`.
pub struct Uploaded<C> {
    pub file: StoredUpload,
    pub fields: HashMap<String, String>,
    _category: PhantomData<fn() -> C>,
}

impl<C> Uploaded<C> {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: usize) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { limit }
    } else {
        UploadError::Multipart(err.body_text())
    }
}

impl<C: Category> FromRequest<AppState> for Uploaded<C> {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let category = C::CATEGORY;
        let store = &state.uploads;
        let limit = store.max_bytes();

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut file: Option<StoredUpload> = None;
        let mut fields = HashMap::new();

        let read = async {
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| multipart_error(e, limit))?
            {
                let name = field.name().unwrap_or_default().to_string();

                if name == category.field_name() {
                    if file.is_some() {
                        tracing::warn!("Ignoring extra '{}' file field", name);
                        continue;
                    }

                    let original_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field
                        .content_type()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| {
                            mime_guess::from_path(&original_name)
                                .first_or_octet_stream()
                                .to_string()
                        });

                    // Reject by type before buffering the body
                    store.check_type(&content_type)?;

                    let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                    let stored = store
                        .store(category, &original_name, &content_type, &data)
                        .await?;
                    file = Some(stored);
                } else {
                    let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                    fields.insert(name, value);
                }
            }
            Ok::<(), AppError>(())
        }
        .await;

        if let Err(e) = read {
            if let Some(stored) = &file {
                store.remove(&stored.relative_path).await;
            }
            return Err(e);
        }

        let file = file.ok_or(UploadError::MissingFile(category.field_name()))?;

        Ok(Uploaded {
            file,
            fields,
            _category: PhantomData,
        })
    }
}
