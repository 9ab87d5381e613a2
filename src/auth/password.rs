use crate::error::{AppError, AppResult};

/// Hash a password off the async runtime; bcrypt is deliberately slow.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Verify a password against a stored bcrypt hash. A malformed hash counts
/// as a mismatch.
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hash = hash_password("secret".into(), 4).await.unwrap();
        assert_ne!(hash, "secret");
        assert!(verify_password("secret".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_never_verifies() {
        assert!(!verify_password("secret".into(), "not-a-hash".into())
            .await
            .unwrap());
    }
}
