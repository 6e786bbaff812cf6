/// Password Hashing and Verification
///
/// bcrypt is deliberately slow, so both operations run on the blocking
/// thread pool instead of an async worker.

use bcrypt::{hash, verify};

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct CredentialVerifier {
    cost: u32,
}

impl CredentialVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// # Errors
    /// Returns error if bcrypt hashing fails
    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.cost;
        run_blocking(move || hash_password(&password, cost)).await
    }

    /// `Ok(false)` on mismatch; an error only if the stored hash is unusable
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        run_blocking(move || verify_password(&password, &stored_hash)).await
    }

    /// Always `Ok(false)`, after the same bcrypt work as `verify`.
    ///
    /// Used when a login names no known account, so the response takes as
    /// long as a wrong password would.
    pub async fn reject(&self, password: &str) -> Result<bool, AppError> {
        self.hash(password).await.map(|_| false)
    }
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {}", e)))?
}
