/// Session Manager
///
/// Login, refresh and logout. This is the only code that reads or writes a
/// user's stored refresh token. A refresh token is accepted only when it
/// verifies cryptographically AND its digest equals the digest stored on the
/// user; every login and refresh overwrites the stored digest, so at most one
/// refresh token per user is usable at any time.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::jwt::TokenIssuer;
use crate::auth::password::CredentialVerifier;
use crate::domain::{User, UserView};
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::store::Storage;

/// Freshly minted access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserView,
    pub tokens: TokenPair,
}

pub struct SessionManager {
    store: Arc<dyn Storage>,
    issuer: Arc<TokenIssuer>,
    credentials: CredentialVerifier,
}

/// SHA-256 of a refresh token; the stored form of the current token
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn Storage>,
        issuer: Arc<TokenIssuer>,
        credentials: CredentialVerifier,
    ) -> Self {
        Self {
            store,
            issuer,
            credentials,
        }
    }

    /// Authenticate by username OR email plus password, and start a new session.
    ///
    /// Any previously issued refresh token for the user stops working.
    ///
    /// # Errors
    /// - `Validation` when both identifiers or the password are missing
    /// - `Auth(InvalidCredentials)` for an unknown user or a wrong password
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<LoginOutcome, AppError> {
        let username = normalized(username);
        let email = normalized(email);

        if username.is_none() && email.is_none() {
            return Err(ValidationError::EmptyField("username or email".to_string()).into());
        }
        if password.trim().is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        let user = match self
            .store
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
        {
            Some(user) => user,
            None => {
                // Spend the same bcrypt time as a wrong password
                self.credentials.reject(password).await?;
                tracing::warn!("Login rejected: unknown user");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.credentials.verify(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.issue_pair(&user)?;
        self.store
            .set_refresh_token(user.id, &token_digest(&tokens.refresh_token))
            .await?;

        tracing::info!(user_id = %user.id, "Session started");

        Ok(LoginOutcome {
            user: user.view(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair, retiring the presented token.
    ///
    /// # Errors
    /// - `Auth(TokenInvalid | TokenExpired)` when the token does not verify
    /// - `Database(NotFound)` when the user no longer exists
    /// - `Auth(TokenReuseOrRevoked)` when the token was already rotated or logged out
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AppError> {
        let claims = self.issuer.verify_refresh_token(presented)?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User does not exist".to_string()))?;

        let presented_digest = token_digest(presented);
        if user.refresh_token.as_deref() != Some(presented_digest.as_str()) {
            tracing::warn!(user_id = %user.id, "Refresh token reuse or revoked token presented");
            return Err(AuthError::TokenReuseOrRevoked.into());
        }

        let tokens = self.issue_pair(&user)?;

        // Lost the race against a concurrent refresh of the same token
        let rotated = self
            .store
            .rotate_refresh_token(
                user.id,
                &presented_digest,
                &token_digest(&tokens.refresh_token),
            )
            .await?;
        if !rotated {
            tracing::warn!(user_id = %user.id, "Refresh token rotated concurrently");
            return Err(AuthError::TokenReuseOrRevoked.into());
        }

        tracing::info!(user_id = %user.id, "Session refreshed");
        Ok(tokens)
    }

    /// End the user's session. Calling it again is not an error.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.clear_refresh_token(user_id).await?;
        tracing::info!(user_id = %user_id, "Session ended");
        Ok(())
    }

    fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issuer.issue_access_token(user)?,
            refresh_token: self.issuer.issue_refresh_token(user.id)?,
        })
    }
}
