/// JWT Token Issuer
///
/// Mints and verifies access and refresh tokens. Each kind has its own
/// HMAC secret and TTL, both taken from `JwtSettings` at construction.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{is_expired, AccessClaims, RefreshClaims, TokenClaims, TokenKind};
use crate::configuration::JwtSettings;
use crate::domain::User;
use crate::error::{AppError, AuthError};

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        Self {
            access: SigningKeys::from_secret(&config.access_token_secret),
            refresh: SigningKeys::from_secret(&config.refresh_token_secret),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
            issuer: config.issuer.clone(),
        }
    }

    /// # Errors
    /// Returns an internal error if signing fails
    pub fn issue_access_token(&self, user: &User) -> Result<String, AppError> {
        let claims = AccessClaims::new(user, self.access_token_expiry, self.issuer.clone());
        sign(&claims, &self.access)
    }

    /// # Errors
    /// Returns an internal error if signing fails
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let claims = RefreshClaims::new(user_id, self.refresh_token_expiry, self.issuer.clone());
        sign(&claims, &self.refresh)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.verify(token, TokenKind::Refresh)
    }

    /// Checks signature, issuer, expiry and token kind.
    ///
    /// # Errors
    /// `TokenExpired` once `exp` is reached, `TokenInvalid` for anything else.
    pub fn verify<C>(&self, token: &str, expected: TokenKind) -> Result<C, AuthError>
    where
        C: DeserializeOwned + TokenClaims,
    {
        let keys = match expected {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let claims = decode::<C>(token, &keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!("JWT validation error: {}", e);
                    AuthError::TokenInvalid
                }
            })?;

        if claims.kind() != expected {
            return Err(AuthError::TokenInvalid);
        }

        if is_expired(&claims) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }
}

fn sign<C: Serialize>(claims: &C, keys: &SigningKeys) -> Result<String, AppError> {
    encode(&Header::default(), claims, &keys.encoding)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewUser;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_token_secret: "access-secret-key-at-least-32-characters-long".to_string(),
            refresh_token_secret: "refresh-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn user() -> User {
        User::from_new(NewUser {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "Alice".to_string(),
            avatar: "a".to_string(),
            cover_image: None,
            password_hash: "h".to_string(),
        })
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let user = user();

        let token = issuer.issue_access_token(&user).expect("Failed to generate token");
        let claims = issuer.verify_access_token(&token).expect("Failed to validate token");

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.full_name, "Alice");
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let id = Uuid::new_v4();

        let token = issuer.issue_refresh_token(id).expect("Failed to generate token");
        let claims = issuer.verify_refresh_token(&token).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), id);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let issuer = TokenIssuer::new(&get_test_config());
        let user = user();

        let access = issuer.issue_access_token(&user).unwrap();
        let refresh = issuer.issue_refresh_token(user.id).unwrap();

        assert_eq!(issuer.verify_refresh_token(&access).unwrap_err(), AuthError::TokenInvalid);
        assert_eq!(issuer.verify_access_token(&refresh).unwrap_err(), AuthError::TokenInvalid);
    }

    #[test]
    fn test_kind_marker_checked_even_with_shared_key() {
        // Same key for both kinds: only the token_use claim tells them apart
        let mut config = get_test_config();
        config.refresh_token_secret = config.access_token_secret.clone();
        let issuer = TokenIssuer::new(&config);

        let refresh = issuer.issue_refresh_token(Uuid::new_v4()).unwrap();
        assert!(issuer.verify_access_token(&refresh).is_err());
    }

    #[test]
    fn test_zero_ttl_token_is_expired() {
        let mut config = get_test_config();
        config.access_token_expiry = 0;
        let issuer = TokenIssuer::new(&config);

        let token = issuer.issue_access_token(&user()).unwrap();
        assert_eq!(issuer.verify_access_token(&token).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn test_invalid_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let result = issuer.verify_access_token("invalid.token.here");

        assert_eq!(result.unwrap_err(), AuthError::TokenInvalid);
    }

    #[test]
    fn test_tampered_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let token = issuer.issue_access_token(&user()).unwrap();

        let tampered = format!("{}X", token);
        assert!(issuer.verify_access_token(&tampered).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config).issue_access_token(&user()).unwrap();

        config.issuer = "wrong-issuer".to_string();
        let result = TokenIssuer::new(&config).verify_access_token(&token);

        assert!(result.is_err());
    }

    #[test]
    fn test_each_issue_is_distinct() {
        let issuer = TokenIssuer::new(&get_test_config());
        let id = Uuid::new_v4();

        assert_ne!(
            issuer.issue_refresh_token(id).unwrap(),
            issuer.issue_refresh_token(id).unwrap()
        );
    }
}
