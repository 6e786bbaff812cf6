/// JWT Claims structures
///
/// Access and refresh tokens carry the same standard claims (RFC 7519) plus
/// a `token_use` marker, so a token of one kind is rejected where the other
/// is expected even before the signature check fails.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::User;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Common view over both claim sets, used by the generic verifier
pub trait TokenClaims {
    fn kind(&self) -> TokenKind;
    fn expires_at(&self) -> i64;
}

/// Claims for access tokens
///
/// Profile fields are denormalized so protected requests can identify the
/// caller without a lookup.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub token_use: TokenKind,
    /// Unique token id; two tokens minted in the same second still differ
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

/// Claims for refresh tokens: identity only
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub token_use: TokenKind,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn new(user: &User, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            token_use: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_subject(&self.sub)
    }
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            token_use: TokenKind::Refresh,
            jti: Uuid::new_v4().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        parse_subject(&self.sub)
    }
}

impl TokenClaims for AccessClaims {
    fn kind(&self) -> TokenKind {
        self.token_use
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl TokenClaims for RefreshClaims {
    fn kind(&self) -> TokenKind {
        self.token_use
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// A token is expired from the second its `exp` is reached
pub fn is_expired(claims: &impl TokenClaims) -> bool {
    claims.expires_at() <= chrono::Utc::now().timestamp()
}

fn parse_subject(sub: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(sub).map_err(|_| AuthError::TokenInvalid)
}
