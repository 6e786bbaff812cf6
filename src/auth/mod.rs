/// Authentication module
///
/// Token issuing and verification, password hashing, the session
/// manager, and the cookie attributes shared by every session response.

mod claims;
mod cookies;
mod jwt;
mod password;
mod session;

pub use claims::{is_expired, AccessClaims, RefreshClaims, TokenClaims, TokenKind};
pub use cookies::{removal_cookie, session_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
pub use jwt::TokenIssuer;
pub use password::{hash_password, verify_password, CredentialVerifier};
pub use session::{token_digest, LoginOutcome, SessionManager, TokenPair};
