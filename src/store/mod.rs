/// Persistence contract
///
/// `UserRepository` covers user records; `SessionStore` is the only way to
/// touch the stored refresh-token digest. `rotate_refresh_token` must be a
/// single atomic compare-and-swap on the user record.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ChannelProfile, NewUser, User, WatchHistoryEntry};
use crate::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Matches a user whose username equals `username` OR whose email equals `email`.
    /// Both arguments are expected already normalized (lowercase). When they
    /// name different users, the username match wins.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError>;

    /// Fails with a unique-constraint error when the username or email is taken
    async fn insert(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;

    async fn update_account(&self, id: Uuid, full_name: &str, email: &str) -> Result<User, AppError>;

    async fn update_avatar(&self, id: Uuid, url: &str) -> Result<User, AppError>;

    async fn update_cover_image(&self, id: Uuid, url: &str) -> Result<User, AppError>;

    async fn channel_profile(
        &self,
        username: &str,
        viewer_id: Uuid,
    ) -> Result<Option<ChannelProfile>, AppError>;

    /// Most recent first
    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchHistoryEntry>, AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Unconditionally replaces the stored digest
    async fn set_refresh_token(&self, user_id: Uuid, digest: &str) -> Result<(), AppError>;

    /// Idempotent
    async fn clear_refresh_token(&self, user_id: Uuid) -> Result<(), AppError>;

    /// Replaces `expected` with `replacement` only if `expected` is still the stored
    /// digest. Returns whether the swap happened.
    async fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, AppError>;
}

pub trait Storage: UserRepository + SessionStore {}

impl<T: UserRepository + SessionStore + ?Sized> Storage for T {}
