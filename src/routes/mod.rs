mod account;
mod auth;
mod channel;
mod health_check;

pub use account::{change_password, current_user, update_account, update_avatar, update_cover_image};
pub use auth::{login, logout, refresh_token, register};
pub use channel::{channel_profile, watch_history};
pub use health_check::health_check;
