/// Account domain types
///
/// `User` is the stored record. Everything that leaves the service goes
/// through `UserView`, which has no password hash or refresh token.

mod user;

pub use user::{ChannelProfile, NewUser, User, UserView, WatchHistoryEntry};
