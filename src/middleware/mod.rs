/// Middleware module
///
/// Request authentication and request logging.

mod authenticator;
mod logger;

pub use authenticator::{extract_access_token, AuthenticatedUser, Authenticator};
pub use logger::LoggerMiddleware;
