use actix_web::{web, HttpResponse};

use crate::accounts::AccountService;
use crate::error::AppError;
use crate::middleware::AuthenticatedUser;
use crate::response::ApiResponse;

/// GET /c/{username}
///
/// `isSubscribed` is relative to the viewer, not the channel owner.
pub async fn channel_profile(
    user: web::ReqData<AuthenticatedUser>,
    path: web::Path<String>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let profile = accounts.channel_profile(&path, user.id).await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully"))
}

/// GET /history
pub async fn watch_history(
    user: web::ReqData<AuthenticatedUser>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let history = accounts.watch_history(user.id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
