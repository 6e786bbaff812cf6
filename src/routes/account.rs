/// Account Routes
///
/// Everything here sits behind the `Authenticator` and acts on the
/// authenticated user only.

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::accounts::AccountService;
use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::response::{ApiResponse, Empty};
use crate::routes::auth::uploaded_file;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(MultipartForm)]
pub struct AvatarForm {
    pub avatar: Option<TempFile>,
}

#[derive(MultipartForm)]
pub struct CoverImageForm {
    #[multipart(rename = "coverImage")]
    pub cover_image: Option<TempFile>,
}

/// POST /change-password
///
/// # Errors
/// - 400: a blank field, or the old password does not match
pub async fn change_password(
    req: HttpRequest,
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<ChangePasswordRequest>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "change_password").with_user_id(user.id);

    accounts
        .change_password(
            user.id,
            form.old_password.as_deref(),
            form.new_password.as_deref(),
        )
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = context.user_id.as_deref(),
        "Password changed"
    );

    Ok(ApiResponse::ok(Empty {}, "Password changed successfully"))
}

/// GET /current-user
pub async fn current_user(
    user: web::ReqData<AuthenticatedUser>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let view = accounts.current_user(user.id).await?;
    Ok(ApiResponse::ok(view, "Current user fetched successfully"))
}

/// PATCH /update-account
///
/// # Errors
/// - 400: `fullName` or `email` missing or malformed
/// - 409: email belongs to another account
pub async fn update_account(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<UpdateAccountRequest>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let view = accounts
        .update_account(user.id, form.full_name.as_deref(), form.email.as_deref())
        .await?;

    tracing::info!(user_id = %user.id, "Account details updated");

    Ok(ApiResponse::ok(view, "Account details updated successfully"))
}

/// PATCH /avatar
pub async fn update_avatar(
    user: web::ReqData<AuthenticatedUser>,
    MultipartForm(form): MultipartForm<AvatarForm>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let view = accounts
        .update_avatar(user.id, uploaded_file(&form.avatar))
        .await?;

    Ok(ApiResponse::ok(view, "Avatar image updated successfully"))
}

/// PATCH /cover-image
pub async fn update_cover_image(
    user: web::ReqData<AuthenticatedUser>,
    MultipartForm(form): MultipartForm<CoverImageForm>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let view = accounts
        .update_cover_image(user.id, uploaded_file(&form.cover_image))
        .await?;

    Ok(ApiResponse::ok(view, "Cover image updated successfully"))
}
