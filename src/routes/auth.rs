/// Session Routes
///
/// Registration, login, logout and token refresh. Login and refresh hand the
/// tokens out twice: as `httpOnly` cookies and in the JSON body, for clients
/// that cannot use cookies.

use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::accounts::{AccountService, Registration};
use crate::auth::{removal_cookie, session_cookie, SessionManager, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::domain::UserView;
use crate::error::{AppError, AuthError, ErrorContext};
use crate::media::LocalFile;
use crate::middleware::AuthenticatedUser;
use crate::response::{ApiResponse, Empty};

/// Multipart registration form
#[derive(MultipartForm)]
pub struct RegisterForm {
    #[multipart(rename = "fullName")]
    pub full_name: Option<Text<String>>,
    pub email: Option<Text<String>>,
    pub username: Option<Text<String>>,
    pub password: Option<Text<String>>,
    pub avatar: Option<TempFile>,
    #[multipart(rename = "coverImage")]
    pub cover_image: Option<TempFile>,
}

/// Either identifier may be used; at least one is required
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

pub(crate) fn text_field(field: &Option<Text<String>>) -> Option<&str> {
    field.as_ref().map(|text| text.0.as_str())
}

/// A part that was sent without content counts as no file at all
pub(crate) fn uploaded_file(field: &Option<TempFile>) -> Option<LocalFile<'_>> {
    field.as_ref().filter(|file| file.size > 0).map(|file| LocalFile {
        path: file.file.path(),
        original_name: file.file_name.as_deref(),
    })
}

/// POST /register
///
/// Creates the account. Does not log the user in: no cookies, no tokens.
///
/// # Errors
/// - 400: a blank text field or no avatar
/// - 409: username or email already taken
pub async fn register(
    req: HttpRequest,
    MultipartForm(form): MultipartForm<RegisterForm>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_registration");

    let user = accounts
        .register(Registration {
            full_name: text_field(&form.full_name),
            email: text_field(&form.email),
            username: text_field(&form.username),
            password: text_field(&form.password),
            avatar: uploaded_file(&form.avatar),
            cover_image: uploaded_file(&form.cover_image),
        })
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %user.id,
        "User registered successfully"
    );

    // Temp files are removed when `form` drops
    Ok(ApiResponse::created(user, "User registered successfully."))
}

/// POST /login
///
/// # Errors
/// - 400: no username/email, or no password
/// - 401: unknown user or wrong password (same message for both)
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_login");

    let outcome = sessions
        .login(
            form.username.as_deref(),
            form.email.as_deref(),
            form.password.as_deref().unwrap_or_default(),
        )
        .await?;

    let context = context.with_user_id(outcome.user.id);
    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = context.user_id.as_deref(),
        "User logged in successfully"
    );

    let mut builder = HttpResponse::Ok();
    builder
        .cookie(session_cookie(ACCESS_COOKIE, outcome.tokens.access_token.clone()))
        .cookie(session_cookie(REFRESH_COOKIE, outcome.tokens.refresh_token.clone()));

    Ok(ApiResponse::new(
        StatusCode::OK,
        LoginResponse {
            user: outcome.user,
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
        },
        "User logged in successfully.",
    )
    .send(builder))
}

/// POST /logout
///
/// Idempotent: logging out twice still answers 200.
pub async fn logout(
    req: HttpRequest,
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_logout").with_user_id(user.id);

    sessions.logout(user.id).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = context.user_id.as_deref(),
        "User logged out"
    );

    let mut builder = HttpResponse::Ok();
    builder
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE));

    Ok(ApiResponse::new(StatusCode::OK, Empty {}, "User logged out").send(builder))
}

/// POST /refresh-token
///
/// Rotates the session: the presented refresh token is spent and a new pair
/// is issued. The token comes from the `refreshToken` cookie, or else from the
/// JSON body.
///
/// # Errors
/// - 401: missing, invalid, expired, reused or revoked refresh token
/// - 404: the token's user no longer exists
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "token_refresh");

    let presented = req
        .cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| body.and_then(|json| json.into_inner().refresh_token))
        .filter(|token| !token.trim().is_empty())
        .ok_or(AuthError::MissingToken)?;

    let tokens = sessions.refresh(presented.trim()).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        "Access token refreshed"
    );

    let mut builder = HttpResponse::Ok();
    builder
        .cookie(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()))
        .cookie(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()));

    Ok(ApiResponse::new(
        StatusCode::OK,
        RefreshResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
        "Access token refreshed",
    )
    .send(builder))
}
