use actix_files as fs;
use actix_multipart::form::{tempfile::TempFileConfig, MultipartFormConfig};
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::accounts::AccountService;
use crate::auth::{CredentialVerifier, SessionManager, TokenIssuer};
use crate::configuration::Settings;
use crate::error::{json_error_handler, AppError, MediaError, ValidationError};
use crate::media::LocalMediaStore;
use crate::middleware::{Authenticator, LoggerMiddleware};
use crate::routes::{
    change_password, channel_profile, current_user, health_check, login, logout, refresh_token,
    register, update_account, update_avatar, update_cover_image, watch_history,
};
use crate::store::Storage;

fn multipart_error_handler(
    err: actix_multipart::MultipartError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    AppError::Validation(ValidationError::MalformedBody(err.to_string())).into()
}

fn temp_file_error_handler(
    err: actix_multipart::form::tempfile::TempFileError,
    _req: &actix_web::HttpRequest,
) -> actix_web::Error {
    AppError::Media(MediaError::Io(err.to_string())).into()
}

/// Builds the server on an already-bound listener.
///
/// Fails before binding anything if the JWT settings are unusable.
pub fn run(
    listener: TcpListener,
    store: Arc<dyn Storage>,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    settings
        .jwt
        .validate()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let media_settings = settings.media.clone();
    std::fs::create_dir_all(&media_settings.temp_dir)?;
    std::fs::create_dir_all(&media_settings.upload_dir)?;

    let issuer = Arc::new(TokenIssuer::new(&settings.jwt));
    let credentials = CredentialVerifier::new(settings.application.password_hash_cost);

    let sessions = web::Data::new(SessionManager::new(
        store.clone(),
        issuer.clone(),
        credentials,
    ));
    let accounts = web::Data::new(AccountService::new(
        store.clone(),
        Arc::new(LocalMediaStore::new(&media_settings)),
        credentials,
    ));
    let auth = Authenticator::new(issuer, store);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(LoggerMiddleware)

            // Shared state and extractor configuration
            .app_data(sessions.clone())
            .app_data(accounts.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(media_settings.max_file_size)
                    .error_handler(multipart_error_handler),
            )
            .app_data(
                TempFileConfig::default()
                    .directory(&media_settings.temp_dir)
                    .error_handler(temp_file_error_handler),
            )

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/refresh-token", web::post().to(refresh_token))

            // Protected routes (require an access token)
            .service(
                web::resource("/logout")
                    .wrap(auth.clone())
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/change-password")
                    .wrap(auth.clone())
                    .route(web::post().to(change_password)),
            )
            .service(
                web::resource("/current-user")
                    .wrap(auth.clone())
                    .route(web::get().to(current_user)),
            )
            .service(
                web::resource("/update-account")
                    .wrap(auth.clone())
                    .route(web::patch().to(update_account)),
            )
            .service(
                web::resource("/avatar")
                    .wrap(auth.clone())
                    .route(web::patch().to(update_avatar)),
            )
            .service(
                web::resource("/cover-image")
                    .wrap(auth.clone())
                    .route(web::patch().to(update_cover_image)),
            )
            .service(
                web::resource("/c/{username}")
                    .wrap(auth.clone())
                    .route(web::get().to(channel_profile)),
            )
            .service(
                web::resource("/history")
                    .wrap(auth.clone())
                    .route(web::get().to(watch_history)),
            )

            // Uploaded avatars and cover images
            .service(fs::Files::new("/uploads", media_settings.upload_dir.clone()))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
