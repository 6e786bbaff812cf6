/// Request Authenticator
///
/// Gate in front of protected routes. Takes the access token from the
/// `accessToken` cookie, or failing that from `Authorization: Bearer`,
/// verifies it, checks the user still exists and puts an
/// `AuthenticatedUser` into the request extensions. It never refreshes:
/// an expired access token is a 401 and the client goes through
/// `/refresh-token`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{TokenIssuer, ACCESS_COOKIE};
use crate::error::{AppError, AuthError};
use crate::store::Storage;

/// Identity attached to every authenticated request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

/// Cookie first, then bearer header
pub fn extract_access_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Authentication middleware for protected routes
#[derive(Clone)]
pub struct Authenticator {
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn Storage>,
}

impl Authenticator {
    pub fn new(issuer: Arc<TokenIssuer>, store: Arc<dyn Storage>) -> Self {
        Self { issuer, store }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authenticator
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticatorService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthenticatorService {
            service: Rc::new(service),
            issuer: self.issuer.clone(),
            store: self.store.clone(),
        }))
    }
}

pub struct AuthenticatorService<S> {
    service: Rc<S>,
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn Storage>,
}

impl<S, B> Service<ServiceRequest> for AuthenticatorService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = extract_access_token(&req);
        let claims = token
            .ok_or(AuthError::MissingToken)
            .and_then(|token| self.issuer.verify_access_token(&token));

        let claims = match claims {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(path = %req.path(), error = %e, "Access token rejected");
                return Box::pin(async move { Err(AppError::Auth(e).into()) });
            }
        };

        let service = self.service.clone();
        let store = self.store.clone();

        Box::pin(async move {
            let user_id = claims.user_id().map_err(AppError::Auth)?;

            // The token may outlive the account it was issued for
            let user = store
                .find_by_id(user_id)
                .await?
                .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

            req.extensions_mut().insert(AuthenticatedUser {
                id: user.id,
                username: user.username,
                email: user.email,
                full_name: user.full_name,
            });

            tracing::debug!(user_id = %user_id, "Access token validated");

            service.call(req).await
        })
    }
}
