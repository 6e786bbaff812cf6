use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};
use std::rc::Rc;
use std::time::Instant;

use crate::error::{AppError, ErrorHandler, RequestId};

/// Request logger
///
/// One line when a request starts and one when it completes, with status and
/// latency. Query strings, headers and cookies are left out: tokens travel in
/// them.
///
/// Each request gets a `RequestId` in its extensions. Application errors are
/// logged here under that id.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
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
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let request_id = RequestId::generate();
        req.extensions_mut().insert(request_id.clone());
        let request_id = request_id.0;

        info!("Request started: {} {} [{}]", method, path, request_id);

        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed = start_time.elapsed().as_millis();

            match &res {
                Ok(res) => {
                    // Handler errors arrive already rendered into the response
                    if let Some(app_error) =
                        res.response().error().and_then(|e| e.as_error::<AppError>())
                    {
                        app_error.log_error(&request_id);
                    }
                    info!(
                        "Request completed: {} {} - Status: {} ({}ms) [{}]",
                        method,
                        path,
                        res.status().as_u16(),
                        elapsed,
                        request_id
                    )
                }
                // Errors raised by inner middleware (e.g. the authenticator)
                Err(e) => {
                    if let Some(app_error) = e.as_error::<AppError>() {
                        app_error.log_error(&request_id);
                    }
                    warn!(
                        "Request failed: {} {} - Status: {} ({}ms) [{}]",
                        method,
                        path,
                        e.as_response_error().status_code().as_u16(),
                        elapsed,
                        request_id
                    )
                }
            }

            res
        })
    }
}
