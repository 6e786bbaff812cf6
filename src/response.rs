/// Success envelope shared by every endpoint.
///
/// Errors use `error::ErrorResponse`, which has the same
/// `statusCode` / `message` / `success` keys.

use actix_web::{http::StatusCode, HttpResponse, HttpResponseBuilder};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    /// Finish an already-started builder (cookies attached, etc.)
    pub fn send(self, mut builder: HttpResponseBuilder) -> HttpResponse {
        builder.json(self)
    }

    pub fn ok(data: T, message: impl Into<String>) -> HttpResponse {
        Self::new(StatusCode::OK, data, message).send(HttpResponse::Ok())
    }

    pub fn created(data: T, message: impl Into<String>) -> HttpResponse {
        Self::new(StatusCode::CREATED, data, message).send(HttpResponse::Created())
    }
}

/// `{}` payload for operations that return nothing
#[derive(Debug, Serialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let response = ApiResponse::new(StatusCode::OK, Empty {}, "User logged out");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "User logged out");
        assert!(json["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_created_status() {
        let response = ApiResponse::new(StatusCode::CREATED, "x", "created");
        assert_eq!(response.status_code, 201);
        assert!(response.success);
    }
}
