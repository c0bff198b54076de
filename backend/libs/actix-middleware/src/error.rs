//! JSON rejection responses for authentication failures

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use proxied_identity::AuthError;
use serde::Serialize;

/// Body of every authentication rejection
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub status: u16,
}

/// An [`AuthError`] surfaced to the client. Always a direct response, never a redirect.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AuthRejection(#[from] pub AuthError);

impl ResponseError for AuthRejection {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::UNAUTHORIZED)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.0.kind(),
            message: self.0.to_string(),
            status: self.0.status_code(),
        })
    }
}
