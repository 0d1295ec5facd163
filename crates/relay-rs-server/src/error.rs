use log::warn;
use relay_rs_core::RelayCoreError;
use rocket::Request;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde_json::json;

/// Failure reported before any stream is produced.
#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: Status, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }
}

impl From<RelayCoreError> for ApiError {
    fn from(err: RelayCoreError) -> Self {
        match err {
            RelayCoreError::UnknownSession(_) => {
                Self::new(Status::NotFound, "session_not_found", err.to_string())
            }
            RelayCoreError::InvalidToolLinkage(_) => {
                Self::new(Status::BadRequest, "invalid_request_error", err.to_string())
            }
            RelayCoreError::Tool(_) => {
                Self::new(Status::BadGateway, "tool_backend_error", err.to_string())
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        warn!(
            "request failed (path={}, status={}, error={})",
            request.uri().path(),
            self.status.code,
            self.message
        );
        let body = json!({
            "error": {
                "message": self.message,
                "type": self.kind,
                "code": self.status.code,
            }
        });
        (self.status, Json(body)).respond_to(request)
    }
}
