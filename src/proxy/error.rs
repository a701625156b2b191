//! Proxy errors and their HTTP mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("OpenAI API key not configured")]
    MissingCredential,
    #[error("Failed to get instruction from OpenAI")]
    Upstream(StatusCode),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid upstream response: {0}")]
    Decode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream(status) => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut error = self.to_string();
        if error.is_empty() {
            error = "Internal server error".to_string();
        }
        (status, Json(ErrorBody { error })).into_response()
    }
}
