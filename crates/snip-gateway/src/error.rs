use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snip_core::ShortenerError;
use snip_shortener::SubmitError;
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error("deletion queue is closed")]
    DeletesClosed(#[from] SubmitError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Shortener(err) => match err {
                ShortenerError::InvalidUrl(_)
                | ShortenerError::InvalidShortCode(_)
                | ShortenerError::NotFound(_) => StatusCode::BAD_REQUEST,
                ShortenerError::Gone(_) => StatusCode::GONE,
                ShortenerError::Unsupported(_)
                | ShortenerError::Timeout
                | ShortenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::DeletesClosed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("malformed json body: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
