//! Typed failures for the report pipeline and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// A report was requested before any repository was configured.
    #[error("no repository configured")]
    NotConfigured,

    /// The uploaded credential bytes were not valid UTF-8 text.
    #[error("credential is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// The decoded credential was rejected while building the API client.
    #[error("could not build GitHub client: {0}")]
    ClientInit(#[source] octocrab::Error),

    /// A request failed (network error or non-2xx status). Results from any
    /// earlier pages of the same listing are discarded.
    #[error("request to {url} failed: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: octocrab::Error,
    },

    /// The response body did not have the expected JSON shape.
    #[error("malformed response from {url}: {source}")]
    MalformedResponse {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A reduction had zero eligible inputs. Distinct from a computed zero.
    #[error("no {0} available")]
    NoData(&'static str),

    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Status code reported by GitHub itself, when the failure carries one.
fn upstream_status(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ReportError::NotConfigured => (StatusCode::CONFLICT, self.to_string()),
            ReportError::Decode(_) | ReportError::ClientInit(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            ReportError::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ReportError::FetchFailed { source, .. } => match upstream_status(source) {
                Some(404) => (StatusCode::NOT_FOUND, "repository not found".to_string()),
                Some(403) | Some(429) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "GitHub rate limit exceeded".to_string(),
                ),
                _ => (StatusCode::BAD_GATEWAY, self.to_string()),
            },
            ReportError::MalformedResponse { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            ReportError::NoData(_) => (StatusCode::NOT_FOUND, self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(%status, "report failed: {}", message);
        } else {
            tracing::warn!(%status, "report rejected: {}", message);
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
