use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Normalized failure shape: the only error the backend or transport can
/// surface above the dispatcher boundary.
///
/// `status` is `None` when no response was received at all (offline, DNS,
/// timeout). `field_errors` carries per-field validation messages when the
/// server supplied them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    pub field_errors: Option<HashMap<String, Vec<String>>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Optional structured body on non-2xx responses:
/// `{ message?, errors? }`. Absence of either field is legal.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<HashMap<String, Vec<String>>>,
}

/// Top-level error type for the `opsdeck-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Normalized server or transport failure.
    #[error("API error: {0}")]
    Api(ApiError),

    /// This dispatch was superseded by a newer duplicate and cancelled.
    /// Its outcome never reached the caller; the superseding request's did.
    #[error("request superseded by a newer duplicate")]
    Cancelled,

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response body did not match the expected shape, with the raw
    /// body retained for debugging.
    #[error("deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl Error {
    /// Returns `true` if this dispatch was cancelled in favor of a newer
    /// duplicate (the caller should simply drop the result).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the server rejected the credential (HTTP 401).
    /// The session has already been torn down by the time this surfaces.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api(api) if api.status == Some(401))
    }

    /// The HTTP status code, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(api) => api.status,
            _ => None,
        }
    }

    /// Per-field validation errors, if the server supplied them.
    pub fn field_errors(&self) -> Option<&HashMap<String, Vec<String>>> {
        match self {
            Self::Api(api) => api.field_errors.as_ref(),
            _ => None,
        }
    }
}

// ── Normalization ───────────────────────────────────────────────────

/// Normalize a transport-level failure (no response received).
pub(crate) fn normalize_transport(err: &reqwest::Error) -> ApiError {
    ApiError {
        message: err.to_string(),
        status: None,
        field_errors: None,
    }
}

/// Normalize a non-2xx response.
///
/// Copies `message` and `errors` verbatim when the body carries the
/// structured error envelope; otherwise falls back to the generic status
/// text. Never fails -- an unreadable or unparseable body is legal.
pub(crate) async fn normalize_response(resp: reqwest::Response) -> ApiError {
    let status = resp.status();
    let mut api = ApiError {
        message: status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
        status: Some(status.as_u16()),
        field_errors: None,
    };

    if let Ok(body) = resp.text().await {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
            if let Some(message) = parsed.message {
                api.message = message;
            }
            if let Some(errors) = parsed.errors {
                api.field_errors = Some(errors);
            }
        }
    }

    api
}
