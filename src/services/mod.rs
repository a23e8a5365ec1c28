use crate::models::capa::ParseCapaError;
use serde::Deserialize;
use std::fmt;

pub mod capas;
pub mod graphics;

pub use capas::{CapaStore, HttpCapaStore};
pub use graphics::GraphicsClient;

/// Errors crossing the remote-service boundary.
#[derive(Debug)]
pub enum ServiceError {
    /// Transport-level failure (connection refused, timeout, bad body).
    Http(reqwest::Error),
    /// The service answered with a non-2xx status and an error message.
    Api { status: u16, message: String },
    /// Refusing to save a capa with no features.
    EmptySave,
    /// A persisted record could not be decoded.
    Parse(ParseCapaError),
    /// The request body could not be encoded.
    Encode(serde_json::Error),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Http(e) => write!(f, "request failed: {}", e),
            ServiceError::Api { status, message } => {
                write!(f, "service error ({}): {}", status, message)
            }
            ServiceError::EmptySave => write!(f, "no features to save"),
            ServiceError::Parse(e) => write!(f, "{}", e),
            ServiceError::Encode(e) => write!(f, "failed to encode request: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Http(e) => Some(e),
            ServiceError::Parse(e) => Some(e),
            ServiceError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Http(e)
    }
}

impl From<ParseCapaError> for ServiceError {
    fn from(e: ParseCapaError) -> Self {
        ServiceError::Parse(e)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Decode a non-2xx response into [`ServiceError::Api`], falling back to a
/// generic message when the body carries no `{"error": ...}` object.
pub(crate) async fn api_error(response: reqwest::Response, fallback: &str) -> ServiceError {
    let status = response.status().as_u16();
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => fallback.to_string(),
    };
    ServiceError::Api { status, message }
}
