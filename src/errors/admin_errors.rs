use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AsError;

/// Structured error payload returned by the admin API, either with a
/// non-success status or embedded in an otherwise successful response.
#[derive(Serialize, Deserialize, Error, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[error("{message}")]
pub struct ErrorResponse {
    // Required, so that arbitrary JSON objects are not mistaken for errors.
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub host_id: String,
    #[serde(default)]
    pub region: String,
}

impl ErrorResponse {
    /// Decodes the body of a non-success response. Bodies that are not a
    /// valid error payload yield an error synthesized from the status line.
    pub fn from_http_response(status: StatusCode, body: &[u8]) -> ErrorResponse {
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(err) => err,
            Err(err) => ErrorResponse {
                code: status.to_string(),
                message: format!("Failed to parse server response ({}): {}", status, err),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminError {
    // Rejected locally, nothing was sent to the server.
    #[error("Invalid arguments specified: {0}")]
    InvalidArgument(String),

    #[error("transport error: {0}")]
    Transport(anyhow::Error),

    #[error("server error: {0}")]
    Server(ErrorResponse),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AdminError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> AdminError {
        AdminError::InvalidArgument(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            AdminError::Transport(err) => {
                err.as_error::<tokio::time::error::Elapsed>().is_some()
                    || err
                        .as_error::<reqwest::Error>()
                        .map_or(false, |err| err.is_timeout())
            }
            _ => false,
        }
    }

    pub fn server_code(&self) -> Option<&str> {
        match self {
            AdminError::Server(err) => Some(&err.code),
            _ => None,
        }
    }
}

impl From<ErrorResponse> for AdminError {
    fn from(err: ErrorResponse) -> Self {
        AdminError::Server(err)
    }
}
