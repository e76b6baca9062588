//! Errors at the resource boundary

use super::registry::Verb;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rejection payload from a remote call.
///
/// Backends answer with either `{"error": "..."}` or `{"message": "..."}`;
/// both are accepted and either may be missing. `status` is the HTTP status
/// when the failure reached the server, `None` for transport failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RemoteError {
    /// A rejection carrying an `error` field
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Self::default()
        }
    }

    /// A rejection carrying a `message` field
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Parse a backend error body, keeping the HTTP status.
    ///
    /// Bodies that are not JSON objects become a bare error with the status.
    pub fn from_body(status: u16, body: &str) -> Self {
        serde_json::from_str::<RemoteError>(body)
            .unwrap_or_default()
            .with_status(status)
    }

    /// Human-readable text carried by the payload: `error`, then `message`.
    /// Blank strings do not count.
    pub fn detail(&self) -> Option<&str> {
        [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// Whether the backend rejected the session (401)
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.detail()) {
            (Some(status), Some(detail)) => write!(f, "remote call failed ({status}): {detail}"),
            (Some(status), None) => write!(f, "remote call failed ({status})"),
            (None, Some(detail)) => write!(f, "remote call failed: {detail}"),
            (None, None) => f.write_str("remote call failed"),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Errors returned by CRUD synchronization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("unknown resource '{name}' (registered: {})", .known.join(", "))]
    UnknownResource { name: String, known: Vec<String> },

    #[error("resource '{resource}' does not support '{verb}'")]
    UnsupportedVerb { resource: String, verb: Verb },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to encode {resource} payload: {reason}")]
    Encode { resource: String, reason: String },

    #[error("failed to decode {resource} response: {reason}")]
    Decode { resource: String, reason: String },
}

impl ResourceError {
    /// The remote rejection, if this error came from the backend
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}
