//! Error types for the project authorization client.

use thiserror::Error;

use crate::types::ServiceIdentity;

/// Result type for project authorization operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Project authorization client errors.
///
/// Every variant is surfaced to the caller unchanged. The only local recovery
/// is the single refresh-and-retry the executor performs on an expired token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Could not obtain or refresh an access token
    #[error("Credential fetch failed for service '{identity}': {message}")]
    CredentialFetch {
        identity: ServiceIdentity,
        message: String,
    },

    /// Network error (connection failed, timeout, non-2xx without an envelope)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not a decodable envelope
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Upstream answered with a non-zero envelope code
    #[error("Remote rejected request (code {code}): {message}")]
    RemoteRejected { code: i64, message: String },

    /// Configuration error (missing base URL, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The project metadata collaborator failed
    #[error("Project metadata lookup failed: {0}")]
    MetadataLookup(String),
}

impl AuthError {
    pub fn credential_fetch(identity: &ServiceIdentity, message: impl Into<String>) -> Self {
        Self::CredentialFetch {
            identity: identity.clone(),
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_remote_rejected(&self) -> bool {
        matches!(self, Self::RemoteRejected { .. })
    }

    /// Envelope code carried by a remote rejection.
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::RemoteRejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the access token or app secret in the query.
        let err = err.without_url();
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}
