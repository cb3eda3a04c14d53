//! Decoding and classification of the `{code, message, data}` wrapper every
//! upstream response uses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{AuthError, Result};

/// Envelope code meaning the access token is invalid or expired.
pub const AUTH_EXPIRED_CODE: i64 = 403;

/// Wrapper for authorization API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    pub data: Option<T>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// What an envelope means to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// `code == 0`. Absent data is an empty result, not an error.
    Success(Option<T>),
    /// `code == 403`: the token must be refreshed.
    AuthExpired,
    /// Any other non-zero code.
    RemoteRejected { code: i64, message: String },
}

/// Decode a raw response body into an envelope.
///
/// `data` is only decoded as `T` when `code == 0`; a rejection carrying data
/// of another shape still classifies by its code.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<Envelope<T>> {
    let raw: Envelope<serde_json::Value> = serde_json::from_str(body).map_err(|e| {
        AuthError::MalformedResponse(format!("Failed to decode envelope: {}", e))
    })?;

    let data = match raw.data {
        Some(value) if raw.code == 0 => Some(serde_json::from_value(value).map_err(|e| {
            AuthError::MalformedResponse(format!("Failed to decode envelope data: {}", e))
        })?),
        _ => None,
    };

    Ok(Envelope {
        code: raw.code,
        message: raw.message,
        data,
    })
}

impl<T> Envelope<T> {
    pub fn classify(self) -> Outcome<T> {
        match self.code {
            0 => Outcome::Success(self.data),
            AUTH_EXPIRED_CODE => Outcome::AuthExpired,
            code => Outcome::RemoteRejected {
                code,
                message: self.message,
            },
        }
    }

    /// Classify, treating an expired token as a plain rejection.
    pub fn into_result(self) -> Result<Option<T>> {
        match self.code {
            0 => Ok(self.data),
            code => Err(AuthError::RemoteRejected {
                code,
                message: self.message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_for(code: i64) -> Outcome<Vec<String>> {
        Envelope::<Vec<String>> {
            code,
            message: String::new(),
            data: None,
        }
        .classify()
    }

    #[test]
    fn test_null_data_is_empty_success() {
        let envelope: Envelope<Vec<String>> = decode(r#"{"code":0,"data":null}"#).unwrap();
        let data = envelope.into_result().unwrap();
        assert!(data.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_missing_data_and_message_are_tolerated() {
        let envelope: Envelope<Vec<String>> = decode(r#"{"code":0}"#).unwrap();
        assert_eq!(envelope.message, "");
        assert_eq!(envelope.classify(), Outcome::Success(None));
    }

    #[test]
    fn test_null_message_is_empty() {
        let envelope: Envelope<Vec<String>> = decode(r#"{"code":0,"message":null,"data":[]}"#).unwrap();
        assert_eq!(envelope.message, "");
    }

    #[test]
    fn test_missing_code_is_malformed() {
        let err = decode::<Vec<String>>(r#"{"message":"ok","data":[]}"#).unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = decode::<Vec<String>>("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[test]
    fn test_wrong_data_shape_is_malformed() {
        let err = decode::<Vec<String>>(r#"{"code":0,"data":{"user":"alice"}}"#).unwrap_err();
        assert!(matches!(err, AuthError::MalformedResponse(_)));
    }

    #[test]
    fn test_rejection_data_shape_is_ignored() {
        let envelope: Envelope<Vec<String>> =
            decode(r#"{"code":403,"message":"token expired","data":{}}"#).unwrap();
        assert_eq!(envelope.classify(), Outcome::AuthExpired);

        let envelope: Envelope<Vec<String>> =
            decode(r#"{"code":2101,"message":"no project","data":"oops"}"#).unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.into_result().unwrap_err().remote_code(), Some(2101));
    }

    #[test]
    fn test_classify_is_total() {
        for code in [-1, 0, 1, 200, 402, 403, 404, 500, 2101, i64::MAX, i64::MIN] {
            match outcome_for(code) {
                Outcome::Success(_) => assert_eq!(code, 0),
                Outcome::AuthExpired => assert_eq!(code, AUTH_EXPIRED_CODE),
                Outcome::RemoteRejected { code: rejected, .. } => {
                    assert_eq!(rejected, code);
                    assert_ne!(code, 0);
                    assert_ne!(code, AUTH_EXPIRED_CODE);
                }
            }
        }
    }

    #[test]
    fn test_rejection_keeps_message() {
        let envelope: Envelope<Vec<String>> =
            decode(r#"{"code":2101,"message":"project not found"}"#).unwrap();
        let err = envelope.into_result().unwrap_err();
        assert_eq!(err.remote_code(), Some(2101));
        assert!(err.to_string().contains("project not found"));
    }

    #[test]
    fn test_expired_into_result_is_rejection_403() {
        let envelope: Envelope<Vec<String>> = decode(r#"{"code":403,"message":"token expired"}"#).unwrap();
        assert_eq!(envelope.into_result().unwrap_err().remote_code(), Some(403));
    }
}
