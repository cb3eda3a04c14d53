//! Client-credentials token source backed by the authorization API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::AuthConfig;
use crate::envelope;
use crate::error::{AuthError, Result};
use crate::token_store::CredentialSource;
use crate::transport::HttpTransport;
use crate::types::{AccessToken, ServiceIdentity};

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: AccessToken,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchanges a service's app code and secret for an access token via
/// `GET /oauth/token?grant_type=client_credentials`.
pub struct HttpCredentialSource {
    config: Arc<AuthConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl HttpCredentialSource {
    pub fn new(config: AuthConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self, identity: &ServiceIdentity) -> Result<AccessToken> {
        let credential = self.config.credential(identity).ok_or_else(|| {
            AuthError::credential_fetch(identity, "no app credential configured")
        })?;

        let mut url = self.config.endpoint(&["oauth", "token"])?;
        url.query_pairs_mut()
            .append_pair("grant_type", "client_credentials")
            .append_pair("app_code", &credential.app_code)
            .append_pair("app_secret", &credential.app_secret);

        // The URL carries the secret; only the path is logged.
        let response = self.transport.get(&url).await.map_err(|e| {
            error!(service = %identity, error = %e, "Token request failed");
            AuthError::credential_fetch(identity, e.to_string())
        })?;

        let grant = envelope::decode::<TokenGrant>(&response.body)
            .and_then(|envelope| envelope.into_result())
            .map_err(|e| {
                error!(
                    service = %identity,
                    status = response.status,
                    body = %response.body,
                    "Failed to get access token"
                );
                AuthError::credential_fetch(
                    identity,
                    format!("HTTP {} from {}: {}", response.status, url.path(), e),
                )
            })?
            .ok_or_else(|| {
                error!(service = %identity, body = %response.body, "Token response carried no data");
                AuthError::credential_fetch(identity, "token response carried no data")
            })?;

        debug!(service = %identity, expires_in = ?grant.expires_in, "Access token granted");
        Ok(grant.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_dependencies::MockTransport;
    use serde_json::json;

    const TOKEN_PATH: &str = "/oauth/token";

    fn source(transport: &Arc<MockTransport>) -> HttpCredentialSource {
        let config = AuthConfig::new("http://auth.local")
            .unwrap()
            .with_credential(ServiceIdentity::pipeline(), "bk_ci", "s3cret");
        HttpCredentialSource::new(config, transport.clone())
    }

    #[tokio::test]
    async fn test_fetch_sends_app_credentials() {
        let transport = Arc::new(MockTransport::new().with_json(
            TOKEN_PATH,
            json!({"code": 0, "data": {"access_token": "abc", "expires_in": 7200}}),
        ));

        let token = source(&transport)
            .fetch(&ServiceIdentity::pipeline())
            .await
            .unwrap();

        assert_eq!(token.as_str(), "abc");
        let url = &transport.calls()[0];
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("grant_type".into(), "client_credentials".into())));
        assert!(query.contains(&("app_code".into(), "bk_ci".into())));
        assert!(query.contains(&("app_secret".into(), "s3cret".into())));
    }

    #[tokio::test]
    async fn test_unknown_identity_fails_without_request() {
        let transport = Arc::new(MockTransport::new());

        let err = source(&transport)
            .fetch(&ServiceIdentity::ticket())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::CredentialFetch { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_rejection_becomes_credential_error() {
        let transport = Arc::new(
            MockTransport::new().with_json(TOKEN_PATH, json!({"code": 1, "message": "bad secret"})),
        );

        let err = source(&transport)
            .fetch(&ServiceIdentity::pipeline())
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::CredentialFetch { .. }));
        assert!(err.to_string().contains("bad secret"));
    }

    #[tokio::test]
    async fn test_missing_data_is_credential_error() {
        let transport = Arc::new(MockTransport::new().with_json(TOKEN_PATH, json!({"code": 0})));

        let err = source(&transport)
            .fetch(&ServiceIdentity::pipeline())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CredentialFetch { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_is_credential_error() {
        let transport = Arc::new(MockTransport::new().with_failure(TOKEN_PATH, "timed out"));

        let err = source(&transport)
            .fetch(&ServiceIdentity::pipeline())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CredentialFetch { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
