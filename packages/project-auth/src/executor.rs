//! Typed remote call with envelope decoding and refresh-on-expiry.
//!
//! A call obtains the service token, sends one GET, and classifies the
//! envelope. An expired token (envelope code 403) triggers exactly one
//! refresh followed by exactly one retry; whatever the retry yields is final.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::AuthConfig;
use crate::envelope::{self, Envelope, Outcome, AUTH_EXPIRED_CODE};
use crate::error::{AuthError, Result};
use crate::token_store::TokenStore;
use crate::transport::{HttpTransport, RemoteRequest};
use crate::types::{AccessToken, ServiceIdentity};

struct Reply<T> {
    envelope: Envelope<T>,
    body: String,
}

#[derive(Clone)]
pub struct RemoteCallExecutor {
    config: Arc<AuthConfig>,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
}

impl RemoteCallExecutor {
    pub fn new(config: AuthConfig, transport: Arc<dyn HttpTransport>, tokens: TokenStore) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            tokens,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Perform `request` for `identity` and return the envelope data.
    ///
    /// The URL is rebuilt with the current token on every attempt.
    pub async fn call<T: DeserializeOwned>(
        &self,
        identity: &ServiceIdentity,
        request: &RemoteRequest,
    ) -> Result<Option<T>> {
        let token = self.tokens.get_token(identity).await?;
        let reply = self.attempt::<T>(identity, request, &token).await?;

        let reply = match reply.envelope.classify() {
            Outcome::Success(data) => return Ok(data),
            Outcome::RemoteRejected { code, message } => {
                error!(
                    service = %identity,
                    path = %request.path(),
                    code,
                    body = %reply.body,
                    "Authorization API rejected request"
                );
                return Err(AuthError::RemoteRejected { code, message });
            }
            Outcome::AuthExpired => {
                warn!(
                    service = %identity,
                    path = %request.path(),
                    body = %reply.body,
                    "Access token expired, refreshing and retrying once"
                );
                // Refresh completes before the retry is built.
                let fresh = self.tokens.refresh_if_stale(identity, &token).await?;
                self.attempt::<T>(identity, request, &fresh).await?
            }
        };

        match reply.envelope.code {
            0 => Ok(reply.envelope.data),
            code => {
                if code == AUTH_EXPIRED_CODE {
                    error!(
                        service = %identity,
                        path = %request.path(),
                        body = %reply.body,
                        "Access token rejected again after refresh"
                    );
                } else {
                    error!(
                        service = %identity,
                        path = %request.path(),
                        code,
                        body = %reply.body,
                        "Authorization API rejected retried request"
                    );
                }
                Err(AuthError::RemoteRejected {
                    code,
                    message: reply.envelope.message,
                })
            }
        }
    }

    /// Like [`call`](Self::call) for list endpoints; absent data is an empty list.
    pub async fn call_list<T: DeserializeOwned>(
        &self,
        identity: &ServiceIdentity,
        request: &RemoteRequest,
    ) -> Result<Vec<T>> {
        Ok(self
            .call::<Vec<T>>(identity, request)
            .await?
            .unwrap_or_default())
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        identity: &ServiceIdentity,
        request: &RemoteRequest,
        token: &AccessToken,
    ) -> Result<Reply<T>> {
        let url = request.to_url(&self.config, token)?;
        debug!(service = %identity, path = %request.path(), "Calling authorization API");

        let response = match self.transport.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    service = %identity,
                    path = %request.path(),
                    error = %err,
                    "Authorization API request failed"
                );
                return Err(err);
            }
        };

        let decoded = envelope::decode::<T>(&response.body);
        match decoded {
            Ok(envelope) => Ok(Reply {
                envelope,
                body: response.body,
            }),
            Err(err) if !response.is_success() => {
                error!(
                    service = %identity,
                    path = %request.path(),
                    status = response.status,
                    body = %response.body,
                    "Authorization API returned an error status"
                );
                Err(AuthError::Transport(format!(
                    "HTTP {} from {}: {}",
                    response.status,
                    request.path(),
                    err
                )))
            }
            Err(err) => {
                error!(
                    service = %identity,
                    path = %request.path(),
                    body = %response.body,
                    error = %err,
                    "Authorization API returned an undecodable body"
                );
                Err(err)
            }
        }
    }
}
