use std::collections::HashMap;
use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{AuthError, Result};
use crate::types::ServiceIdentity;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// App code and secret a service identity exchanges for an access token.
#[derive(Clone)]
pub struct AppCredential {
    pub app_code: String,
    pub app_secret: String,
}

impl std::fmt::Debug for AppCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredential")
            .field("app_code", &self.app_code)
            .field("app_secret", &"***")
            .finish()
    }
}

/// Client configuration for the authorization service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub credentials: HashMap<ServiceIdentity, AppCredential>,
}

impl AuthConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AuthError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AuthError::Config(format!(
                "base URL '{}' cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credentials: HashMap::new(),
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let base_url = env::var("AUTH_API_URL")
            .map_err(|_| AuthError::Config("AUTH_API_URL must be set".into()))?;
        let mut config = Self::new(&base_url)?;

        if let Ok(raw) = env::var("AUTH_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                AuthError::Config(format!(
                    "AUTH_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    raw
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        match (env::var("AUTH_APP_CODE"), env::var("AUTH_APP_SECRET")) {
            (Ok(code), Ok(secret)) => {
                let identity = env::var("AUTH_SERVICE_CODE")
                    .map(ServiceIdentity::new)
                    .unwrap_or_else(|_| ServiceIdentity::pipeline());
                config = config.with_credential(identity, code, secret);
            }
            (Err(_), Err(_)) => {}
            _ => {
                return Err(AuthError::Config(
                    "AUTH_APP_CODE and AUTH_APP_SECRET must be set together".into(),
                ))
            }
        }

        Ok(config)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_credential(
        mut self,
        identity: ServiceIdentity,
        app_code: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        self.credentials.insert(
            identity,
            AppCredential {
                app_code: app_code.into(),
                app_secret: app_secret.into(),
            },
        );
        self
    }

    pub fn credential(&self, identity: &ServiceIdentity) -> Option<&AppCredential> {
        self.credentials.get(identity)
    }

    /// Append path segments to the base URL, keeping any base path prefix.
    ///
    /// Each segment is percent-encoded; an empty final segment yields a
    /// trailing slash.
    pub fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                AuthError::Config(format!("base URL '{}' cannot carry a path", self.base_url))
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        Ok(url)
    }
}
