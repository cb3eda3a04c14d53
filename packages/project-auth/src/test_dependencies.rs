// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into the token store,
// executor and directory client in unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{AuthError, Result};
use crate::filter::ProjectMetadataLookup;
use crate::token_store::CredentialSource;
use crate::transport::{HttpTransport, RawResponse, ACCESS_TOKEN_PARAM};
use crate::types::{AccessToken, ApprovalStatus, ProjectMetadata, ServiceIdentity};

// =============================================================================
// Mock Credential Source
// =============================================================================

/// Hands out scripted tokens in order, then `token-N` once the script runs out.
pub struct MockCredentialSource {
    tokens: Mutex<VecDeque<String>>,
    fetches: AtomicUsize,
    fetched_for: Mutex<Vec<ServiceIdentity>>,
    fail_next: Mutex<Option<String>>,
    delay: Option<Duration>,
}

impl MockCredentialSource {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
            fetched_for: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            delay: None,
        }
    }

    pub fn with_tokens<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens
            .lock()
            .unwrap()
            .extend(tokens.into_iter().map(Into::into));
        self
    }

    /// Simulate a slow credential endpoint.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next fetch fail.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetched_for(&self) -> Vec<ServiceIdentity> {
        self.fetched_for.lock().unwrap().clone()
    }
}

impl Default for MockCredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for MockCredentialSource {
    async fn fetch(&self, identity: &ServiceIdentity) -> Result<AccessToken> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.fetched_for.lock().unwrap().push(identity.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(AuthError::credential_fetch(identity, message));
        }

        let token = self
            .tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("token-{}", n));
        Ok(AccessToken::new(token))
    }
}

// =============================================================================
// Mock Transport
// =============================================================================

type Handler = Box<dyn Fn(&Url) -> Result<RawResponse> + Send + Sync>;

/// Scripted HTTP transport keyed by URL path.
///
/// Scripted responses for a path are consumed in order. Paths with no script
/// left fall through to the handler, if any, and otherwise fail as transport
/// errors.
pub struct MockTransport {
    scripted: Mutex<HashMap<String, VecDeque<Result<RawResponse>>>>,
    handler: Option<Handler>,
    calls: Arc<Mutex<Vec<Url>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(HashMap::new()),
            handler: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a raw response for a path.
    pub fn with_response(self, path: &str, status: u16, body: &str) -> Self {
        self.push(path, Ok(RawResponse::new(status, body)));
        self
    }

    /// Queue an HTTP 200 with a JSON body for a path.
    pub fn with_json(self, path: &str, body: serde_json::Value) -> Self {
        self.push(path, Ok(RawResponse::new(200, body.to_string())));
        self
    }

    /// Queue a transport failure for a path.
    pub fn with_failure(self, path: &str, message: &str) -> Self {
        self.push(path, Err(AuthError::Transport(message.to_string())));
        self
    }

    /// Answer unscripted requests with a closure.
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Url) -> Result<RawResponse> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// All URLs requested, in order.
    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Token sent with each request, in order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|url| token_param(url))
            .collect()
    }

    fn push(&self, path: &str, response: Result<RawResponse>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of the `access_token` query parameter.
pub fn token_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == ACCESS_TOKEN_PARAM)
        .map(|(_, value)| value.into_owned())
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse> {
        self.calls.lock().unwrap().push(url.clone());

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(url.path())
            .and_then(|queue| queue.pop_front());
        if let Some(response) = scripted {
            return response;
        }

        match &self.handler {
            Some(handler) => handler(url),
            None => Err(AuthError::Transport(format!(
                "no scripted response for {}",
                url.path()
            ))),
        }
    }
}

// =============================================================================
// Static Metadata Lookup
// =============================================================================

/// Fixed project metadata, with lookup recording.
pub struct StaticMetadataLookup {
    projects: HashMap<String, ProjectMetadata>,
    lookups: Mutex<Vec<BTreeSet<String>>>,
    failure: Option<String>,
}

impl StaticMetadataLookup {
    pub fn new() -> Self {
        Self {
            projects: HashMap::new(),
            lookups: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    pub fn with_project(
        mut self,
        code: &str,
        name: &str,
        approval_status: ApprovalStatus,
        is_offlined: bool,
    ) -> Self {
        self.projects.insert(
            code.to_string(),
            ProjectMetadata {
                project_code: code.to_string(),
                project_name: name.to_string(),
                approval_status,
                is_offlined,
            },
        );
        self
    }

    /// Fail every lookup.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<BTreeSet<String>> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Default for StaticMetadataLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectMetadataLookup for StaticMetadataLookup {
    async fn lookup(&self, codes: &BTreeSet<String>) -> Result<HashMap<String, ProjectMetadata>> {
        self.lookups.lock().unwrap().push(codes.clone());

        if let Some(message) = &self.failure {
            return Err(AuthError::MetadataLookup(message.clone()));
        }

        Ok(codes
            .iter()
            .filter_map(|code| self.projects.get(code).map(|meta| (code.clone(), meta.clone())))
            .collect())
    }
}
