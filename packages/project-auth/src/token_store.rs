//! Per-service access token cache with coalesced refresh.
//!
//! Tokens are fetched lazily on first use and replaced only by a refresh. Each
//! service identity has its own slot, so a slow fetch for one identity never
//! blocks callers of another.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = TokenStore::new(Arc::new(HttpCredentialSource::new(config, transport)));
//!
//! let token = store.get_token(&ServiceIdentity::pipeline()).await?;
//! // ... upstream answers 403 ...
//! let fresh = store.refresh_if_stale(&ServiceIdentity::pipeline(), &token).await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, ServiceIdentity};

/// Source of access tokens (the upstream credential endpoint).
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self, identity: &ServiceIdentity) -> Result<AccessToken>;
}

#[derive(Default)]
struct SlotState {
    token: Option<AccessToken>,
    fetched_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Slot {
    /// Bumped after every successful fetch. Read without the lock.
    generation: AtomicU64,
    state: Mutex<SlotState>,
}

/// Explicitly constructed token cache. Clones share the same slots.
#[derive(Clone)]
pub struct TokenStore {
    source: Arc<dyn CredentialSource>,
    slots: Arc<RwLock<HashMap<ServiceIdentity, Arc<Slot>>>>,
}

impl TokenStore {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            source,
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the cached token, fetching it on first use.
    pub async fn get_token(&self, identity: &ServiceIdentity) -> Result<AccessToken> {
        let slot = self.slot(identity).await;
        let mut state = slot.state.lock().await;
        if let Some(token) = &state.token {
            return Ok(token.clone());
        }

        self.replace(identity, &slot, &mut state).await
    }

    /// Fetch a new token and replace the cached one.
    ///
    /// Callers that queue up behind an in-flight refresh receive its result
    /// instead of issuing their own upstream call.
    pub async fn refresh_token(&self, identity: &ServiceIdentity) -> Result<AccessToken> {
        let slot = self.slot(identity).await;
        let observed = slot.generation.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if slot.generation.load(Ordering::Acquire) != observed {
            if let Some(token) = &state.token {
                debug!(service = %identity, "Refresh coalesced with concurrent refresh");
                return Ok(token.clone());
            }
        }

        self.replace(identity, &slot, &mut state).await
    }

    /// Refresh only if `stale` is still the cached token.
    ///
    /// Used after the upstream rejects `stale`: if another caller already
    /// replaced it, the replacement is returned without a fetch.
    pub async fn refresh_if_stale(
        &self,
        identity: &ServiceIdentity,
        stale: &AccessToken,
    ) -> Result<AccessToken> {
        let slot = self.slot(identity).await;
        let mut state = slot.state.lock().await;

        if let Some(current) = &state.token {
            if current != stale {
                debug!(service = %identity, "Token already refreshed by another caller");
                return Ok(current.clone());
            }
        }

        self.replace(identity, &slot, &mut state).await
    }

    /// Drop the cached token. The next `get_token` fetches again.
    pub async fn invalidate(&self, identity: &ServiceIdentity) {
        let slot = {
            let slots = self.slots.read().await;
            slots.get(identity).cloned()
        };

        if let Some(slot) = slot {
            let mut state = slot.state.lock().await;
            state.token = None;
            state.fetched_at = None;
            info!(service = %identity, "Access token invalidated");
        }
    }

    /// Currently cached token, without fetching.
    pub async fn cached(&self, identity: &ServiceIdentity) -> Option<AccessToken> {
        let slot = self.slots.read().await.get(identity).cloned()?;
        let state = slot.state.lock().await;
        state.token.clone()
    }

    pub async fn fetched_at(&self, identity: &ServiceIdentity) -> Option<DateTime<Utc>> {
        let slot = self.slots.read().await.get(identity).cloned()?;
        let state = slot.state.lock().await;
        state.fetched_at
    }

    async fn slot(&self, identity: &ServiceIdentity) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().await.get(identity) {
            return slot.clone();
        }

        let mut slots = self.slots.write().await;
        slots.entry(identity.clone()).or_default().clone()
    }

    /// Fetch and store while holding the slot lock. A failed fetch leaves the
    /// previous value in place.
    async fn replace(
        &self,
        identity: &ServiceIdentity,
        slot: &Slot,
        state: &mut SlotState,
    ) -> Result<AccessToken> {
        let token = match self.source.fetch(identity).await {
            Ok(token) if token.is_empty() => {
                error!(service = %identity, "Credential source returned an empty token");
                return Err(AuthError::credential_fetch(identity, "empty access token"));
            }
            Ok(token) => token,
            Err(err) => {
                error!(service = %identity, error = %err, "Failed to fetch access token");
                return Err(match err {
                    AuthError::CredentialFetch { .. } => err,
                    other => AuthError::credential_fetch(identity, other.to_string()),
                });
            }
        };

        state.token = Some(token.clone());
        state.fetched_at = Some(Utc::now());
        let generation = slot.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(service = %identity, generation, "Fetched access token");

        Ok(token)
    }
}
