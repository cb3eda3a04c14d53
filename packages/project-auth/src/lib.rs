//! Project authorization client
//!
//! Resolves project membership, role groups and per-user project visibility
//! through a remote authorization API. Every call carries a per-service
//! access token from a shared [`TokenStore`]; when the API reports the token
//! as expired, the token is refreshed once and the call retried once.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use project_auth::{
//!     AuthConfig, HttpCredentialSource, ProjectDirectoryClient, RemoteCallExecutor,
//!     ReqwestTransport, ServiceIdentity, TokenStore,
//! };
//!
//! let config = AuthConfig::from_env()?;
//! let transport = Arc::new(ReqwestTransport::from_config(&config)?);
//! let tokens = TokenStore::new(Arc::new(HttpCredentialSource::new(config.clone(), transport.clone())));
//! let directory = ProjectDirectoryClient::new(RemoteCallExecutor::new(config, transport, tokens));
//!
//! let users = directory
//!     .list_project_users(&ServiceIdentity::pipeline(), "demo", None)
//!     .await?;
//! ```
//!
//! # Visible Projects
//!
//! ```rust,ignore
//! let directory = directory.with_filter(ProjectFilter::new(Arc::new(my_project_service)));
//! let projects = directory
//!     .list_user_available_projects(&ServiceIdentity::pipeline(), "alice")
//!     .await?;
//! ```

pub mod config;
pub mod credentials;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod filter;
pub mod test_dependencies;
pub mod token_store;
pub mod transport;
pub mod types;

pub use config::{AppCredential, AuthConfig};
pub use credentials::HttpCredentialSource;
pub use directory::ProjectDirectoryClient;
pub use envelope::{Envelope, Outcome, AUTH_EXPIRED_CODE};
pub use error::{AuthError, Result};
pub use executor::RemoteCallExecutor;
pub use filter::{filter_available, ProjectFilter, ProjectMetadataLookup};
pub use token_store::{CredentialSource, TokenStore};
pub use transport::{HttpTransport, RawResponse, RemoteRequest, ReqwestTransport};
pub use types::*;
