//! Typed catalog of MemBuddy backend operations.
//!
//! ```rust,ignore
//! use membuddy_client::{ApiClient, LoginCredentials};
//!
//! let api = ApiClient::from_env()?;
//! api.login(&LoginCredentials::new("a@b.com", "secret")).await?;
//! let items = api.get_memory_items().await?;
//!
//! // Calls tied to a view that may go away:
//! let view = api.scoped(cancel_token.clone());
//! let item = view.get_memory_item(&"42".into()).await?;
//! ```

mod auth;
pub mod endpoints;
mod memory;
mod review;
mod user;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::guard::Navigator;
use crate::pipeline::RequestPipeline;
use crate::session::SessionStore;

/// MemBuddy backend client. Cheap to clone; clones share the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    pipeline: RequestPipeline,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, Error> {
        let http = config.http_client()?;
        Ok(Self {
            pipeline: RequestPipeline::new(Arc::new(config), session, http),
        })
    }

    /// Config from the environment, session from `MEMBUDDY_SESSION_DIR`
    /// (in-memory when unset).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid env vars and
    /// [`Error::Storage`] if the session directory is unusable.
    pub fn from_env() -> Result<Self, Error> {
        let config = ClientConfig::from_env()?;
        let session = SessionStore::from_config(&config)?;
        Self::new(config, session)
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.pipeline = self.pipeline.with_http_client(http);
        self
    }

    /// Router to send to the login path when the session ends on a 401.
    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.pipeline = self.pipeline.with_navigator(navigator);
        self
    }

    /// Clone whose in-flight calls abort when `cancel` fires.
    #[must_use]
    pub fn scoped(&self, cancel: CancellationToken) -> Self {
        Self {
            pipeline: self.pipeline.scoped(cancel),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.pipeline.session()
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.pipeline.config()
    }

    /// The underlying pipeline, for calls outside this catalog.
    #[must_use]
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }
}
