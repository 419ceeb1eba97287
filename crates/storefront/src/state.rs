//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{BackendClient, BackendError};
use crate::cart::CartEngine;
use crate::config::StorefrontConfig;

/// The engine as wired in production: both sides talk to the back office.
pub type StoreCartEngine = CartEngine<BackendClient, BackendClient>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    engine: StoreCartEngine,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the back office client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, BackendError> {
        let backend = BackendClient::new(&config.backend)?;
        let engine = CartEngine::new(backend.clone(), backend.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                engine,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the back office client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the cart engine.
    #[must_use]
    pub fn engine(&self) -> &StoreCartEngine {
        &self.inner.engine
    }
}
