//! Application state shared across handlers.

use std::sync::Arc;

use chrono::TimeDelta;
use stockroom_core::Username;

use crate::config::ServerConfig;
use crate::services::auth::{AuthService, TokenSigner};
use crate::services::seed::{HttpSeedSource, SourceError};
use crate::store::{CatalogStore, SnapshotFile, StoreError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("seed client: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token lifetime out of range")]
    TokenTtl,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// catalog store, the token signer and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: CatalogStore,
    tokens: TokenSigner,
}

impl AppState {
    /// Open the catalog store and build the application state.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Store` if the snapshot cannot be loaded, which
    /// must stop the process.
    pub fn new(config: ServerConfig) -> Result<Self, StateError> {
        let source = HttpSeedSource::new(config.seed.url.clone(), config.seed.timeout)?;
        let file = SnapshotFile::new(config.snapshot_path.clone());
        let store = CatalogStore::open(file, source, config.store.clone())?;

        let ttl = TimeDelta::from_std(config.auth.token_ttl).map_err(|_| StateError::TokenTtl)?;
        let tokens = TokenSigner::new(config.auth.jwt_secret.clone(), ttl);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog store.
    #[must_use]
    pub fn store(&self) -> &CatalogStore {
        &self.inner.store
    }

    /// Get a reference to the token signer.
    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    /// Usernames whose tokens carry the admin role.
    #[must_use]
    pub fn admin_usernames(&self) -> &[Username] {
        &self.inner.config.auth.admin_usernames
    }

    /// Authentication service over this state's store and signer.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_, HttpSeedSource> {
        AuthService::new(self.store(), self.tokens(), self.admin_usernames())
    }
}
