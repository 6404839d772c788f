//! Central application state shared across requests.

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::run_store::RunStore,
    error::ServiceError,
    services::{
        identity::{IdentityProvider, TokenIsUserId},
        rate_limit::{InMemoryStartThrottle, StartThrottle},
    },
};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing the installed store, the start throttle,
/// the identity provider, and configuration.
pub struct AppState {
    run_store: RwLock<Option<Arc<dyn RunStore>>>,
    throttle: Arc<dyn StartThrottle>,
    identity: Arc<dyn IdentityProvider>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed, with the in-process throttle and the development identity
    /// provider.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_components(
            config,
            Arc::new(InMemoryStartThrottle::new()),
            Arc::new(TokenIsUserId),
        )
    }

    /// Construct state with explicit throttle and identity implementations.
    pub fn with_components(
        config: AppConfig,
        throttle: Arc<dyn StartThrottle>,
        identity: Arc<dyn IdentityProvider>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            run_store: RwLock::new(None),
            throttle,
            identity,
            config,
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current run store, if one is installed.
    pub async fn run_store(&self) -> Option<Arc<dyn RunStore>> {
        let guard = self.run_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current run store or fail with a degraded-mode error.
    pub async fn require_run_store(&self) -> Result<Arc<dyn RunStore>, ServiceError> {
        self.run_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new run store implementation and leave degraded mode.
    pub async fn set_run_store(&self, store: Arc<dyn RunStore>) {
        {
            let mut guard = self.run_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current run store and enter degraded mode.
    pub async fn clear_run_store(&self) {
        {
            let mut guard = self.run_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Short-window start throttle shared by every start request.
    pub fn throttle(&self) -> &dyn StartThrottle {
        self.throttle.as_ref()
    }

    /// Identity provider resolving player tokens to user ids.
    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.identity.clone()
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
