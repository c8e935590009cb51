use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{PortalConfig, PortalSettings};
use crate::api::ApiClient;
use crate::guard::RouteGuard;
use crate::session::SessionStore;

/// Shared state for the route guard and portal handlers.
pub struct PortalState<S> {
    pub(super) client: Arc<ApiClient>,
    pub(super) store: Arc<S>,
    pub(super) guard: Arc<RouteGuard>,
    pub(super) settings: PortalSettings,
}

impl<S: SessionStore> PortalState<S> {
    #[must_use]
    pub fn new(config: PortalConfig, store: S) -> Self {
        let guard = RouteGuard::new(
            config.settings.route_table.clone(),
            config.settings.sandwich_mode,
        );
        Self {
            client: Arc::new(config.client),
            store: Arc::new(store),
            guard: Arc::new(guard),
            settings: config.settings,
        }
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for PortalState<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: self.store.clone(),
            guard: self.guard.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore> FromRef<PortalState<S>> for Key {
    fn from_ref(state: &PortalState<S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
