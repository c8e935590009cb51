//! Axum integration: route guard, session extractor and portal routes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use admission_portal::MemorySessionStore;
//! use admission_portal::middleware::{PortalConfig, PortalState, portal_routes, protect};
//!
//! // 1. Configure from environment
//! let config = PortalConfig::from_env()?;
//!
//! // 2. Build shared state around a session store
//! let state = PortalState::new(config, MemorySessionStore::new());
//!
//! // 3. Mount portal routes next to your pages, then guard everything
//! let app = protect(pages.merge(portal_routes(state.clone())), state);
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod guard;
mod routes;
mod state;

pub use config::PortalConfig;
pub use error::PortalError;
pub use extractor::{CurrentSession, resolve_session};
pub use guard::{protect, route_guard};
pub use routes::portal_routes;
pub use state::PortalState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
