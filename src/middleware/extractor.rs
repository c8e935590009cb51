use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Key;

use super::cookies;
use super::error::PortalError;
use super::state::PortalState;
use crate::session::{SessionData, SessionStore};
use crate::types::{Role, SessionKey, User};

/// Live session of the caller, extracted from the private session cookie.
///
/// Use as an Axum extractor in `/api` handlers, which sit outside the route
/// guard. Rejects with `401` when no live session exists.
///
/// ```rust,ignore
/// async fn whoami(session: CurrentSession) -> Result<Json<User>, PortalError> {
///     Ok(Json(session.user()?.clone()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub key: SessionKey,
    pub data: SessionData,
}

impl CurrentSession {
    /// # Errors
    ///
    /// [`PortalError::SessionExpired`] if the session no longer holds a user.
    pub fn user(&self) -> Result<&User, PortalError> {
        self.data.active_user().ok_or(PortalError::SessionExpired)
    }

    /// # Errors
    ///
    /// [`PortalError::SessionExpired`] if the session holds no bearer token.
    pub fn access_token(&self) -> Result<&str, PortalError> {
        self.data
            .access_token
            .as_deref()
            .ok_or(PortalError::SessionExpired)
    }

    /// The signed-in user, provided their role is one of `allowed`.
    ///
    /// # Errors
    ///
    /// [`PortalError::Forbidden`] for any other role, including unknown ones.
    pub fn require_role(&self, allowed: &[Role]) -> Result<&User, PortalError> {
        let user = self.user()?;
        match user.role {
            Some(role) if allowed.contains(&role) => Ok(user),
            _ => Err(PortalError::Forbidden),
        }
    }
}

impl<S: SessionStore> FromRequestParts<PortalState<S>> for CurrentSession {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &PortalState<S>,
    ) -> Result<Self, Self::Rejection> {
        let jar: PrivateCookieJar<Key> = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| PortalError::Unauthenticated)?;

        let key = cookies::session_key(&jar, &state.settings.session_cookie_name)
            .ok_or(PortalError::Unauthenticated)?;

        let data = state
            .store
            .get(&key)
            .await
            .map_err(|e| PortalError::Store(e.to_string()))?
            .filter(|data| !data.is_expired())
            .ok_or(PortalError::SessionExpired)?;

        Ok(Self { key, data })
    }
}

/// Look up the caller's session without rejecting.
///
/// Store failures are logged and read as "no session", so callers always get
/// an answer.
pub async fn resolve_session<S: SessionStore>(
    store: &S,
    jar: &PrivateCookieJar,
    cookie_name: &str,
) -> Option<CurrentSession> {
    let key = cookies::session_key(jar, cookie_name)?;
    match store.get(&key).await {
        Ok(Some(data)) => Some(CurrentSession { key, data }),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Session lookup failed; treating request as anonymous");
            None
        }
    }
}
