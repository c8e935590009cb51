use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::types::{Role, User};

/// Per-client session payload.
///
/// Created at sign-in, patched on profile refresh, deleted at sign-out or expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user: Option<User>,
    pub access_token: Option<String>,
    #[serde(rename = "expiresAt", with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl SessionData {
    /// Create a session that expires `ttl` from now.
    #[must_use]
    pub fn new(user: Option<User>, access_token: Option<String>, ttl: Duration) -> Self {
        Self {
            user,
            access_token,
            expires_at: OffsetDateTime::now_utc() + ttl,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    /// The signed-in user, if the session still holds one and has not expired.
    #[must_use]
    pub fn active_user(&self) -> Option<&User> {
        if self.is_expired() {
            return None;
        }
        self.user.as_ref()
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.active_user().and_then(|u| u.role)
    }
}

/// Partial session update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub user: Option<User>,
    pub access_token: Option<String>,
}

impl SessionPatch {
    #[must_use]
    pub fn user(user: User) -> Self {
        Self {
            user: Some(user),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Apply onto an existing payload. Expiry is never extended.
    pub fn apply(self, data: &mut SessionData) {
        if let Some(user) = self.user {
            data.user = Some(user);
        }
        if let Some(token) = self.access_token {
            data.access_token = Some(token);
        }
    }
}
