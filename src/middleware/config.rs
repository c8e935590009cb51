use axum_extra::extract::cookie::Key;
use time::Duration;
use url::Url;

use super::error::PortalError;
use crate::api::{ApiClient, ApiConfig};
use crate::guard::RouteTable;

/// Shared portal settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct PortalSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) sandwich_mode: bool,
    pub(crate) lms_url: Option<Url>,
    pub(crate) route_table: RouteTable,
}

impl PortalSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__portal_session".into(),
            session_ttl: Duration::hours(24),
            secure_cookies: true,
            sandwich_mode: false,
            lms_url: None,
            route_table: RouteTable::default(),
        }
    }
}

/// Portal configuration.
///
/// Required field (`client`) is a constructor parameter, so it cannot be missing at runtime.
///
/// Use [`from_env()`](PortalConfig::from_env) for convention-based setup,
/// or [`new()`](PortalConfig::new) with `with_*` methods for full control.
pub struct PortalConfig {
    pub(super) client: ApiClient,
    pub(super) settings: PortalSettings,
}

impl PortalConfig {
    /// Create config with the required `ApiClient`.
    ///
    /// All optional fields use sensible defaults. Override with `with_*` methods.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            settings: PortalSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `PORTAL_API_URL`: remote API base URL
    ///
    /// # Optional env vars
    /// - `PORTAL_API_TIMEOUT_SECS`: per-request timeout for remote calls (default 30)
    /// - `PORTAL_LMS_URL`: LMS root URL behind `/lms`
    /// - `SANDWICH_MODE`: `"1"` or `"true"` lets students into dashboards before applying
    /// - `SESSION_TTL_HOURS`: session lifetime (default 24)
    /// - `DEV_MODE`: `"1"` or `"true"` disables secure cookies
    /// - `COOKIE_KEY`: Cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, PortalError> {
        let api_url: Url = std::env::var("PORTAL_API_URL")
            .map_err(|_| PortalError::Config("PORTAL_API_URL is required".into()))?
            .parse()
            .map_err(|e| PortalError::Config(format!("PORTAL_API_URL: {e}")))?;

        let mut api_config = ApiConfig::new(api_url);
        if let Ok(secs) = std::env::var("PORTAL_API_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| PortalError::Config(format!("PORTAL_API_TIMEOUT_SECS: {e}")))?;
            api_config = api_config.with_timeout(std::time::Duration::from_secs(secs));
        }

        let mut config = Self::new(ApiClient::new(api_config));

        if let Ok(url_str) = std::env::var("PORTAL_LMS_URL") {
            let url: Url = url_str
                .parse()
                .map_err(|e| PortalError::Config(format!("PORTAL_LMS_URL: {e}")))?;
            config = config.with_lms_url(url);
        }

        if let Ok(hours) = std::env::var("SESSION_TTL_HOURS") {
            let hours: i64 = hours
                .parse()
                .ok()
                .filter(|h| *h > 0)
                .ok_or_else(|| {
                    PortalError::Config("SESSION_TTL_HOURS must be a positive integer".into())
                })?;
            config = config.with_session_ttl(Duration::hours(hours));
        }

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                PortalError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => {
                tracing::warn!("COOKIE_KEY not set; sessions will not survive a restart");
                Key::generate()
            }
        };

        Ok(config
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!env_flag("DEV_MODE"))
            .with_sandwich_mode(env_flag("SANDWICH_MODE")))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.settings.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Let students reach their dashboard before they have applied.
    #[must_use]
    pub fn with_sandwich_mode(mut self, enabled: bool) -> Self {
        self.settings.sandwich_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_lms_url(mut self, url: Url) -> Self {
        self.settings.lms_url = Some(url);
        self
    }

    #[must_use]
    pub fn with_route_table(mut self, table: RouteTable) -> Self {
        self.settings.route_table = table;
        self
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.settings.session_cookie_name
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.settings.session_ttl
    }

    #[must_use]
    pub fn sandwich_mode(&self) -> bool {
        self.settings.sandwich_mode
    }
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(ApiConfig::new("http://127.0.0.1:9/api".parse().unwrap()))
    }

    #[test]
    fn test_defaults() {
        let config = PortalConfig::new(client());
        assert_eq!(config.session_cookie_name(), "__portal_session");
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert!(!config.sandwich_mode());
        assert!(config.settings.secure_cookies);
        assert!(config.settings.lms_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = PortalConfig::new(client())
            .with_session_cookie_name("sid")
            .with_session_ttl(Duration::hours(2))
            .with_sandwich_mode(true)
            .with_secure_cookies(false)
            .with_lms_url("https://lms.example.edu".parse().unwrap());

        assert_eq!(config.session_cookie_name(), "sid");
        assert_eq!(config.session_ttl(), Duration::hours(2));
        assert!(config.sandwich_mode());
        assert!(!config.settings.secure_cookies);
        assert_eq!(
            config.settings.lms_url.as_ref().map(Url::as_str),
            Some("https://lms.example.edu/")
        );
    }
}
