//! Request-time admission control.
//!
//! [`RouteGuard::decide`] maps a request path and the caller's session to a
//! navigation [`Decision`]. It is pure: session lookup happens in the Axum
//! layer ([`crate::middleware::route_guard`]), which skips the lookup entirely
//! for bypassed paths.
//!
//! Prefix lists are segment-aware: `/auth` matches `/auth` and `/auth/signin`
//! but not `/authors`, and `/` matches only the root.

use crate::session::SessionData;
use crate::types::{Role, User};

pub const SIGNIN_PATH: &str = "/auth/signin";
pub const ADMISSION_PATH: &str = "/admission";
pub const ADMISSION_FORM_PATH: &str = "/admission/form";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const UPDATE_APPLICATION_FORM_PATH: &str = "/dashboard/update-application-form";

/// Outcome of the guard for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Redirect(String),
}

impl Decision {
    fn redirect(to: impl Into<String>) -> Self {
        Self::Redirect(to.into())
    }

    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Proceed => None,
            Self::Redirect(to) => Some(to),
        }
    }
}

/// Routing category of a path. Every path falls in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Static assets and `/api/*`; never guarded.
    Bypass,
    Public,
    /// Role-scoped subtree under `/dashboard`.
    Dashboard,
    /// Requires a session.
    Protected,
    /// Anything else. Open to anonymous callers.
    Unlisted,
}

/// Static prefix lists that drive [`RouteClass`] assignment.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub bypass_prefixes: Vec<String>,
    /// Lowercase file extensions, without the dot.
    pub bypass_extensions: Vec<String>,
    pub public: Vec<String>,
    pub protected: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }

        Self {
            bypass_prefixes: owned(&[
                "/api",
                "/_next/static",
                "/_next/image",
                "/images",
                "/favicon.ico",
            ]),
            bypass_extensions: owned(&["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "avif"]),
            public: owned(&[
                "/",
                "/auth/signin",
                "/auth/signup",
                "/auth/forgot-password",
                "/auth/reset-password",
                "/about",
                "/programmes",
                "/contact",
            ]),
            protected: owned(&["/dashboard", "/admission", "/payment", "/profile", "/lms"]),
        }
    }
}

impl RouteTable {
    #[must_use]
    pub fn is_bypassed(&self, path: &str) -> bool {
        let path = normalize(path);
        if self.bypass_prefixes.iter().any(|p| matches_prefix(path, p)) {
            return true;
        }
        extension(path).is_some_and(|ext| {
            self.bypass_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize(path);
        if self.is_bypassed(path) {
            RouteClass::Bypass
        } else if self.public.iter().any(|p| matches_prefix(path, p)) {
            RouteClass::Public
        } else if matches_prefix(path, DASHBOARD_PATH) {
            RouteClass::Dashboard
        } else if self.protected.iter().any(|p| matches_prefix(path, p)) {
            RouteClass::Protected
        } else {
            RouteClass::Unlisted
        }
    }
}

/// Route guard policy: the route table plus the admission-flow flag.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    table: RouteTable,
    sandwich_mode: bool,
}

impl RouteGuard {
    #[must_use]
    pub fn new(table: RouteTable, sandwich_mode: bool) -> Self {
        Self {
            table,
            sandwich_mode,
        }
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    #[must_use]
    pub fn sandwich_mode(&self) -> bool {
        self.sandwich_mode
    }

    /// Decide whether `path` may proceed for the holder of `session`.
    ///
    /// Expired sessions count as anonymous. Rules are evaluated in order and
    /// the first match wins.
    ///
    /// `path` is taken as given; run raw request paths through
    /// [`canonical_path`] first.
    #[must_use]
    pub fn decide(&self, path: &str, session: Option<&SessionData>) -> Decision {
        let path = normalize(path);
        let class = self.table.classify(path);
        if class == RouteClass::Bypass {
            return Decision::Proceed;
        }

        let user = session.and_then(SessionData::active_user);
        let role = user.and_then(|u| u.role);

        if class == RouteClass::Public {
            return match role {
                Some(role) if role != Role::Student => Decision::redirect(role.dashboard_path()),
                _ => Decision::Proceed,
            };
        }

        let Some(user) = user else {
            return match class {
                RouteClass::Dashboard | RouteClass::Protected => Decision::redirect(SIGNIN_PATH),
                _ => Decision::Proceed,
            };
        };

        if path == ADMISSION_FORM_PATH {
            return if role == Some(Role::Student) && user.is_applied {
                Decision::redirect(ADMISSION_PATH)
            } else {
                Decision::Proceed
            };
        }

        if class == RouteClass::Dashboard {
            return self.decide_dashboard(path, user, role);
        }

        Decision::Proceed
    }

    /// Where a freshly signed-in user should land.
    #[must_use]
    pub fn landing_path(&self, user: &User) -> String {
        match user.role {
            Some(Role::Student) if !self.sandwich_mode && !user.is_applied => {
                ADMISSION_PATH.to_string()
            }
            Some(role) => role.dashboard_path(),
            None => "/".to_string(),
        }
    }

    fn decide_dashboard(&self, path: &str, user: &User, role: Option<Role>) -> Decision {
        // No canonical dashboard exists for an unrecognized role.
        let Some(role) = role else {
            return Decision::redirect(SIGNIN_PATH);
        };

        let canonical = role.dashboard_path();
        let is_update_form = matches_prefix(path, UPDATE_APPLICATION_FORM_PATH);

        if is_update_form && !matches!(role, Role::Student | Role::Admin) {
            return Decision::Redirect(canonical);
        }

        if !self.sandwich_mode && role == Role::Student && !user.is_applied {
            return Decision::redirect(ADMISSION_PATH);
        }

        let sub_path = path.split('/').nth(2).unwrap_or_default().to_ascii_lowercase();
        if sub_path != role.path_segment() && path != canonical && !is_update_form {
            return Decision::Redirect(canonical);
        }

        Decision::Proceed
    }
}

/// Canonical form of a raw request path, as a file server would resolve it.
///
/// Percent-decodes once, drops empty and `.` segments, and resolves `..`.
/// Returns `None` for paths that are not valid UTF-8 once decoded or that
/// climb above the root.
#[must_use]
pub fn canonical_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

/// Strip a trailing slash; the root stays `/`.
fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn extension(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_prefix_is_segment_aware() {
        assert!(matches_prefix("/auth", "/auth"));
        assert!(matches_prefix("/auth/signin", "/auth"));
        assert!(!matches_prefix("/authors", "/auth"));
        assert!(matches_prefix("/", "/"));
        assert!(!matches_prefix("/dashboard", "/"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/dashboard/"), "/dashboard");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn test_canonical_path() {
        assert_eq!(canonical_path("/dashboard/admin").as_deref(), Some("/dashboard/admin"));
        assert_eq!(canonical_path("/%64ashboard/admin").as_deref(), Some("/dashboard/admin"));
        assert_eq!(canonical_path("/dashboard%2Fadmin").as_deref(), Some("/dashboard/admin"));
        assert_eq!(canonical_path("//dashboard//admin/").as_deref(), Some("/dashboard/admin"));
        assert_eq!(
            canonical_path("/images/../dashboard/./admin").as_deref(),
            Some("/dashboard/admin")
        );
        assert_eq!(canonical_path("/").as_deref(), Some("/"));
        assert_eq!(canonical_path("").as_deref(), Some("/"));
        assert_eq!(canonical_path("/../etc/passwd"), None);
        assert_eq!(canonical_path("/%2e%2e/secret"), None);
        assert_eq!(canonical_path("/%FF"), None);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/images/logo.png"), Some("png"));
        assert_eq!(extension("/files/.hidden"), None);
        assert_eq!(extension("/dashboard/admin"), None);
    }

    #[test]
    fn test_landing_path() {
        let guard = RouteGuard::default();
        let student = User::new("s", Some(Role::Student));
        assert_eq!(guard.landing_path(&student), ADMISSION_PATH);
        assert_eq!(
            guard.landing_path(&student.clone().with_applied(true)),
            "/dashboard/student"
        );
        assert_eq!(
            RouteGuard::new(RouteTable::default(), true).landing_path(&student),
            "/dashboard/student"
        );
        assert_eq!(
            guard.landing_path(&User::new("t", Some(Role::Teacher))),
            "/dashboard/teacher"
        );
        assert_eq!(guard.landing_path(&User::new("x", None)), "/");
    }

    #[test]
    fn test_classify() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/images/logo.png"), RouteClass::Bypass);
        assert_eq!(table.classify("/api/session"), RouteClass::Bypass);
        assert_eq!(table.classify("/uploads/Photo.JPG"), RouteClass::Bypass);
        assert_eq!(table.classify("/"), RouteClass::Public);
        assert_eq!(table.classify("/auth/signin"), RouteClass::Public);
        assert_eq!(table.classify("/auth/signout"), RouteClass::Unlisted);
        assert_eq!(table.classify("/dashboard/admin"), RouteClass::Dashboard);
        assert_eq!(table.classify("/admission/form"), RouteClass::Protected);
        assert_eq!(table.classify("/news/2024"), RouteClass::Unlisted);
    }
}
