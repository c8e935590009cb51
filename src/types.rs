use derive_more::{Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Remote user identifier.
///
/// The backend emits either a JSON string or an integer; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

/// Opaque session identifier carried in the private session cookie.
///
/// Generated by [`generate_session_key`](crate::session::generate_session_key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionKey(pub String);

/// A role string that is not one of the portal roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Portal role. Each role owns exactly one dashboard subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Student,
    Teacher,
    Manager,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Student => "STUDENT",
            Self::Teacher => "TEACHER",
            Self::Manager => "MANAGER",
        }
    }

    /// Lowercase form used as the second segment of dashboard paths.
    #[must_use]
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Manager => "manager",
        }
    }

    /// Canonical dashboard root, e.g. `/dashboard/admin`.
    #[must_use]
    pub fn dashboard_path(&self) -> String {
        format!("/dashboard/{}", self.path_segment())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "STUDENT" => Ok(Self::Student),
            "TEACHER" => Ok(Self::Teacher),
            "MANAGER" => Ok(Self::Manager),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Cached snapshot of the remote user profile.
///
/// The remote backend owns this record; the copy in the session goes stale
/// until `/api/session` refreshes it. Fields the portal does not interpret are
/// kept in `profile` so a refresh round-trip is lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    /// `None` when the backend sent no role or one the portal does not know.
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "truthy")]
    pub is_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuition_status: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: UserId(id.into()),
            role,
            is_applied: false,
            email: None,
            admission_status: None,
            purchase_status: None,
            acceptance_status: None,
            tuition_status: None,
            profile: Map::new(),
        }
    }

    #[must_use]
    pub fn with_applied(mut self, applied: bool) -> Self {
        self.is_applied = applied;
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_admission_status(mut self, status: impl Into<String>) -> Self {
        self.admission_status = Some(status.into());
        self
    }
}

fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Role>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.parse::<Role>() {
        Ok(role) => Some(role),
        Err(e) => {
            tracing::warn!(role = %e.0, "Unrecognized user role");
            None
        }
    }))
}

// Backend flags arrive as bools, 0/1, strings or null.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty()
                || s == "0"
                || s.eq_ignore_ascii_case("false")
                || s.eq_ignore_ascii_case("no"))
        }
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Payment verification flavour, one per fee the portal collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    /// Admission form purchase.
    Purchase,
    Acceptance,
    Tuition,
}

impl PaymentKind {
    /// Remote endpoint suffix for this verification.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Purchase => "payments/verify-purchase",
            Self::Acceptance => "payments/verify-acceptance",
            Self::Tuition => "payments/verify-tuition",
        }
    }
}
