use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::types::{PaymentKind, User};

/// Remote admission API configuration.
///
/// ```rust,ignore
/// use admission_portal::ApiConfig;
///
/// let config = ApiConfig::new("https://api.example.edu/v1".parse()?)
///     .with_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
}

impl ApiConfig {
    /// Create a configuration rooted at `base_url`.
    ///
    /// Endpoint suffixes are resolved relative to the base, so a missing
    /// trailing slash is added.
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-request timeout (default: 30 s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve an endpoint suffix such as `user/profile` against the base.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the suffix does not form a valid URL.
    pub fn endpoint(&self, suffix: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(suffix.trim_start_matches('/'))?)
    }
}

enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Form),
}

/// One outbound call to the remote API.
pub struct ApiRequest<'a> {
    operation: &'static str,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    access_token: Option<&'a str>,
}

impl<'a> ApiRequest<'a> {
    /// `operation` names the call in logs and errors.
    #[must_use]
    pub fn new(operation: &'static str, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            access_token: None,
        }
    }

    #[must_use]
    pub fn get(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::GET, path)
    }

    #[must_use]
    pub fn post(operation: &'static str, path: impl Into<String>) -> Self {
        Self::new(operation, Method::POST, path)
    }

    #[must_use]
    pub fn bearer(mut self, access_token: &'a str) -> Self {
        self.access_token = Some(access_token);
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn multipart(mut self, form: Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }
}

/// Credentials posted to the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Login endpoint payload.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct LoginResponse {
    #[serde(alias = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub user: Option<User>,
    /// Token lifetime in seconds, when the backend reports one.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Result of a gateway payment verification, passed through as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PaymentVerification {
    #[serde(default, deserialize_with = "status_text")]
    pub status: String,
    #[serde(default, deserialize_with = "message_text")]
    pub message: String,
}

/// Client for the remote admission API.
///
/// Every call attaches the caller's bearer token (when given), forwards to
/// `base_url + suffix`, and normalizes the outcome:
/// - 2xx with a JSON body → `Ok(Some(value))`
/// - 2xx with any other body → `Ok(None)`
/// - non-2xx → [`Error::Api`] carrying the best message found in the body
/// - no response → [`Error::Http`]
#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Forward a request and normalize its response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Api`] on a non-2xx
    /// status, or [`Error::Decode`] if a JSON success body is malformed.
    pub async fn send(&self, request: ApiRequest<'_>) -> Result<Option<Value>, Error> {
        let operation = request.operation;
        let url = self.config.endpoint(&request.path)?;

        let mut builder = self.http.request(request.method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = request.access_token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await.map_err(|e| {
            tracing::error!(operation, error = %e, "Remote API unreachable");
            Error::Http(e)
        })?;

        let response = Self::ensure_success(response, operation).await?;
        if !is_json(response.headers()) {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::Decode(format!("{operation}: {e}")))
    }

    /// Forward a request and decode its (`data`-unwrapped) JSON body as `T`.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`Error::Decode`] when the body is absent
    /// or does not match `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: ApiRequest<'_>) -> Result<T, Error> {
        let operation = request.operation;
        let value = self
            .send(request)
            .await?
            .ok_or_else(|| Error::Decode(format!("{operation}: empty response")))?;
        serde_json::from_value(unwrap_data(value))
            .map_err(|e| Error::Decode(format!("{operation}: {e}")))
    }

    /// Exchange credentials for an access token.
    ///
    /// # Errors
    ///
    /// See [`send_as`](Self::send_as).
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, Error> {
        let body = serde_json::to_value(credentials).map_err(|e| Error::Decode(e.to_string()))?;
        self.send_as(ApiRequest::post("login", "auth/login").json(body))
            .await
    }

    /// Fetch the caller's profile.
    ///
    /// # Errors
    ///
    /// See [`send_as`](Self::send_as).
    pub async fn fetch_profile(&self, access_token: &str) -> Result<User, Error> {
        self.send_as(ApiRequest::get("profile fetch", "user/profile").bearer(access_token))
            .await
    }

    /// Update profile fields; returns the updated profile.
    ///
    /// # Errors
    ///
    /// See [`send_as`](Self::send_as).
    pub async fn update_profile(&self, access_token: &str, fields: Value) -> Result<User, Error> {
        self.send_as(
            ApiRequest::new("profile update", Method::PATCH, "user/profile")
                .bearer(access_token)
                .json(fields),
        )
        .await
    }

    /// Submit an admission application (multipart, may carry documents).
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn submit_application(
        &self,
        access_token: &str,
        form: Form,
    ) -> Result<Option<Value>, Error> {
        self.send(
            ApiRequest::post("application submission", "applications")
                .bearer(access_token)
                .multipart(form),
        )
        .await
    }

    /// Replace fields of an existing application.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn update_application(
        &self,
        access_token: &str,
        form: Form,
    ) -> Result<Option<Value>, Error> {
        self.send(
            ApiRequest::new("application update", Method::PUT, "applications")
                .bearer(access_token)
                .multipart(form),
        )
        .await
    }

    /// Ask the backend to verify a gateway transaction.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn verify_payment(
        &self,
        access_token: &str,
        kind: PaymentKind,
        trans_ref: &str,
    ) -> Result<PaymentVerification, Error> {
        let value = self
            .send(
                ApiRequest::get("payment verification", kind.endpoint())
                    .bearer(access_token)
                    .query("transRef", trans_ref),
            )
            .await?
            .ok_or_else(|| Error::Decode("payment verification: empty response".into()))?;
        // Status and message live at the top level, next to any `data`.
        serde_json::from_value(value).map_err(|e| Error::Decode(format!("payment verification: {e}")))
    }

    /// List applications for review. `query` is passed through (status, page...).
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn list_applications(
        &self,
        access_token: &str,
        query: &[(String, String)],
    ) -> Result<Value, Error> {
        let request = query.iter().fold(
            ApiRequest::get("application listing", "admin/applications").bearer(access_token),
            |req, (k, v)| req.query(k.as_str(), v.as_str()),
        );
        Ok(self.send(request).await?.unwrap_or(Value::Null))
    }

    /// Approve an application.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn approve_application(
        &self,
        access_token: &str,
        application_id: &str,
    ) -> Result<Option<Value>, Error> {
        let path = format!("admin/applications/{}/approve", urlencoding::encode(application_id));
        self.send(ApiRequest::new("application approval", Method::PATCH, path).bearer(access_token))
            .await
    }

    /// Reject an application, optionally with a reason shown to the applicant.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn reject_application(
        &self,
        access_token: &str,
        application_id: &str,
        reason: Option<&str>,
    ) -> Result<Option<Value>, Error> {
        let path = format!("admin/applications/{}/reject", urlencoding::encode(application_id));
        let mut request =
            ApiRequest::new("application rejection", Method::PATCH, path).bearer(access_token);
        if let Some(reason) = reason {
            request = request.json(serde_json::json!({ "reason": reason }));
        }
        self.send(request).await
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(status, &body);
        tracing::warn!(operation, status = status.as_u16(), message = %message, "Remote API error");
        Err(Error::Api {
            operation,
            status: status.as_u16(),
            message,
        })
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

/// Unwrap a `{ "data": ... }` envelope; other values pass through.
pub(crate) fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

const MAX_TEXT_MESSAGE: usize = 200;

/// Best-effort human message from an error body.
///
/// Order: `message`, first entry of `errors`, `error`, short plain text,
/// canonical status reason.
pub(crate) fn extract_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = message_from_json(&value) {
            return message;
        }
    } else {
        let text = body.trim();
        if !text.is_empty() && !text.starts_with('<') {
            return text.chars().take(MAX_TEXT_MESSAGE).collect();
        }
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

fn message_from_json(value: &Value) -> Option<String> {
    if let Some(message) = non_empty_str(value.get("message")) {
        return Some(message);
    }
    let from_errors = value.get("errors").and_then(|errors| match errors {
        Value::Object(fields) => fields.values().find_map(error_entry),
        other => error_entry(other),
    });
    from_errors.or_else(|| non_empty_str(value.get("error")))
}

fn error_entry(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(error_entry),
        Value::Object(obj) => non_empty_str(obj.get("message")),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn status_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(true) => "success".into(),
        Value::Bool(false) => "failed".into(),
        other => other.to_string(),
    })
}

fn message_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
