use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, patch, post, put};
use axum::{Form, Json, Router};
use axum_extra::extract::PrivateCookieJar;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use super::cookies;
use super::error::PortalError;
use super::extractor::{CurrentSession, resolve_session};
use super::state::PortalState;
use crate::api::{Credentials, PaymentVerification};
use crate::guard::SIGNIN_PATH;
use crate::session::{SessionData, SessionPatch, SessionStore, generate_session_key};
use crate::types::{PaymentKind, Role, User};

/// Create the portal router: sign-in/out, session endpoints and the actions
/// that proxy the remote admission API.
pub fn portal_routes<S: SessionStore>(state: PortalState<S>) -> Router {
    Router::new()
        .route("/auth/signin", post(sign_in::<S>))
        .route("/auth/signout", get(sign_out::<S>).post(sign_out::<S>))
        .route("/api/session", get(refresh_session::<S>).post(replace_user::<S>))
        .route("/api/user", get(refresh_session::<S>).post(replace_user::<S>))
        .route("/api/profile", patch(update_profile::<S>))
        .route("/api/admission/apply", post(submit_application::<S>))
        .route("/api/admission/application", put(update_application::<S>))
        .route("/api/payments/verify/{kind}", get(verify_payment::<S>))
        .route("/api/admin/applications", get(list_applications::<S>))
        .route(
            "/api/admin/applications/{id}/approve",
            post(approve_application::<S>),
        )
        .route(
            "/api/admin/applications/{id}/reject",
            post(reject_application::<S>),
        )
        .route("/lms", get(lms::<S>))
        .with_state(state)
}

// ── Sign in ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SignInParams {
    email: Option<String>,
    password: Option<String>,
}

async fn sign_in<S: SessionStore>(
    State(state): State<PortalState<S>>,
    jar: PrivateCookieJar,
    Form(params): Form<SignInParams>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let credentials = match (params.email, params.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Credentials {
                email: email.trim().to_string(),
                password,
            }
        }
        _ => return Err(signin_error("Email and password are required")),
    };

    let login = state.client.login(&credentials).await.map_err(|e| {
        tracing::warn!(error = %e, "Sign-in rejected");
        signin_error(&e.user_message())
    })?;

    let user = match login.user {
        Some(user) => user,
        None => state
            .client
            .fetch_profile(&login.access_token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Profile fetch after sign-in failed");
                signin_error(&e.user_message())
            })?,
    };

    let ttl = session_ttl(state.settings.session_ttl, login.expires_in);
    let landing = state.guard.landing_path(&user);
    let user_id = user.id.clone();

    // One active session per client: drop whatever the cookie pointed at.
    if let Some(previous) =
        resolve_session(state.store.as_ref(), &jar, &state.settings.session_cookie_name).await
    {
        if let Err(e) = state.store.delete(&previous.key).await {
            tracing::warn!(error = %e, "Previous session deletion failed");
        }
    }

    let key = generate_session_key();
    state
        .store
        .set(
            &key,
            SessionData::new(Some(user), Some(login.access_token), ttl),
            ttl,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Session creation failed");
            signin_error("Unable to start a session, please try again")
        })?;

    let cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &key,
        ttl,
        state.settings.secure_cookies,
    );

    tracing::info!(user_id = %user_id, landing = %landing, "Sign-in successful");

    Ok((jar.add(cookie), Redirect::to(&landing)))
}

// ── Sign out ───────────────────────────────────────────────────────

async fn sign_out<S: SessionStore>(
    State(state): State<PortalState<S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    if let Some(key) = cookies::session_key(&jar, &state.settings.session_cookie_name) {
        if let Err(e) = state.store.delete(&key).await {
            tracing::warn!(error = %e, "Session deletion failed during sign-out");
        }
    }

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (jar.remove(clear_cookie), Redirect::to(SIGNIN_PATH))
}

// ── Session ────────────────────────────────────────────────────────

/// Browser-facing view of the session. The bearer token stays server-side.
#[derive(Serialize)]
struct SessionView {
    user: Option<User>,
    #[serde(rename = "expiresAt", with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

impl From<SessionData> for SessionView {
    fn from(data: SessionData) -> Self {
        Self {
            user: data.user,
            expires_at: data.expires_at,
        }
    }
}

async fn refresh_session<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
) -> Result<Json<SessionView>, PortalError> {
    let token = session.access_token()?;
    let user = state.client.fetch_profile(token).await?;
    let data = store_user(&state, &session, user).await?;
    Ok(Json(data.into()))
}

async fn replace_user<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    Json(body): Json<Value>,
) -> Result<Json<SessionView>, PortalError> {
    // Accept both `{ "user": {...} }` and a bare user object.
    let raw = match body {
        Value::Object(mut map) if map.contains_key("user") => {
            map.remove("user").unwrap_or(Value::Null)
        }
        other => other,
    };
    let user: User = serde_json::from_value(raw)
        .map_err(|e| PortalError::BadRequest(format!("invalid user: {e}")))?;
    let data = store_user(&state, &session, user).await?;
    Ok(Json(data.into()))
}

async fn update_profile<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    Json(fields): Json<Value>,
) -> Result<Json<User>, PortalError> {
    if !fields.is_object() {
        return Err(PortalError::BadRequest("profile update must be an object".into()));
    }
    let user = state
        .client
        .update_profile(session.access_token()?, fields)
        .await?;
    store_user(&state, &session, user.clone()).await?;
    Ok(Json(user))
}

// ── Admission ──────────────────────────────────────────────────────

async fn submit_application<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    multipart: Multipart,
) -> Result<Json<Value>, PortalError> {
    let user = session.require_role(&[Role::Student])?.clone();
    let form = forward_multipart(multipart).await?;
    let token = session.access_token()?;

    let response = state.client.submit_application(token, form).await?;
    tracing::info!(user_id = %user.id, "Application submitted");

    // The backend now reports `is_applied`; fall back to flipping it locally.
    let refreshed = match state.client.fetch_profile(token).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "Profile refresh after application failed");
            user.with_applied(true)
        }
    };
    store_user(&state, &session, refreshed).await?;

    Ok(Json(response.unwrap_or_else(
        || json!({ "message": "Application submitted" }),
    )))
}

async fn update_application<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    multipart: Multipart,
) -> Result<Json<Value>, PortalError> {
    session.require_role(&[Role::Student, Role::Admin])?;
    let form = forward_multipart(multipart).await?;
    let response = state
        .client
        .update_application(session.access_token()?, form)
        .await?;
    Ok(Json(response.unwrap_or_else(
        || json!({ "message": "Application updated" }),
    )))
}

// ── Payments ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "transRef")]
    trans_ref: Option<String>,
}

async fn verify_payment<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    Path(kind): Path<PaymentKind>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<PaymentVerification>, PortalError> {
    let trans_ref = params
        .trans_ref
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| PortalError::BadRequest("transRef is required".into()))?;
    let token = session.access_token()?;

    let verification = state.client.verify_payment(token, kind, &trans_ref).await?;
    tracing::info!(?kind, trans_ref = %trans_ref, status = %verification.status, "Payment verified");

    // Payment statuses live on the profile; keep the cached copy current.
    match state.client.fetch_profile(token).await {
        Ok(user) => {
            store_user(&state, &session, user).await?;
        }
        Err(e) => tracing::warn!(error = %e, "Profile refresh after payment failed"),
    }

    Ok(Json(verification))
}

// ── Admin review ───────────────────────────────────────────────────

async fn list_applications<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, PortalError> {
    session.require_role(&[Role::Admin])?;
    let listing = state
        .client
        .list_applications(session.access_token()?, &query)
        .await?;
    Ok(Json(listing))
}

async fn approve_application<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<Value>, PortalError> {
    let admin = session.require_role(&[Role::Admin])?;
    let response = state
        .client
        .approve_application(session.access_token()?, &id)
        .await?;
    tracing::info!(admin_id = %admin.id, application_id = %id, "Application approved");
    Ok(Json(response.unwrap_or_else(
        || json!({ "message": "Application approved" }),
    )))
}

#[derive(Deserialize)]
struct RejectBody {
    reason: Option<String>,
}

async fn reject_application<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, PortalError> {
    let admin = session.require_role(&[Role::Admin])?;
    let reason = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RejectBody>(&body)
            .map_err(|e| PortalError::BadRequest(format!("invalid rejection body: {e}")))?
            .reason
            .filter(|r| !r.trim().is_empty())
    };

    let response = state
        .client
        .reject_application(session.access_token()?, &id, reason.as_deref())
        .await?;
    tracing::info!(admin_id = %admin.id, application_id = %id, "Application rejected");
    Ok(Json(response.unwrap_or_else(
        || json!({ "message": "Application rejected" }),
    )))
}

// ── LMS ────────────────────────────────────────────────────────────

async fn lms<S: SessionStore>(
    State(state): State<PortalState<S>>,
    session: CurrentSession,
) -> Result<Redirect, PortalError> {
    session.user()?;
    let url = state
        .settings
        .lms_url
        .as_ref()
        .ok_or_else(|| PortalError::NotFound("LMS is not configured".into()))?;
    Ok(Redirect::to(url.as_str()))
}

// ── Helpers ────────────────────────────────────────────────────────

fn signin_error(message: &str) -> Response {
    let encoded = urlencoding::encode(message);
    Redirect::to(&format!("{SIGNIN_PATH}?error={encoded}")).into_response()
}

/// Session lifetime: the configured TTL, capped by the token lifetime.
fn session_ttl(configured: Duration, token_expires_in: Option<u64>) -> Duration {
    token_expires_in
        .and_then(|secs| i64::try_from(secs).ok())
        .map(Duration::seconds)
        .filter(|token_ttl| *token_ttl < configured)
        .unwrap_or(configured)
}

async fn store_user<S: SessionStore>(
    state: &PortalState<S>,
    session: &CurrentSession,
    user: User,
) -> Result<SessionData, PortalError> {
    state
        .store
        .update(&session.key, SessionPatch::user(user))
        .await
        .map_err(|e| PortalError::Store(e.to_string()))?
        .ok_or(PortalError::SessionExpired)
}

/// Re-encode an incoming multipart body for the remote API.
async fn forward_multipart(mut multipart: Multipart) -> Result<multipart::Form, PortalError> {
    let mut form = multipart::Form::new();
    let mut fields = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PortalError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PortalError::BadRequest(e.body_text()))?;

        let mut part = multipart::Part::bytes(bytes.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| PortalError::BadRequest(format!("{name}: {e}")))?;
        }
        form = form.part(name, part);
        fields += 1;
    }

    if fields == 0 {
        return Err(PortalError::BadRequest("application form is empty".into()));
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_capped_by_token() {
        assert_eq!(session_ttl(Duration::hours(24), None), Duration::hours(24));
        assert_eq!(
            session_ttl(Duration::hours(24), Some(3600)),
            Duration::hours(1)
        );
        assert_eq!(
            session_ttl(Duration::hours(1), Some(86_400)),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_signin_error_encodes_message() {
        let response = signin_error("Invalid email or password");
        let location = response.headers()["location"].to_str().unwrap();
        assert_eq!(location, "/auth/signin?error=Invalid%20email%20or%20password");
    }
}
