use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;

use super::extractor::resolve_session;
use super::state::PortalState;
use crate::guard::{Decision, canonical_path};
use crate::session::SessionStore;

/// Route guard middleware.
///
/// The path is classified in its canonical form (see [`canonical_path`]), so
/// encoded or dot-segment spellings cannot slip past a prefix. Paths that
/// climb above the root are rejected with `400`.
///
/// Bypassed paths go straight through without touching the session store.
/// Everything else is resolved against the caller's session and either
/// proceeds or is redirected.
pub async fn route_guard<S: SessionStore>(
    State(state): State<PortalState<S>>,
    jar: PrivateCookieJar,
    request: Request,
    next: Next,
) -> Response {
    let Some(path) = canonical_path(request.uri().path()) else {
        tracing::debug!(path = %request.uri().path(), "Route guard rejected path");
        return StatusCode::BAD_REQUEST.into_response();
    };
    if state.guard.table().is_bypassed(&path) {
        return next.run(request).await;
    }

    let session = resolve_session(
        state.store.as_ref(),
        &jar,
        &state.settings.session_cookie_name,
    )
    .await;

    match state
        .guard
        .decide(&path, session.as_ref().map(|s| &s.data))
    {
        Decision::Proceed => next.run(request).await,
        Decision::Redirect(to) => {
            tracing::debug!(path = %path, to = %to, "Route guard redirect");
            Redirect::to(&to).into_response()
        }
    }
}

/// Wrap `router` in the route guard.
pub fn protect<S: SessionStore>(router: Router, state: PortalState<S>) -> Router {
    router.layer(middleware::from_fn_with_state(state, route_guard::<S>))
}
