use axum::Json;
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chapel_api::{ChapelError, Identity};
use chapel_auth::{SessionPayload, build_clear_cookie};
use chapel_gate::safe_next;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::pages::{escape, layout};

pub(crate) fn current_session(state: &AppState, headers: &HeaderMap) -> Option<SessionPayload> {
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    state.reader.read(cookie)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CredentialsForm {
    email: String,
    password: String,
    next: Option<String>,
}

fn credentials_page(action: &str, title: &str, next: Option<&str>, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p role="alert">{}</p>"#, escape(e)))
        .unwrap_or_default();
    let next = next
        .map(|n| format!(r#"<input type="hidden" name="next" value="{}">"#, escape(n)))
        .unwrap_or_default();
    let form = format!(
        r#"{error}<form method="post" action="{action}">{next}<input name="email" type="email"><input name="password" type="password"><button>{title}</button></form>"#
    );
    layout(title, None, &form)
}

pub(crate) async fn login_page(
    State(state): State<AppState>,
    Query(q): Query<NextQuery>,
) -> Html<String> {
    Html(credentials_page(
        &state.config.routes.login_path,
        "Sign in",
        q.next.as_deref(),
        None,
    ))
}

pub(crate) async fn register_page(Query(q): Query<NextQuery>) -> Html<String> {
    Html(credentials_page("/auth/register", "Register", q.next.as_deref(), None))
}

/// Issue a session for an identity the directory vouched for and redirect.
fn start_session(state: &AppState, identity: &Identity, target: &str) -> Response {
    let Some(issuer) = state.issuer.as_ref() else {
        tracing::error!(
            subject = %identity.subject_id,
            "refusing to sign in: session secret is not configured"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "session signing is not configured",
        )
            .into_response();
    };
    let set_cookie = issuer
        .issue(&identity.subject_id, identity.role)
        .and_then(|issued| issued.set_cookie(&state.cookie));
    match set_cookie {
        Ok(cookie) => ([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to issue session");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to start session").into_response()
        }
    }
}

fn directory_error(e: &ChapelError) -> Response {
    tracing::error!(error = %e, "member directory failure");
    (StatusCode::INTERNAL_SERVER_ERROR, "member directory unavailable").into_response()
}

pub(crate) async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let routes = &state.config.routes;
    match state.members.verify(&form.email, &form.password) {
        Ok(Some(identity)) => {
            let target = safe_next(form.next.as_deref(), &routes.landing_path);
            start_session(&state, &identity, target)
        }
        Ok(None) => {
            tracing::info!("failed sign-in attempt");
            let page = credentials_page(
                &routes.login_path,
                "Sign in",
                form.next.as_deref(),
                Some("Email or password is incorrect."),
            );
            (StatusCode::UNAUTHORIZED, Html(page)).into_response()
        }
        Err(e) => directory_error(&e),
    }
}

pub(crate) async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let status_for = |e: &ChapelError| match e {
        ChapelError::Conflict(_) => Some(StatusCode::CONFLICT),
        ChapelError::Validation(_) => Some(StatusCode::BAD_REQUEST),
        _ => None,
    };
    match state.members.register(&form.email, &form.password) {
        Ok(identity) => {
            let target = state
                .config
                .routes
                .profile_completion_paths
                .first()
                .unwrap_or(&state.config.routes.landing_path);
            start_session(&state, &identity, target)
        }
        Err(e) => match status_for(&e) {
            Some(status) => {
                let message = match e {
                    ChapelError::Conflict(_) => "That email cannot be registered.",
                    _ => "Please provide an email and a password.",
                };
                let page = credentials_page(
                    "/auth/register",
                    "Register",
                    form.next.as_deref(),
                    Some(message),
                );
                (status, Html(page)).into_response()
            }
            None => directory_error(&e),
        },
    }
}

pub(crate) async fn logout(State(state): State<AppState>) -> Response {
    match build_clear_cookie(&state.cookie) {
        Ok(cookie) => ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to build logout cookie");
            Redirect::to("/").into_response()
        }
    }
}

/// Identity of the caller, or 401. Headers other than the cookie are ignored.
pub(crate) async fn api_me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match current_session(&state, &headers) {
        Some(session) => Json(session.identity()).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized" })),
        )
            .into_response(),
    }
}

pub(crate) async fn api_health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
