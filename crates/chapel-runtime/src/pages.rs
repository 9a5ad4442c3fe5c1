//! Placeholder pages. Real layouts live elsewhere; these only show which shell
//! a verified identity renders under.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use chapel_api::Role;
use chapel_auth::SessionPayload;
use chapel_gate::{resolve_render_role, with_next};
use serde::Deserialize;

use crate::AppState;
use crate::handlers::current_session;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ShellQuery {
    #[serde(rename = "as")]
    requested: Option<String>,
}

impl ShellQuery {
    fn requested_role(&self) -> Option<Role> {
        self.requested.as_deref().and_then(|r| r.parse().ok())
    }
}

fn nav_for(role: Role) -> &'static [(&'static str, &'static str)] {
    match role {
        Role::Member => &[
            ("/dashboard", "Dashboard"),
            ("/events", "Events"),
            ("/giving", "Giving"),
        ],
        Role::Finance => &[
            ("/dashboard", "Dashboard"),
            ("/giving", "Giving"),
            ("/admin/finance/budget", "Budget"),
        ],
        Role::Admin => &[
            ("/dashboard", "Dashboard"),
            ("/admin", "Administration"),
            ("/admin/finance/budget", "Budget"),
        ],
        Role::TopAdmin => &[
            ("/dashboard", "Dashboard"),
            ("/admin", "Administration"),
            ("/admin/finance/budget", "Budget"),
            ("/admin/summary", "Summary"),
        ],
    }
}

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn layout(title: &str, shell: Option<(&SessionPayload, Role)>, body: &str) -> String {
    let nav = match shell {
        Some((session, role)) => {
            let links: String = nav_for(role)
                .iter()
                .map(|(href, label)| format!(r#"<a href="{href}">{label}</a> "#))
                .collect();
            format!(
                r#"<nav data-shell="{role}">{links}<a href="/auth/logout">Sign out</a></nav><p>Signed in as {} ({})</p>"#,
                escape(&session.subject_id),
                session.role,
            )
        }
        None => {
            r#"<nav><a href="/auth/login">Sign in</a> <a href="/auth/register">Register</a></nav>"#
                .to_string()
        }
    };
    format!(
        "<!doctype html><html><head><title>{}</title></head><body>{nav}<main><h1>{}</h1>{body}</main></body></html>",
        escape(title),
        escape(title),
    )
}

fn shell_page(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    query: &ShellQuery,
    title: &str,
    body: &str,
) -> Response {
    // The gate already ran, but pages do not rely on it for identity.
    let Some(session) = current_session(state, headers) else {
        let login = with_next(&state.config.routes.login_path, Some(uri.path()));
        return Redirect::to(&login).into_response();
    };
    let role = resolve_render_role(session.role, query.requested_role());
    Html(layout(title, Some((&session, role)), body)).into_response()
}

pub(crate) async fn landing(State(state): State<AppState>, headers: HeaderMap) -> Html<String> {
    let session = current_session(&state, &headers);
    let shell = session.as_ref().map(|s| (s, s.role));
    Html(layout(
        "Chapel",
        shell,
        "<p>Member directory, giving and events for your congregation.</p>",
    ))
}

pub(crate) async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<ShellQuery>,
) -> Response {
    shell_page(&state, &headers, &uri, &query, "Dashboard", "<p>Welcome back.</p>")
}

pub(crate) async fn profile_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<ShellQuery>,
) -> Response {
    shell_page(
        &state,
        &headers,
        &uri,
        &query,
        "Complete your profile",
        "<p>Tell us a little about yourself before continuing.</p>",
    )
}

pub(crate) async fn admin_home(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<ShellQuery>,
) -> Response {
    shell_page(
        &state,
        &headers,
        &uri,
        &query,
        "Administration",
        "<p>Manage members and groups.</p>",
    )
}

pub(crate) async fn admin_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<ShellQuery>,
) -> Response {
    shell_page(&state, &headers, &uri, &query, "Summary", "<p>Congregation-wide overview.</p>")
}

pub(crate) async fn finance_budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<ShellQuery>,
) -> Response {
    shell_page(
        &state,
        &headers,
        &uri,
        &query,
        "Budget",
        "<p>Budget requests awaiting approval.</p>",
    )
}

pub(crate) async fn not_found() -> (StatusCode, Html<String>) {
    (
        StatusCode::NOT_FOUND,
        Html(layout("Not found", None, "<p>No such page.</p>")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app, body_text, cookie, get, location, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn admin_renders_member_shell_on_request() {
        let resp = send(app(), get("/admin?as=member", Some(&cookie(Role::Admin)))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_text(resp).await;
        assert!(body.contains(r#"data-shell="member""#));
        assert!(body.contains("(admin)"));
    }

    #[tokio::test]
    async fn elevated_shell_request_collapses_to_member() {
        let resp = send(app(), get("/dashboard?as=top_admin", Some(&cookie(Role::Finance)))).await;
        let body = body_text(resp).await;
        assert!(body.contains(r#"data-shell="member""#));
        assert!(!body.contains("/admin/summary"));
    }

    #[tokio::test]
    async fn top_admin_keeps_full_navigation() {
        let top = cookie(Role::TopAdmin);
        let resp = send(app(), get("/admin/summary?as=member", Some(&top))).await;
        let body = body_text(resp).await;
        assert!(body.contains(r#"data-shell="top_admin""#));
        assert!(body.contains("/admin/summary"));
    }

    #[tokio::test]
    async fn unknown_shell_request_is_ignored() {
        let resp = send(app(), get("/dashboard?as=bishop", Some(&cookie(Role::Finance)))).await;
        let body = body_text(resp).await;
        assert!(body.contains(r#"data-shell="finance""#));
    }

    #[tokio::test]
    async fn anonymous_dashboard_is_gated() {
        let resp = send(app(), get("/dashboard", None)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp).as_deref(), Some("/auth/login?next=/dashboard"));
    }

    #[tokio::test]
    async fn landing_is_public() {
        let resp = send(app(), get("/", None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Sign in"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
