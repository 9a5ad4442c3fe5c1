//! axum adapter: turns [`GateDecision`]s into responses.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chapel_auth::{SessionSecret, edge, now_epoch_secs};

use crate::policy::{GateDecision, RoutePolicy};

/// Shared, read-only gate configuration.
#[derive(Debug, Clone)]
pub struct GateState {
    policy: Arc<RoutePolicy>,
    secret: Option<Arc<SessionSecret>>,
    cookie_name: Arc<str>,
}

impl GateState {
    pub fn new(policy: RoutePolicy, secret: Option<SessionSecret>, cookie_name: &str) -> Self {
        Self {
            policy: Arc::new(policy),
            secret: secret.map(Arc::new),
            cookie_name: Arc::from(cookie_name),
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }
}

/// Use with `axum::middleware::from_fn_with_state`.
pub async fn gate_middleware(
    State(gate): State<GateState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = gate.policy.classify(&path);
    if class.skips_session() {
        return next.run(request).await;
    }

    let cookie = request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok());
    let session = edge::read_session(
        gate.secret.as_deref(),
        cookie,
        &gate.cookie_name,
        now_epoch_secs(),
    )
    .await;
    let identity = session.map(|p| p.identity());

    match gate.policy.decide_class(class, &path, identity.as_ref()) {
        GateDecision::Allow => next.run(request).await,
        decision => {
            let location = decision.location().unwrap_or_default();
            tracing::debug!(%path, %location, "gate redirect");
            Redirect::to(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use chapel_api::Role;
    use chapel_auth::SessionIssuer;
    use tower::ServiceExt;

    const SECRET: &str = "gate-secret";

    fn app(secret: Option<&str>) -> Router {
        let state = GateState::new(
            RoutePolicy::default(),
            secret.map(|s| SessionSecret::new(s).unwrap()),
            "chapel_session",
        );
        Router::new()
            .route("/dashboard", get(|| async { "dashboard" }))
            .route("/auth/login", get(|| async { "login" }))
            .route("/admin/summary", get(|| async { "summary" }))
            .route("/admin/summary/chart.js", get(|| async { "js" }))
            .route("/admin/finance/budget", get(|| async { "budget" }))
            .route("/api/admin/summary", get(|| async { "api" }))
            .layer(axum::middleware::from_fn_with_state(state, gate_middleware))
    }

    fn cookie_for(secret: &str, role: Role) -> String {
        let issued = SessionIssuer::new(SessionSecret::new(secret).unwrap())
            .issue("u1", role)
            .unwrap();
        format!("chapel_session={}", issued.token)
    }

    async fn get_path(
        app: Router,
        path: &str,
        cookie: Option<&str>,
    ) -> (StatusCode, Option<String>) {
        let mut req = Request::builder().uri(path);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        (resp.status(), location)
    }

    #[tokio::test]
    async fn anonymous_admin_request_redirects_to_login() {
        let (status, location) = get_path(app(Some(SECRET)), "/admin/summary", None).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/auth/login?next=/admin/summary"));
    }

    #[tokio::test]
    async fn under_privileged_session_goes_to_dashboard() {
        let cookie = cookie_for(SECRET, Role::Admin);
        let (status, location) = get_path(app(Some(SECRET)), "/admin/summary", Some(&cookie)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/dashboard"));
    }

    #[tokio::test]
    async fn finance_reaches_budget() {
        let cookie = cookie_for(SECRET, Role::Finance);
        let (status, _) = get_path(app(Some(SECRET)), "/admin/finance/budget", Some(&cookie)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_in_login_visit_goes_to_dashboard() {
        let cookie = cookie_for(SECRET, Role::Member);
        let (status, location) = get_path(app(Some(SECRET)), "/auth/login", Some(&cookie)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/dashboard"));
    }

    #[tokio::test]
    async fn foreign_secret_is_unauthenticated() {
        let cookie = cookie_for("other-secret", Role::TopAdmin);
        let (_, location) = get_path(app(Some(SECRET)), "/dashboard", Some(&cookie)).await;
        assert_eq!(location.as_deref(), Some("/auth/login?next=/dashboard"));
    }

    #[tokio::test]
    async fn static_and_api_pass_untouched() {
        for path in ["/admin/summary/chart.js", "/api/admin/summary"] {
            let (status, location) = get_path(app(Some(SECRET)), path, None).await;
            assert_eq!(status, StatusCode::OK, "{path}");
            assert!(location.is_none());
        }
    }

    #[tokio::test]
    async fn missing_secret_degrades_to_no_session() {
        let cookie = cookie_for(SECRET, Role::TopAdmin);
        let (status, location) = get_path(app(None), "/dashboard", Some(&cookie)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/auth/login?next=/dashboard"));
        let (status, _) = get_path(app(None), "/auth/login", Some(&cookie)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
