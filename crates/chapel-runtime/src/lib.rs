//! HTTP surface for the Chapel site.
//!
//! Every request passes the role gate first. Handlers then recover the
//! identity through the full-runtime [`SessionReader`]; pages and the member
//! API never trust anything else about the caller.

mod handlers;
mod pages;
mod trace;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use chapel_api::{ChapelError, CredentialVerifier};
use chapel_auth::{CookieOptions, SessionIssuer, SessionReader, SessionSecret};
use chapel_core::ChapelConfig;
use chapel_gate::{GateState, RoutePolicy, gate_middleware};

/// Read-only state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) config: Arc<ChapelConfig>,
    pub(crate) issuer: Option<Arc<SessionIssuer>>,
    pub(crate) reader: Arc<SessionReader>,
    pub(crate) members: Arc<dyn CredentialVerifier>,
    pub(crate) cookie: CookieOptions,
}

impl AppState {
    pub fn new(
        config: ChapelConfig,
        secret: Option<SessionSecret>,
        members: Arc<dyn CredentialVerifier>,
    ) -> Self {
        if secret.is_none() {
            tracing::error!(
                env = %config.session.secret_env,
                "session secret missing: logins will fail and no session is accepted"
            );
        }
        let cookie = CookieOptions::session(&config.app_name, config.session.production);
        let issuer = secret
            .clone()
            .map(|s| Arc::new(SessionIssuer::new(s).with_ttl(config.session.ttl_seconds)));
        let reader = Arc::new(SessionReader::new(secret, config.cookie_name()));
        Self {
            config: Arc::new(config),
            issuer,
            reader,
            members,
            cookie,
        }
    }
}

const FIXED_PATHS: [&str; 8] = [
    "/",
    "/auth/register",
    "/profile/complete",
    "/admin",
    "/admin/summary",
    "/admin/finance/budget",
    "/api/me",
    "/api/health",
];

/// The full router with the gate and request tracing applied.
///
/// Fails when the configured login, landing or logout paths collide with each
/// other or with a built-in page.
pub fn build_app(state: AppState) -> Result<Router, ChapelError> {
    let config = Arc::clone(&state.config);
    let routes = &config.routes;
    let configured = [&routes.login_path, &routes.landing_path, &routes.logout_path];
    for (i, path) in configured.iter().enumerate() {
        if FIXED_PATHS.contains(&path.as_str()) || configured[..i].contains(path) {
            return Err(ChapelError::Config(format!(
                "route {path} collides with another page"
            )));
        }
    }

    let gate = GateState::new(
        RoutePolicy::new(routes.clone()),
        state.reader.secret().cloned(),
        state.reader.cookie_name(),
    );

    let router = Router::new()
        .route("/", get(pages::landing))
        .route(
            &routes.login_path,
            get(handlers::login_page).post(handlers::login_submit),
        )
        .route(
            "/auth/register",
            get(handlers::register_page).post(handlers::register_submit),
        )
        .route(&routes.logout_path, get(handlers::logout))
        .route(&routes.landing_path, get(pages::dashboard))
        .route("/profile/complete", get(pages::profile_complete))
        .route("/admin", get(pages::admin_home))
        .route("/admin/summary", get(pages::admin_summary))
        .route("/admin/finance/budget", get(pages::finance_budget))
        .route("/api/me", get(handlers::api_me))
        .route("/api/health", get(handlers::api_health))
        .fallback(pages::not_found)
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(gate, gate_middleware))
        .layer(axum::middleware::from_fn(trace::request_tracing_middleware));
    Ok(router)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(bind: SocketAddr, state: AppState) -> Result<(), ChapelError> {
    let app = build_app(state)?;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| ChapelError::Internal(format!("failed to bind {bind}: {e}")))?;
    tracing::info!(%bind, "chapel listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ChapelError::Internal(format!("server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, Response, header};
    use chapel_api::Role;
    use chapel_auth::{SessionIssuer, SessionSecret};
    use chapel_core::{ChapelConfig, MemberConfig, MemberDirectory, generate_salt, hash_password};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::{AppState, build_app};

    pub const SECRET: &str = "runtime-test-secret";

    pub fn config() -> ChapelConfig {
        let salt = generate_salt();
        ChapelConfig {
            members: vec![MemberConfig {
                email: "clerk@example.org".to_string(),
                subject_id: "m_clerk".to_string(),
                role: Role::Admin,
                password_hash: hash_password("psalm23", &salt),
                salt,
            }],
            ..ChapelConfig::default()
        }
    }

    pub fn app_with(secret: Option<&str>) -> Router {
        let cfg = config();
        let members = Arc::new(MemberDirectory::from_config(&cfg.members));
        let secret = secret.map(|s| SessionSecret::new(s).unwrap());
        build_app(AppState::new(cfg, secret, members)).unwrap()
    }

    pub fn app() -> Router {
        app_with(Some(SECRET))
    }

    pub fn cookie(role: Role) -> String {
        let issued = SessionIssuer::new(SessionSecret::new(SECRET).unwrap())
            .issue("m_test", role)
            .unwrap();
        format!("chapel_session={}", issued.token)
    }

    pub async fn send(app: Router, req: Request<Body>) -> Response<Body> {
        app.oneshot(req).await.unwrap()
    }

    pub fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(path);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::empty()).unwrap()
    }

    pub fn post_form(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn location(resp: &Response<Body>) -> Option<String> {
        resp.headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string())
    }

    pub fn set_cookie(resp: &Response<Body>) -> Option<String> {
        resp.headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
    }

    pub async fn body_text(resp: Response<Body>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
