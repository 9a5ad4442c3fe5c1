use std::fs;
use std::path::{Path, PathBuf};

use chapel_api::{ChapelError, Role};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "chapel.toml";
pub const DEFAULT_SECRET_ENV: &str = "CHAPEL_SESSION_SECRET";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapelConfig {
    pub app_name: String,
    pub session: SessionConfig,
    pub routes: RouteConfig,
    pub members: Vec<MemberConfig>,
}

impl Default for ChapelConfig {
    fn default() -> Self {
        Self {
            app_name: "chapel".to_string(),
            session: SessionConfig::default(),
            routes: RouteConfig::default(),
            members: Vec::new(),
        }
    }
}

impl ChapelConfig {
    pub fn cookie_name(&self) -> String {
        format!("{}_session", self.app_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub secret_env: String,
    pub ttl_seconds: u64,
    pub production: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret_env: DEFAULT_SECRET_ENV.to_string(),
            ttl_seconds: 604_800,
            production: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub login_path: String,
    pub landing_path: String,
    pub logout_path: String,
    pub public_paths: Vec<String>,
    /// Public pages a signed-in visitor is bounced away from.
    pub auth_pages: Vec<String>,
    pub profile_completion_paths: Vec<String>,
    pub static_prefixes: Vec<String>,
    pub api_prefix: String,
    pub restricted: Vec<RestrictedScope>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        Self {
            login_path: "/auth/login".to_string(),
            landing_path: "/dashboard".to_string(),
            logout_path: "/auth/logout".to_string(),
            public_paths: owned(&["/", "/auth/login", "/auth/register", "/auth/logout"]),
            auth_pages: owned(&["/auth/login", "/auth/register"]),
            profile_completion_paths: owned(&["/profile/complete"]),
            static_prefixes: owned(&["/_next", "/_static", "/_internal"]),
            api_prefix: "/api".to_string(),
            restricted: vec![
                RestrictedScope::new("/admin/summary", &[Role::TopAdmin]),
                RestrictedScope::new(
                    "/admin/finance",
                    &[Role::TopAdmin, Role::Admin, Role::Finance],
                ),
                RestrictedScope::new("/admin", &[Role::TopAdmin, Role::Admin]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedScope {
    pub prefix: String,
    pub roles: Vec<Role>,
}

impl RestrictedScope {
    pub fn new(prefix: &str, roles: &[Role]) -> Self {
        Self {
            prefix: prefix.to_string(),
            roles: roles.to_vec(),
        }
    }

    /// Segment-aware: `/admin` covers `/admin/x` but not `/administrator`.
    pub fn covers(&self, path: &str) -> bool {
        path_has_prefix(path, &self.prefix)
    }
}

pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub email: String,
    pub subject_id: String,
    pub role: Role,
    /// Hex salt fed to [`crate::hash_password`].
    pub salt: String,
    pub password_hash: String,
}

pub fn validate_config(cfg: &ChapelConfig) -> Result<(), ChapelError> {
    let invalid = |msg: String| Err(ChapelError::Validation(msg));

    if cfg.app_name.is_empty()
        || !cfg
            .app_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return invalid(format!("app_name {:?} is not a valid cookie prefix", cfg.app_name));
    }
    if cfg.session.ttl_seconds == 0 {
        return invalid("session.ttl_seconds must be positive".to_string());
    }
    if cfg.session.secret_env.trim().is_empty() {
        return invalid("session.secret_env must name an environment variable".to_string());
    }

    let routes = &cfg.routes;
    let singles = [
        &routes.login_path,
        &routes.landing_path,
        &routes.logout_path,
        &routes.api_prefix,
    ];
    let lists = routes
        .public_paths
        .iter()
        .chain(&routes.auth_pages)
        .chain(&routes.profile_completion_paths)
        .chain(&routes.static_prefixes)
        .chain(routes.restricted.iter().map(|r| &r.prefix));
    for path in singles.into_iter().chain(lists) {
        if !path.starts_with('/') {
            return invalid(format!("route {path:?} must start with '/'"));
        }
    }

    if !routes.public_paths.contains(&routes.login_path) {
        return invalid(format!("login path {} must be public", routes.login_path));
    }
    if let Some(page) = routes
        .auth_pages
        .iter()
        .find(|p| !routes.public_paths.contains(p))
    {
        return invalid(format!("auth page {page} must also be public"));
    }
    if routes.public_paths.contains(&routes.landing_path) {
        return invalid(format!(
            "landing path {} must require a session",
            routes.landing_path
        ));
    }
    if let Some(scope) = routes.restricted.iter().find(|r| r.covers(&routes.landing_path)) {
        return invalid(format!(
            "landing path {} sits under restricted prefix {}",
            routes.landing_path, scope.prefix
        ));
    }
    if let Some(prefix) = std::iter::once(&routes.api_prefix)
        .chain(&routes.static_prefixes)
        .find(|p| p.trim_end_matches('/').is_empty())
    {
        return invalid(format!(
            "prefix {prefix:?} would exempt every path from the gate"
        ));
    }
    for scope in &routes.restricted {
        if scope.roles.is_empty() {
            return invalid(format!("restricted prefix {} allows no roles", scope.prefix));
        }
        if scope.prefix.trim_end_matches('/').is_empty() {
            return invalid("restricted prefix must not be '/'".to_string());
        }
    }

    for m in &cfg.members {
        if m.email.trim().is_empty() || m.subject_id.trim().is_empty() {
            return invalid("members need an email and a subject_id".to_string());
        }
        if m.salt.is_empty() || hex::decode(&m.salt).is_err() {
            return invalid(format!("member {} has an invalid salt", m.email));
        }
        if m.password_hash.len() != 64 || hex::decode(&m.password_hash).is_err() {
            return invalid(format!("member {} has an invalid password_hash", m.email));
        }
    }

    Ok(())
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("chapel")
    } else {
        PathBuf::from(".chapel")
    }
}

/// Missing file means defaults; a file that exists must parse and validate.
pub fn load_config_from_dir(dir: &Path) -> Result<ChapelConfig, ChapelError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ChapelConfig::default());
    }
    load_config_from_file(&path)
}

pub fn load_config_from_file(path: &Path) -> Result<ChapelConfig, ChapelError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ChapelError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    let cfg = parse_config(&content)
        .map_err(|e| ChapelError::Validation(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(cfg)
}

pub fn parse_config(content: &str) -> Result<ChapelConfig, ChapelError> {
    let cfg: ChapelConfig = toml::from_str(content)
        .map_err(|e| ChapelError::Validation(format!("invalid TOML: {e}")))?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn write_default_config_file(dir: &Path, force: bool) -> Result<PathBuf, ChapelError> {
    fs::create_dir_all(dir)
        .map_err(|e| ChapelError::Internal(format!("failed to create {}: {e}", dir.display())))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if force || !path.exists() {
        fs::write(&path, DEFAULT_CONFIG_TOML).map_err(|e| {
            ChapelError::Internal(format!("failed to write {}: {e}", path.display()))
        })?;
    }
    Ok(path)
}

pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../../docs/chapel/chapel.toml.example");
