//! Route classification and the per-request gate decision.

use std::cmp::Reverse;

use chapel_api::{Identity, Role};
use chapel_core::{RouteConfig, path_has_prefix};

use crate::continuation::with_next;

/// What kind of route a path is. Derived from the path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass<'a> {
    Static,
    Api,
    Public { auth_page: bool },
    ProfileCompletion,
    Authenticated,
    Restricted(&'a [Role]),
}

impl RouteClass<'_> {
    /// Static and API routes are never gated, so the cookie is not even read.
    pub fn skips_session(&self) -> bool {
        matches!(self, RouteClass::Static | RouteClass::Api)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { to: String, next: Option<String> },
}

impl GateDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    /// `Location` value for a redirect, `None` for `Allow`.
    pub fn location(&self) -> Option<String> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Redirect { to, next } => Some(with_next(to, next.as_deref())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    routes: RouteConfig,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new(RouteConfig::default())
    }
}

impl RoutePolicy {
    /// Restricted scopes are ordered longest prefix first so the most specific one wins.
    pub fn new(mut routes: RouteConfig) -> Self {
        routes
            .restricted
            .sort_by_key(|s| Reverse(s.prefix.trim_end_matches('/').len()));
        Self { routes }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    pub fn classify(&self, path: &str) -> RouteClass<'_> {
        let path = normalize(path);
        let r = &self.routes;

        if r.static_prefixes.iter().any(|p| path_has_prefix(path, p)) || has_file_extension(path) {
            return RouteClass::Static;
        }
        if path_has_prefix(path, &r.api_prefix) {
            return RouteClass::Api;
        }
        if r.public_paths.iter().any(|p| normalize(p) == path) {
            let auth_page = r.auth_pages.iter().any(|p| normalize(p) == path);
            return RouteClass::Public { auth_page };
        }
        if r.profile_completion_paths.iter().any(|p| normalize(p) == path) {
            return RouteClass::ProfileCompletion;
        }
        if let Some(scope) = r.restricted.iter().find(|s| s.covers(path)) {
            return RouteClass::Restricted(&scope.roles);
        }
        RouteClass::Authenticated
    }

    /// Pure decision for `path` given the verified session, if any.
    pub fn decide(&self, path: &str, session: Option<&Identity>) -> GateDecision {
        self.decide_class(self.classify(path), path, session)
    }

    pub fn decide_class(
        &self,
        class: RouteClass<'_>,
        path: &str,
        session: Option<&Identity>,
    ) -> GateDecision {
        match (class, session) {
            (RouteClass::Static | RouteClass::Api | RouteClass::Public { auth_page: false }, _) => {
                GateDecision::Allow
            }
            (RouteClass::Public { auth_page: true }, session) => match session {
                Some(_) => self.to_landing(),
                None => GateDecision::Allow,
            },
            (RouteClass::ProfileCompletion | RouteClass::Authenticated, Some(_)) => {
                GateDecision::Allow
            }
            (RouteClass::Restricted(roles), Some(identity)) => {
                if roles.contains(&identity.role) {
                    GateDecision::Allow
                } else {
                    self.to_landing()
                }
            }
            (
                RouteClass::ProfileCompletion
                | RouteClass::Authenticated
                | RouteClass::Restricted(_),
                None,
            ) => GateDecision::Redirect {
                to: self.routes.login_path.clone(),
                next: Some(path.to_string()),
            },
        }
    }

    fn to_landing(&self) -> GateDecision {
        GateDecision::Redirect {
            to: self.routes.landing_path.clone(),
            next: None,
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn has_file_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or("");
    matches!(last.rsplit_once('.'), Some((stem, ext)) if !stem.is_empty() && !ext.is_empty())
}
