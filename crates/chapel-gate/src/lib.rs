//! chapel-gate
//!
//! Request gating for the Chapel site. [`RoutePolicy::decide`] is a pure
//! function of the request path and the verified session; the axum
//! [`gate_middleware`] only reads the session cookie through the edge verifier
//! and translates the decision into a pass-through or a redirect.

#![forbid(unsafe_code)]

mod continuation;
mod middleware;
mod policy;
mod render;

pub use continuation::{NEXT_PARAM, safe_next, with_next};
pub use middleware::{GateState, gate_middleware};
pub use policy::{GateDecision, RouteClass, RoutePolicy};
pub use render::resolve_render_role;
