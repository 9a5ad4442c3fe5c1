//! Which navigation shell a page renders under.

use chapel_api::Role;

/// Pick the shell role for a page.
///
/// A page may ask to render as the session's own role or as `Member`; any
/// other request collapses to `Member`. `TopAdmin` sessions always get the
/// `TopAdmin` shell so its navigation is never hidden. The result is never
/// more privileged than `session_role`.
pub fn resolve_render_role(session_role: Role, requested: Option<Role>) -> Role {
    let Some(requested) = requested else {
        return session_role;
    };
    if session_role == Role::TopAdmin {
        return Role::TopAdmin;
    }
    if requested == session_role || requested == Role::Member {
        requested
    } else {
        Role::Member
    }
}
