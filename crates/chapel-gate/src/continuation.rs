//! The `next` continuation parameter carried through the login redirect.

pub const NEXT_PARAM: &str = "next";

/// `to?next=<path>`, percent-encoded except for `/`.
pub fn with_next(to: &str, next: Option<&str>) -> String {
    match next {
        Some(next) => {
            let encoded = urlencoding::encode(next).replace("%2F", "/");
            let sep = if to.contains('?') { '&' } else { '?' };
            format!("{to}{sep}{NEXT_PARAM}={encoded}")
        }
        None => to.to_string(),
    }
}

/// Only same-origin relative paths are followed after login.
pub fn safe_next<'a>(next: Option<&'a str>, fallback: &'a str) -> &'a str {
    match next {
        Some(n)
            if n.starts_with('/')
                && !n.starts_with("//")
                && !n.contains('\\')
                && !n.chars().any(char::is_control) =>
        {
            n
        }
        _ => fallback,
    }
}
