//! The `walrus://` pointer convention.
//!
//! A pointer is the literal prefix followed by the content id. Nothing else is
//! parsed out of it.

pub const SCHEME_PREFIX: &str = "walrus://";

pub fn to_uri(content_id: &str) -> String {
    format!("{SCHEME_PREFIX}{content_id}")
}

/// Content id behind a pointer, or `None` for any other scheme or an empty id.
pub fn content_id(uri: &str) -> Option<&str> {
    uri.strip_prefix(SCHEME_PREFIX).filter(|id| !id.is_empty())
}
