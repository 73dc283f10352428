//! User-Agent string sent with every request.

/// Default User-Agent: `grab/<crate version>`.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("grab/{version}")
}
