//! Endpoint URL construction that is forgiving about slashes.

/// Joins a configured base URL and a path segment without doubling slashes.
pub fn endpoint_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
