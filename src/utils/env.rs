/// Get environment variable with `ESTATE_` prefix, falling back to the unprefixed name.
///
/// ```rust,ignore
/// use estate_auth::utils::get_env_with_prefix;
///
/// // Checks ESTATE_JWT_SECRET first, then JWT_SECRET
/// let secret = get_env_with_prefix("JWT_SECRET");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("ESTATE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a comma separated environment value into trimmed, non-empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
