//! Sensitive-key stripping for caller-supplied properties

use crate::events::Properties;

/// Key fragments that mark a property as sensitive
///
/// Matching is a case-insensitive substring test, so `apiKey`,
/// `token_expiry` and `db_password_hint` are all dropped.
pub const SENSITIVE_KEY_FRAGMENTS: &[&str] = &["key", "password", "token"];

/// Copy `properties`, leaving out every entry with a sensitive key
pub fn sanitize(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(key, _)| !is_sensitive_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}
