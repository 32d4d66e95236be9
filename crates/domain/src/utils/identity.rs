//! Participant identity helpers

use once_cell::sync::Lazy;
use regex::Regex;

static IDENTITY_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^@([^:]+):").ok());

/// Extract the human-readable name from a participant identifier.
///
/// Identifiers of the shape `@localpart:domain` yield `localpart`; anything
/// else is returned unchanged.
///
/// # Examples
///
/// ```
/// use rtcscope_domain::utils::identity::extract_name;
///
/// assert_eq!(extract_name("@alice:example.org"), "alice");
/// assert_eq!(extract_name("anonymous-guest"), "anonymous-guest");
/// ```
#[must_use]
pub fn extract_name(identity: &str) -> String {
    IDENTITY_PATTERN
        .as_ref()
        .and_then(|pattern| pattern.captures(identity))
        .and_then(|captures| captures.get(1))
        .map_or_else(|| identity.to_string(), |localpart| localpart.as_str().to_string())
}
