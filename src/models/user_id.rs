//! Trimmed UUID user identifiers
//!
//! User ids travel as 32 lowercase hex characters, i.e. a UUID with its
//! hyphens removed. Both the trimmed and the hyphenated lowercase forms are
//! accepted on input.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static TRIMMED_UUID: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-f0-9]{32}$").expect("valid trimmed uuid regex"));

static HYPHENATED_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("valid uuid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Not a UUID: {0}")]
pub struct UserIdError(pub String);

/// UUID rendered without hyphens
pub fn trim(id: &Uuid) -> String {
    id.simple().to_string()
}

/// Whether `input` is a lowercase UUID, trimmed or hyphenated
pub fn is_uuid(input: &str) -> bool {
    TRIMMED_UUID.is_match(input) || HYPHENATED_UUID.is_match(input)
}

pub fn from_trimmed(input: &str) -> Result<Uuid, UserIdError> {
    if !is_uuid(input) {
        return Err(UserIdError(input.to_string()));
    }
    Uuid::try_parse(input).map_err(|_| UserIdError(input.to_string()))
}

/// Normalizes either accepted form to the trimmed form
pub fn normalize(input: &str) -> Result<String, UserIdError> {
    from_trimmed(input).map(|id| trim(&id))
}
