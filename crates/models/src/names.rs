use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Group applied to persisted artefacts when a request carries no credential
/// and the deployment permits unauthenticated access.
pub const DEFAULT_GROUP: &str = "public";

lazy_static! {
    /// Aliases are short human-friendly handles: letters, digits, underscore
    /// and dash, between 3 and 64 characters.
    pub static ref ALIAS_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,64}$").unwrap();
}

/// Alias is a validated human-friendly name, unique within a group, which
/// may denote either a session or a blob.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alias(String);

impl Alias {
    pub fn parse(s: &str) -> Result<Self, crate::Error> {
        if !ALIAS_RE.is_match(s) {
            return Err(crate::Error::new(
                crate::ErrorCode::InvalidOperation,
                format!(
                    "invalid alias {s:?}: aliases are 3-64 characters of letters, digits, underscore, or dash"
                ),
            ));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Alias {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
