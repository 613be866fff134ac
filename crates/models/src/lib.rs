mod assets;
mod blob;
mod error;
mod format;
mod names;
mod params;
mod session;

pub use assets::{FragmentDef, StyleDef, TemplateDef};
pub use blob::{ArtefactType, BlobExtra, BlobMeta};
pub use error::{Envelope, Error, ErrorCode, ToolContent, ToolResponse};
pub use format::OutputFormat;
pub use names::{Alias, ALIAS_RE, DEFAULT_GROUP};
pub use params::{ParamType, ParameterSpec};
pub use session::{DocumentSession, FragmentInstance, SessionStatus};

/// Parameter values flow through the system as open JSON maps.
/// Schemas constrain them at the validation seams.
pub type ParameterMap = serde_json::Map<String, serde_json::Value>;

/// Current time as an ISO-8601 UTC timestamp, the wire format of every
/// `created_at` / `updated_at` in this workspace.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse `s` as a UUID, returning it in canonical hyphenated form.
pub fn parse_guid(s: &str) -> Option<String> {
    uuid::Uuid::parse_str(s).ok().map(|u| u.to_string())
}
