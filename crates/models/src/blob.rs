use serde::{Deserialize, Serialize};

/// ArtefactType partitions blobs between rendered documents and plot images.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtefactType {
    Document,
    PlotImage,
}

/// Open extension record attached to blob metadata.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BlobExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artefact_type: Option<ArtefactType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Remaining extra fields, preserved verbatim.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// BlobMeta is the catalogue record of one stored artefact. The catalogue,
/// not the content file, is the source of truth for group, format and age.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlobMeta {
    pub guid: String,
    pub format: String,
    pub group: String,
    pub size: u64,
    pub created_at: String,
    #[serde(default)]
    pub extra: BlobExtra,
}

impl BlobMeta {
    pub fn artefact_type(&self) -> Option<ArtefactType> {
        self.extra.artefact_type
    }

    /// Age test against a purge cutoff. Records with an unparseable
    /// timestamp are treated as older than any cutoff.
    pub fn created_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.created_at) {
            Ok(t) => t.with_timezone(&chrono::Utc) < cutoff,
            Err(_) => true,
        }
    }
}
