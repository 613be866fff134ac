use std::sync::Arc;

use base64::Engine;
use models::{ArtefactType, BlobExtra, Error};
use serde::Serialize;

use crate::BlobStore;

/// Summary of one stored plot image.
#[derive(Serialize, Debug, Clone)]
pub struct PlotImageInfo {
    pub guid: String,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub size: u64,
    pub created_at: String,
}

/// PlotStore is a filtered view over the shared BlobStore: plot images and
/// rendered documents coexist in one catalogue, segregated by
/// `artefact_type = plot_image` rather than by separate storage instances.
#[derive(Clone)]
pub struct PlotStore {
    store: Arc<BlobStore>,
}

impl PlotStore {
    pub fn new(store: Arc<BlobStore>) -> Self {
        Self { store }
    }

    /// Store a plot image, tagging it as a plot artefact and optionally
    /// registering an alias. A taken alias is reported but does not fail the
    /// save.
    pub async fn save_image(
        &self,
        bytes: Vec<u8>,
        format: &str,
        group: &str,
        alias: Option<&str>,
    ) -> Result<String, Error> {
        let extra = BlobExtra {
            artefact_type: Some(ArtefactType::PlotImage),
            ..Default::default()
        };
        let guid = self
            .store
            .save(bytes, format.to_string(), group.to_string(), extra)
            .await?;

        if let Some(alias) = alias {
            if let Err(error) = self.store.register_alias(alias, &guid, group) {
                tracing::warn!(alias, %guid, group, ?error, "plot alias registration failed");
            }
        }
        Ok(guid)
    }

    /// Fetch a plot image by GUID or alias within `group`.
    pub async fn get_image(
        &self,
        identifier: &str,
        group: &str,
    ) -> Result<Option<(Vec<u8>, String)>, Error> {
        self.store
            .get(identifier.to_string(), Some(group.to_string()))
            .await
    }

    /// All plot images in `group` (or every group), newest last.
    pub fn list_images(&self, group: Option<&str>) -> Vec<PlotImageInfo> {
        let mut images: Vec<PlotImageInfo> = self
            .store
            .list_meta(group)
            .into_iter()
            .filter(|meta| meta.artefact_type() == Some(ArtefactType::PlotImage))
            .map(|meta| PlotImageInfo {
                alias: self.store.alias_of(&meta.guid),
                guid: meta.guid,
                format: meta.format,
                size: meta.size,
                created_at: meta.created_at,
            })
            .collect();
        images.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        images
    }

    /// A `data:` URI of the image, for embedding into rendered HTML and PDF.
    pub async fn get_image_as_data_uri(
        &self,
        identifier: &str,
        group: &str,
    ) -> Result<Option<String>, Error> {
        let Some((bytes, format)) = self.get_image(identifier, group).await? else {
            return Ok(None);
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(Some(format!(
            "data:{};base64,{encoded}",
            image_content_type(&format)
        )))
    }

    pub fn resolve(&self, identifier: &str, group: &str) -> Option<String> {
        self.store.resolve(identifier, group)
    }
}

/// Content type of a stored image format.
pub(crate) fn image_content_type(format: &str) -> &'static str {
    match format {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
