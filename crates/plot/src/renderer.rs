use std::sync::Mutex;

use models::{Error, ErrorCode};

use crate::{validate_graph_params, GraphParams};

/// A rendered chart image, copied out of the backend before the renderer
/// lock is released.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub format: String,
    pub content_type: String,
}

/// The chart-drawing collaborator. Backends are not re-entrant; the renderer
/// owns exactly one instance and serialises calls to it.
pub trait PlotBackend: Send {
    fn render(&mut self, params: &GraphParams) -> anyhow::Result<RenderedImage>;
}

/// PlotRenderer validates parameters and drives the single backend instance
/// behind a mutex.
pub struct PlotRenderer {
    backend: Mutex<Box<dyn PlotBackend>>,
}

impl PlotRenderer {
    pub fn new(backend: Box<dyn PlotBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    pub fn render(&self, params: &GraphParams) -> Result<RenderedImage, Error> {
        validate_graph_params(params)?;

        let mut backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        let image = backend.render(params).map_err(|err| {
            Error::new(ErrorCode::RenderError, "chart rendering failed")
                .with_details(serde_json::json!({"backend_error": format!("{err:#}")}))
        })?;
        drop(backend);

        tracing::debug!(
            graph_type = params.graph_type.as_str(),
            size = image.bytes.len(),
            format = %image.format,
            "chart rendered"
        );
        Ok(image)
    }
}
