mod auth;
mod dispatch;
pub mod http;
mod images;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

pub use auth::{AuthGate, JwtVerifier, RequestCredentials, TokenVerifier, TOKEN_OPTIONAL_TOOLS};
pub use dispatch::{dispatch_tool_call, TOOL_NAMES};
pub use images::{ImageValidator, ValidatedImage};

/// Deployment knobs for the API surfaces.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    /// When set, proxy responses carry `download_url` rooted here.
    pub public_base_url: Option<String>,
    /// Directory served by the stock-image endpoints, if any.
    pub stock_images_dir: Option<PathBuf>,
}

/// App is the shared state behind both transport surfaces.
pub struct App {
    pub registry: Arc<registry::Registry>,
    pub sessions: sessions::SessionManager,
    pub engine: render::RenderingEngine,
    pub blobs: Arc<blobs::BlobStore>,
    pub plots: Option<blobs::PlotStore>,
    pub plot_renderer: plot::PlotRenderer,
    pub gate: AuthGate,
    pub image_validator: ImageValidator,
    pub config: ApiConfig,
}
