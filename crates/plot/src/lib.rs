mod params;
mod renderer;
mod svg;
mod themes;
mod validator;

pub use params::{GraphParams, GraphType, Series};
pub use renderer::{PlotBackend, PlotRenderer, RenderedImage};
pub use svg::SvgBackend;
pub use themes::{theme_catalog, Theme, ThemeInfo, ThemePalette};
pub use validator::{handler_catalog, validate_graph_params, HandlerInfo};
