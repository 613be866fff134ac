use serde::{Deserialize, Serialize};

/// The supported chart kinds, one handler each.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    Bar,
    Line,
    Scatter,
}

impl GraphType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::Bar => "bar",
            GraphType::Line => "line",
            GraphType::Scatter => "scatter",
        }
    }
}

/// One data series. `x` values may be categorical (strings) or numeric; `y`
/// values are always numeric.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Series {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Vec<serde_json::Value>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// GraphParams is the parsed payload of a `render_graph` call.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GraphParams {
    pub graph_type: GraphType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    pub series: Vec<Series>,
    #[serde(default)]
    pub theme: crate::Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl GraphParams {
    pub fn width(&self) -> u32 {
        self.width.unwrap_or(800)
    }

    pub fn height(&self) -> u32 {
        self.height.unwrap_or(500)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha.unwrap_or(1.0)
    }
}
