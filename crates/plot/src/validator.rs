use models::{Error, ErrorCode};
use serde::Serialize;

use crate::{GraphParams, GraphType};

const MAX_POINTS: usize = 10_000;

/// Validate graph parameters ahead of rendering.
///
/// Structural problems (alpha, colours, empty series list) fail with
/// `INVALID_GRAPH_PARAMS`; per-series data-shape problems fail with
/// `GRAPH_VALIDATION_ERROR`.
pub fn validate_graph_params(params: &GraphParams) -> Result<(), Error> {
    if params.series.is_empty() {
        return Err(Error::new(
            ErrorCode::InvalidGraphParams,
            "At least one series is required",
        ));
    }

    let alpha = params.alpha();
    if !(0.0..=1.0).contains(&alpha) {
        return Err(Error::new(
            ErrorCode::InvalidGraphParams,
            format!("alpha must be between 0 and 1 inclusive, got {alpha}"),
        ));
    }

    for (index, series) in params.series.iter().enumerate() {
        if series.y.is_empty() {
            return Err(Error::new(
                ErrorCode::GraphValidationError,
                format!("Series {index} has no y values"),
            ));
        }
        if !series.x.is_empty() && series.x.len() != series.y.len() {
            return Err(Error::new(
                ErrorCode::GraphValidationError,
                format!(
                    "Series {index} has {} x values but {} y values",
                    series.x.len(),
                    series.y.len()
                ),
            ));
        }
        if series.y.len() > MAX_POINTS {
            return Err(Error::new(
                ErrorCode::GraphValidationError,
                format!("Series {index} exceeds {MAX_POINTS} points"),
            ));
        }
        if series.y.iter().any(|y| !y.is_finite()) {
            return Err(Error::new(
                ErrorCode::GraphValidationError,
                format!("Series {index} contains non-finite y values"),
            ));
        }
        if let Some(color) = &series.color {
            if !tabular::validate_color(color) {
                return Err(Error::new(
                    ErrorCode::InvalidGraphParams,
                    format!("Invalid series colour: {color}"),
                ));
            }
        }
    }

    Ok(())
}

/// Summary row for the `list_handlers` discovery tool.
#[derive(Serialize, Debug, Clone)]
pub struct HandlerInfo {
    pub graph_type: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn handler_catalog() -> Vec<HandlerInfo> {
    vec![
        HandlerInfo {
            graph_type: GraphType::Bar.as_str(),
            name: "Bar chart",
            description: "Grouped vertical bars; x values are category labels",
        },
        HandlerInfo {
            graph_type: GraphType::Line.as_str(),
            name: "Line chart",
            description: "Connected points per series, in x order",
        },
        HandlerInfo {
            graph_type: GraphType::Scatter.as_str(),
            name: "Scatter plot",
            description: "Unconnected points; x values must be numeric",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Series;

    fn base() -> GraphParams {
        GraphParams {
            graph_type: GraphType::Bar,
            title: None,
            x_label: None,
            y_label: None,
            series: vec![Series {
                name: Some("revenue".into()),
                x: vec!["Q1".into(), "Q2".into()],
                y: vec![10.0, 20.0],
                color: None,
            }],
            theme: crate::Theme::Default,
            width: None,
            height: None,
            alpha: None,
        }
    }

    #[test]
    fn valid_params_pass() {
        validate_graph_params(&base()).unwrap();
    }

    #[test]
    fn alpha_boundaries() {
        for ok in [0.0, 0.5, 1.0] {
            let mut p = base();
            p.alpha = Some(ok);
            assert!(validate_graph_params(&p).is_ok(), "alpha {ok}");
        }
        for bad in [-0.1, 1.5] {
            let mut p = base();
            p.alpha = Some(bad);
            let err = validate_graph_params(&p).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidGraphParams, "alpha {bad}");
        }
    }

    #[test]
    fn empty_series_list_fails() {
        let mut p = base();
        p.series.clear();
        let err = validate_graph_params(&p).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGraphParams);
    }

    #[test]
    fn mismatched_xy_lengths_fail() {
        let mut p = base();
        p.series[0].x.pop();
        let err = validate_graph_params(&p).unwrap_err();
        assert_eq!(err.code, ErrorCode::GraphValidationError);
    }

    #[test]
    fn bad_series_color_fails() {
        let mut p = base();
        p.series[0].color = Some("not-a-colour".into());
        let err = validate_graph_params(&p).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGraphParams);
    }
}
