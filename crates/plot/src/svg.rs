use crate::{GraphParams, GraphType, PlotBackend, RenderedImage};

/// The built-in chart backend: emits standalone SVG documents. Small and
/// dependency-free, which keeps rendering deterministic across platforms.
#[derive(Debug, Default)]
pub struct SvgBackend;

const MAX_MARGIN: f64 = 52.0;

impl PlotBackend for SvgBackend {
    fn render(&mut self, params: &GraphParams) -> anyhow::Result<RenderedImage> {
        let svg = draw(params)?;
        Ok(RenderedImage {
            bytes: svg.into_bytes(),
            format: "svg".to_string(),
            content_type: "image/svg+xml".to_string(),
        })
    }
}

fn draw(params: &GraphParams) -> anyhow::Result<String> {
    let width = f64::from(params.width());
    let height = f64::from(params.height());
    let palette = params.theme.palette();
    let alpha = params.alpha();

    // The margin scales down with the canvas so any positive size renders.
    let margin = MAX_MARGIN.min(width.min(height) / 4.0);
    let (plot_w, plot_h) = (width - 2.0 * margin, height - 2.0 * margin);
    anyhow::ensure!(plot_w > 0.0 && plot_h > 0.0, "plot area is empty");

    let y_min = params
        .series
        .iter()
        .flat_map(|s| s.y.iter())
        .fold(0.0f64, |acc, &y| acc.min(y));
    let y_max = params
        .series
        .iter()
        .flat_map(|s| s.y.iter())
        .fold(f64::MIN, |acc, &y| acc.max(y));
    let y_span = (y_max - y_min).max(1e-9);

    let to_py = |y: f64| margin + plot_h - ((y - y_min) / y_span) * plot_h;

    let mut out = String::new();
    out.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#,
    ));
    out.push_str(&format!(
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        palette.background
    ));

    // Axes.
    out.push_str(&format!(
        r#"<line x1="{margin}" y1="{margin}" x2="{margin}" y2="{}" stroke="{}"/>"#,
        margin + plot_h,
        palette.grid
    ));
    out.push_str(&format!(
        r#"<line x1="{margin}" y1="{}" x2="{}" y2="{}" stroke="{}"/>"#,
        margin + plot_h,
        margin + plot_w,
        margin + plot_h,
        palette.grid
    ));

    if let Some(title) = &params.title {
        out.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="16" fill="{}">{}</text>"#,
            width / 2.0,
            margin / 2.0,
            palette.foreground,
            escape(title)
        ));
    }
    if let Some(label) = &params.x_label {
        out.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="12" fill="{}">{}</text>"#,
            width / 2.0,
            height - 12.0,
            palette.foreground,
            escape(label)
        ));
    }
    if let Some(label) = &params.y_label {
        out.push_str(&format!(
            r#"<text x="14" y="{}" text-anchor="middle" font-size="12" fill="{}" transform="rotate(-90 14 {})">{}</text>"#,
            height / 2.0,
            palette.foreground,
            height / 2.0,
            escape(label)
        ));
    }

    for (index, series) in params.series.iter().enumerate() {
        let color = series
            .color
            .as_deref()
            .map(|c| tabular::css_color(c))
            .transpose()?
            .unwrap_or_else(|| palette.series[index % palette.series.len()].to_string());

        let points: Vec<(f64, f64)> = series
            .y
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let x_fraction = match series.x.get(i).and_then(numeric) {
                    Some(x) => x_fraction_of(params, x),
                    None if series.y.len() > 1 => i as f64 / (series.y.len() - 1) as f64,
                    None => 0.5,
                };
                (margin + x_fraction * plot_w, to_py(y))
            })
            .collect();

        match params.graph_type {
            GraphType::Bar => {
                let groups = series.y.len() as f64;
                let band = plot_w / groups;
                let bar_w = band / (params.series.len() as f64 + 1.0);
                for (i, &y) in series.y.iter().enumerate() {
                    let x = margin + i as f64 * band + bar_w * (index as f64 + 0.5);
                    let top = to_py(y.max(0.0));
                    let bottom = to_py(y.min(0.0).max(y_min));
                    out.push_str(&format!(
                        r#"<rect x="{x:.2}" y="{top:.2}" width="{bar_w:.2}" height="{:.2}" fill="{color}" fill-opacity="{alpha}"/>"#,
                        (bottom - top).abs().max(1.0),
                    ));
                }
            }
            GraphType::Line => {
                let path: Vec<String> = points
                    .iter()
                    .map(|(x, y)| format!("{x:.2},{y:.2}"))
                    .collect();
                out.push_str(&format!(
                    r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="2" stroke-opacity="{alpha}"/>"#,
                    path.join(" ")
                ));
            }
            GraphType::Scatter => {
                for (x, y) in &points {
                    out.push_str(&format!(
                        r#"<circle cx="{x:.2}" cy="{y:.2}" r="4" fill="{color}" fill-opacity="{alpha}"/>"#,
                    ));
                }
            }
        }
    }

    out.push_str("</svg>");
    Ok(out)
}

/// Where a numeric x value falls within the series' overall x range.
fn x_fraction_of(params: &GraphParams, x: f64) -> f64 {
    let xs: Vec<f64> = params
        .series
        .iter()
        .flat_map(|s| s.x.iter())
        .filter_map(numeric)
        .collect();
    let min = xs.iter().copied().fold(f64::MAX, f64::min);
    let max = xs.iter().copied().fold(f64::MIN, f64::max);
    if max > min {
        (x - min) / (max - min)
    } else {
        0.5
    }
}

fn numeric(value: &serde_json::Value) -> Option<f64> {
    value.as_f64()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PlotRenderer, Series, Theme};

    fn params(graph_type: GraphType) -> GraphParams {
        GraphParams {
            graph_type,
            title: Some("Revenue <by> quarter".into()),
            x_label: Some("Quarter".into()),
            y_label: Some("USD".into()),
            series: vec![
                Series {
                    name: Some("2024".into()),
                    x: vec!["Q1".into(), "Q2".into(), "Q3".into()],
                    y: vec![10.0, 25.0, 17.5],
                    color: None,
                },
                Series {
                    name: Some("2025".into()),
                    x: vec!["Q1".into(), "Q2".into(), "Q3".into()],
                    y: vec![12.0, 24.0, 30.0],
                    color: Some("#336699".into()),
                },
            ],
            theme: Theme::Dark,
            width: Some(640),
            height: Some(400),
            alpha: Some(0.9),
        }
    }

    #[test]
    fn renders_each_graph_type() {
        let renderer = PlotRenderer::new(Box::new(SvgBackend));
        for graph_type in [GraphType::Bar, GraphType::Line, GraphType::Scatter] {
            let image = renderer.render(&params(graph_type)).unwrap();
            let svg = String::from_utf8(image.bytes).unwrap();
            assert!(svg.starts_with("<svg"), "{graph_type:?}");
            assert!(svg.ends_with("</svg>"));
            assert_eq!(image.format, "svg");
            assert_eq!(image.content_type, "image/svg+xml");
            // Title is escaped, themed background applied.
            assert!(svg.contains("Revenue &lt;by&gt; quarter"));
            assert!(svg.contains("#15181e"));
        }
    }

    #[test]
    fn explicit_series_color_wins() {
        let renderer = PlotRenderer::new(Box::new(SvgBackend));
        let image = renderer.render(&params(GraphType::Line)).unwrap();
        let svg = String::from_utf8(image.bytes).unwrap();
        assert!(svg.contains("#336699"));
    }

    #[test]
    fn small_canvases_render() {
        let renderer = PlotRenderer::new(Box::new(SvgBackend));
        let mut p = params(GraphType::Bar);
        p.width = Some(50);
        p.height = Some(50);
        let image = renderer.render(&p).unwrap();
        let svg = String::from_utf8(image.bytes).unwrap();
        assert!(svg.contains(r#"width="50""#), "{svg}");
    }

    #[test]
    fn identical_inputs_render_identical_bytes() {
        let renderer = PlotRenderer::new(Box::new(SvgBackend));
        let a = renderer.render(&params(GraphType::Bar)).unwrap();
        let b = renderer.render(&params(GraphType::Bar)).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }
}
