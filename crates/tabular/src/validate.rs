use std::collections::BTreeMap;

use models::{Error, ErrorCode, ParameterMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{sorter, validate_color, validate_format_spec};

/// Per-column text alignment.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            _ => None,
        }
    }

    /// GFM alignment marker for a Markdown table delimiter row.
    pub fn gfm_marker(&self) -> &'static str {
        match self {
            Alignment::Left => ":---",
            Alignment::Center => ":---:",
            Alignment::Right => "---:",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Full,
    Horizontal,
    Minimal,
    None,
}

impl BorderStyle {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(BorderStyle::Full),
            "horizontal" => Some(BorderStyle::Horizontal),
            "minimal" => Some(BorderStyle::Minimal),
            "none" => Some(BorderStyle::None),
            _ => None,
        }
    }
}

/// The validated parameter set of a table fragment. All index-keyed maps are
/// normalised to integer keys, and every cross-field invariant has been
/// checked.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub rows: Vec<Vec<Value>>,
    pub has_header: bool,
    pub title: Option<String>,
    pub width: String,
    pub column_alignments: Option<Vec<Alignment>>,
    pub border_style: BorderStyle,
    pub zebra_stripe: bool,
    pub compact: bool,
    pub number_format: Option<BTreeMap<usize, String>>,
    pub header_color: Option<String>,
    pub stripe_color: Option<String>,
    pub highlight_rows: Option<BTreeMap<usize, String>>,
    pub highlight_columns: Option<BTreeMap<usize, String>>,
    pub sort_by: Option<Value>,
    pub column_widths: Option<BTreeMap<usize, String>>,
}

impl TableSpec {
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn header_row(&self) -> Option<&Vec<Value>> {
        if self.has_header {
            self.rows.first()
        } else {
            None
        }
    }
}

/// Validate a table fragment's parameter map. Every violation raises a typed
/// failure carrying one of the table error codes of the closed taxonomy.
pub fn validate_table(params: &ParameterMap) -> Result<TableSpec, Error> {
    let rows = parse_rows(params.get("rows"))?;
    let column_count = rows[0].len();

    let mismatched: Vec<usize> = rows.iter().map(Vec::len).collect();
    if mismatched.iter().any(|&len| len != column_count) {
        return Err(Error::new(
            ErrorCode::InconsistentColumns,
            format!("All rows must have the same number of columns. Found: {mismatched:?}"),
        ));
    }

    let has_header = match params.get("has_header") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(Error::new(
                ErrorCode::InvalidTableData,
                format!("has_header must be a boolean, got {other}"),
            ))
        }
    };

    let title = opt_string(params, "title")?;
    let width = parse_width(params.get("width"))?;
    let border_style = parse_border_style(params.get("border_style"))?;
    let zebra_stripe = opt_bool(params, "zebra_stripe")?;
    let compact = opt_bool(params, "compact")?;

    let column_alignments = parse_alignments(params.get("column_alignments"), column_count)?;

    let number_format = parse_index_map(
        params.get("number_format"),
        column_count,
        ErrorCode::InvalidNumberFormat,
        "column",
    )?;
    if let Some(formats) = &number_format {
        for (col, spec) in formats {
            if !validate_format_spec(spec) {
                return Err(Error::new(
                    ErrorCode::InvalidNumberFormat,
                    format!("Invalid format specification for column {col}: {spec}"),
                ));
            }
        }
    }

    let header_color = opt_color(params, "header_color")?;
    let stripe_color = opt_color(params, "stripe_color")?;

    let highlight_rows = parse_index_map(
        params.get("highlight_rows"),
        rows.len(),
        ErrorCode::InvalidHighlight,
        "row",
    )?;
    let highlight_columns = parse_index_map(
        params.get("highlight_columns"),
        column_count,
        ErrorCode::InvalidHighlight,
        "column",
    )?;
    for highlights in [&highlight_rows, &highlight_columns].into_iter().flatten() {
        for (index, color) in highlights {
            if !validate_color(color) {
                return Err(Error::new(
                    ErrorCode::InvalidColor,
                    format!("Invalid highlight colour at index {index}: {color}"),
                ));
            }
        }
    }

    let sort_by = params.get("sort_by").filter(|v| !v.is_null()).cloned();
    if let Some(sort_by) = &sort_by {
        let header = if has_header { rows.first() } else { None };
        sorter::resolve_specs(sort_by, header, column_count)?;
    }

    let column_widths = parse_column_widths(params.get("column_widths"), column_count)?;

    Ok(TableSpec {
        rows,
        has_header,
        title,
        width,
        column_alignments,
        border_style,
        zebra_stripe,
        compact,
        number_format,
        header_color,
        stripe_color,
        highlight_rows,
        highlight_columns,
        sort_by,
        column_widths,
    })
}

fn parse_rows(rows: Option<&Value>) -> Result<Vec<Vec<Value>>, Error> {
    let Some(Value::Array(rows)) = rows else {
        return Err(Error::new(
            ErrorCode::InvalidTableData,
            "Table rows must be an array",
        ));
    };
    if rows.is_empty() {
        return Err(Error::new(
            ErrorCode::InvalidTableData,
            "Table rows cannot be empty",
        ));
    }
    rows.iter()
        .map(|row| match row {
            Value::Array(cells) => Ok(cells.clone()),
            _ => Err(Error::new(
                ErrorCode::InvalidTableData,
                "Each row must be an array",
            )),
        })
        .collect()
}

fn parse_width(width: Option<&Value>) -> Result<String, Error> {
    let width = match width {
        None | Some(Value::Null) => return Ok("auto".to_string()),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(Error::new(
                ErrorCode::InvalidWidth,
                format!("Width must be a string, got {other}"),
            ))
        }
    };
    if width == "auto" || width == "full" {
        return Ok(width);
    }
    let percent = width
        .strip_suffix('%')
        .and_then(|p| p.parse::<i64>().ok())
        .filter(|p| (1..=100).contains(p));
    if percent.is_none() {
        return Err(Error::new(
            ErrorCode::InvalidWidth,
            format!("Width must be 'auto', 'full', or a percentage (e.g. '80%'). Got: {width}"),
        ));
    }
    Ok(width)
}

fn parse_border_style(style: Option<&Value>) -> Result<BorderStyle, Error> {
    match style {
        None | Some(Value::Null) => Ok(BorderStyle::Full),
        Some(Value::String(s)) => BorderStyle::parse(s).ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidBorderStyle,
                format!("Border style must be one of full, horizontal, minimal, none. Got: {s}"),
            )
        }),
        Some(other) => Err(Error::new(
            ErrorCode::InvalidBorderStyle,
            format!("Border style must be a string, got {other}"),
        )),
    }
}

fn parse_alignments(
    alignments: Option<&Value>,
    column_count: usize,
) -> Result<Option<Vec<Alignment>>, Error> {
    let alignments = match alignments {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::new(
                ErrorCode::InvalidAlignment,
                format!("column_alignments must be an array, got {other}"),
            ))
        }
    };
    if alignments.len() != column_count {
        return Err(Error::new(
            ErrorCode::InvalidAlignment,
            format!(
                "Number of alignments ({}) must match number of columns ({column_count})",
                alignments.len()
            ),
        ));
    }
    alignments
        .iter()
        .map(|v| {
            v.as_str().and_then(Alignment::parse).ok_or_else(|| {
                Error::new(
                    ErrorCode::InvalidAlignment,
                    format!("Alignment must be one of left, center, right. Got: {v}"),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Parse an index-keyed map of strings, normalising JSON's string-typed keys
/// to integers and range-checking against `limit`.
fn parse_index_map(
    map: Option<&Value>,
    limit: usize,
    code: ErrorCode,
    axis: &str,
) -> Result<Option<BTreeMap<usize, String>>, Error> {
    let map = match map {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(Error::new(
                code,
                format!("Expected an object keyed by {axis} index, got {other}"),
            ))
        }
    };

    let mut out = BTreeMap::new();
    for (key, value) in map {
        let index: usize = key.parse().map_err(|_| {
            Error::new(
                code,
                format!("{axis} index must be a non-negative integer. Got: {key}"),
            )
        })?;
        if index >= limit {
            return Err(Error::new(
                code,
                format!("{axis} index {index} exceeds count ({limit})"),
            ));
        }
        let Some(value) = value.as_str() else {
            return Err(Error::new(
                code,
                format!("Value for {axis} {index} must be a string, got {value}"),
            ));
        };
        out.insert(index, value.to_string());
    }
    Ok(Some(out))
}

fn parse_column_widths(
    widths: Option<&Value>,
    column_count: usize,
) -> Result<Option<BTreeMap<usize, String>>, Error> {
    let Some(widths) = parse_index_map(
        widths,
        column_count,
        ErrorCode::InvalidColumnWidth,
        "column",
    )?
    else {
        return Ok(None);
    };

    let mut total = 0.0f64;
    for (col, width) in &widths {
        let percent = width
            .strip_suffix('%')
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| *p > 0.0 && *p <= 100.0);
        let Some(percent) = percent else {
            return Err(Error::new(
                ErrorCode::InvalidColumnWidth,
                format!("Column width for column {col} must be a percentage string between 0% and 100%. Got: {width}"),
            ));
        };
        total += percent;
    }
    if total > 100.0 {
        return Err(Error::new(
            ErrorCode::InvalidColumnWidth,
            format!("Total column widths ({total}%) exceed 100%"),
        ));
    }
    Ok(Some(widths))
}

fn opt_string(params: &ParameterMap, key: &str) -> Result<Option<String>, Error> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::new(
            ErrorCode::InvalidTableData,
            format!("{key} must be a string, got {other}"),
        )),
    }
}

fn opt_bool(params: &ParameterMap, key: &str) -> Result<bool, Error> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::new(
            ErrorCode::InvalidTableData,
            format!("{key} must be a boolean, got {other}"),
        )),
    }
}

fn opt_color(params: &ParameterMap, key: &str) -> Result<Option<String>, Error> {
    let Some(color) = opt_string(params, key)? else {
        return Ok(None);
    };
    if !validate_color(&color) {
        return Err(Error::new(
            ErrorCode::InvalidColor,
            format!("Invalid {key}: must be a theme colour or hex literal. Got: {color}"),
        ));
    }
    Ok(Some(color))
}
