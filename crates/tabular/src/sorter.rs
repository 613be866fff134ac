use models::{Error, ErrorCode};
use serde_json::Value;

/// A resolved sort instruction: a 0-based column plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: usize,
    pub descending: bool,
}

/// Sort table rows by one or more columns.
///
/// `sort_by` accepts a column name (requires `has_header`), a 0-based column
/// index, an object `{"column": name_or_index, "order": "asc"|"desc"}`, or an
/// array of those for a lexicographic multi-column sort. The sort is stable:
/// rows with equal keys keep their input order.
///
/// Numeric cells (numbers, or strings that parse as numbers once thousands
/// separators are stripped) compare numerically and always order before
/// non-numeric cells. Non-numeric cells compare as case-insensitive strings;
/// descending string order negates each character rather than reversing an
/// ascending sort, so equal keys keep input order in both directions.
pub fn sort_table_rows(
    rows: &[Vec<Value>],
    sort_by: &Value,
    has_header: bool,
) -> Result<Vec<Vec<Value>>, Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let (header, data): (Option<&Vec<Value>>, &[Vec<Value>]) = if has_header {
        (Some(&rows[0]), &rows[1..])
    } else {
        (None, rows)
    };
    if data.is_empty() {
        return Ok(rows.to_vec());
    }

    let specs = resolve_specs(sort_by, header, data[0].len())?;

    let mut sorted: Vec<Vec<Value>> = data.to_vec();
    sorted.sort_by(|a, b| {
        let ka = specs.iter().map(|s| cell_key(a, s));
        let kb = specs.iter().map(|s| cell_key(b, s));
        ka.cmp(kb)
    });

    let mut out = Vec::with_capacity(rows.len());
    if let Some(header) = header {
        out.push(header.clone());
    }
    out.extend(sorted);
    Ok(out)
}

/// Resolve a raw `sort_by` value into column indices and directions.
pub fn resolve_specs(
    sort_by: &Value,
    header: Option<&Vec<Value>>,
    column_count: usize,
) -> Result<Vec<SortSpec>, Error> {
    let raw: Vec<&Value> = match sort_by {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut specs = Vec::with_capacity(raw.len());
    for spec in raw {
        specs.push(resolve_one(spec, header, column_count)?);
    }
    Ok(specs)
}

fn resolve_one(
    spec: &Value,
    header: Option<&Vec<Value>>,
    column_count: usize,
) -> Result<SortSpec, Error> {
    match spec {
        Value::String(name) => Ok(SortSpec {
            column: column_by_name(name, header)?,
            descending: false,
        }),
        Value::Number(_) => Ok(SortSpec {
            column: column_by_index(spec, column_count)?,
            descending: false,
        }),
        Value::Object(map) => {
            let column = map.get("column").ok_or_else(|| {
                Error::new(
                    ErrorCode::InvalidSort,
                    "Sort specification object must have a 'column' key",
                )
            })?;
            let column = match column {
                Value::String(name) => column_by_name(name, header)?,
                Value::Number(_) => column_by_index(column, column_count)?,
                other => {
                    return Err(Error::new(
                        ErrorCode::InvalidSort,
                        format!("Sort column must be a string or integer, got {other}"),
                    ))
                }
            };
            let descending = match map.get("order").and_then(Value::as_str) {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(Error::new(
                        ErrorCode::InvalidSort,
                        format!("Sort order must be 'asc' or 'desc', got '{other}'"),
                    ))
                }
            };
            Ok(SortSpec { column, descending })
        }
        other => Err(Error::new(
            ErrorCode::InvalidSort,
            format!("Invalid sort specification: {other}"),
        )),
    }
}

fn column_by_name(name: &str, header: Option<&Vec<Value>>) -> Result<usize, Error> {
    let Some(header) = header else {
        return Err(Error::new(
            ErrorCode::InvalidSort,
            "Sorting by column name requires has_header=true",
        ));
    };
    header
        .iter()
        .position(|cell| cell.as_str() == Some(name))
        .ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidSort,
                format!("Sort column '{name}' not found in header row"),
            )
        })
}

fn column_by_index(index: &Value, column_count: usize) -> Result<usize, Error> {
    let idx = index.as_u64().and_then(|i| usize::try_from(i).ok());
    match idx {
        Some(i) if i < column_count => Ok(i),
        _ => Err(Error::new(
            ErrorCode::InvalidSort,
            format!(
                "Sort column index {index} out of range (0-{})",
                column_count.saturating_sub(1)
            ),
        )),
    }
}

/// A comparison key for one cell under one sort spec. Numeric keys order
/// before text keys in both directions.
#[derive(Debug, PartialEq)]
enum Key {
    Num(f64),
    Text(Vec<i64>),
}

impl Eq for Key {}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Key::Num(a), Key::Num(b)) => a.total_cmp(b),
            (Key::Num(_), Key::Text(_)) => std::cmp::Ordering::Less,
            (Key::Text(_), Key::Num(_)) => std::cmp::Ordering::Greater,
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn cell_key(row: &[Value], spec: &SortSpec) -> Key {
    let Some(value) = row.get(spec.column) else {
        // Short rows sort as zero ascending and last descending.
        return Key::Num(if spec.descending { f64::INFINITY } else { 0.0 });
    };

    if let Some(n) = numeric_value(value) {
        return Key::Num(if spec.descending { -n } else { n });
    }

    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    let chars = text
        .chars()
        .map(|c| {
            let code = c as i64;
            if spec.descending {
                -code
            } else {
                code
            }
        })
        .collect();
    Key::Text(chars)
}

/// Numeric interpretation of a cell, if it has one. Strings are parsed after
/// stripping thousands separators.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let parsed = s.replace(',', "").trim().parse::<f64>().ok()?;
            if parsed.is_nan() {
                None
            } else {
                Some(parsed)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(v: Value) -> Vec<Vec<Value>> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn sorts_numeric_strings_numerically() {
        let table = rows(json!([
            ["Name", "Price"],
            ["A", "100"],
            ["B", "25"],
            ["C", "50"],
        ]));
        let sorted = sort_table_rows(&table, &json!("Price"), true).unwrap();
        assert_eq!(sorted[1], rows(json!([["B", "25"]]))[0]);
        assert_eq!(sorted[2], rows(json!([["C", "50"]]))[0]);
        assert_eq!(sorted[3], rows(json!([["A", "100"]]))[0]);
    }

    #[test]
    fn strips_thousands_separators() {
        let table = rows(json!([["1,000"], ["200"], ["30"]]));
        let sorted = sort_table_rows(&table, &json!(0), false).unwrap();
        assert_eq!(sorted, rows(json!([["30"], ["200"], ["1,000"]])));
    }

    #[test]
    fn descending_by_object_spec() {
        let table = rows(json!([["A", "B"], ["2", "X"], ["1", "Y"]]));
        let sorted =
            sort_table_rows(&table, &json!({"column": 0, "order": "desc"}), true).unwrap();
        assert_eq!(sorted, rows(json!([["A", "B"], ["2", "X"], ["1", "Y"]])));
    }

    #[test]
    fn strings_compare_case_insensitively() {
        let table = rows(json!([["banana"], ["Apple"], ["cherry"]]));
        let sorted = sort_table_rows(&table, &json!(0), false).unwrap();
        assert_eq!(sorted, rows(json!([["Apple"], ["banana"], ["cherry"]])));
    }

    #[test]
    fn numbers_order_before_strings_both_directions() {
        let table = rows(json!([["apple"], ["10"], ["banana"], ["2"]]));
        let asc = sort_table_rows(&table, &json!(0), false).unwrap();
        assert_eq!(asc, rows(json!([["2"], ["10"], ["apple"], ["banana"]])));

        let desc = sort_table_rows(&table, &json!({"column": 0, "order": "desc"}), false).unwrap();
        assert_eq!(desc, rows(json!([["10"], ["2"], ["banana"], ["apple"]])));
    }

    #[test]
    fn multi_column_is_lexicographic() {
        let table = rows(json!([
            ["east", "2"],
            ["west", "1"],
            ["east", "1"],
            ["west", "2"],
        ]));
        let sorted = sort_table_rows(&table, &json!([0, 1]), false).unwrap();
        assert_eq!(
            sorted,
            rows(json!([
                ["east", "1"],
                ["east", "2"],
                ["west", "1"],
                ["west", "2"],
            ]))
        );
    }

    #[test]
    fn stable_on_equal_keys() {
        let table = rows(json!([["x", "a"], ["x", "b"], ["x", "c"]]));
        let sorted = sort_table_rows(&table, &json!(0), false).unwrap();
        assert_eq!(sorted, table);
        // Per-character negation keeps equal keys in input order descending too.
        let sorted = sort_table_rows(&table, &json!({"column": 0, "order": "desc"}), false).unwrap();
        assert_eq!(sorted, table);
    }

    #[test]
    fn sorting_sorted_input_is_identity() {
        let table = rows(json!([["1"], ["2"], ["3"]]));
        let once = sort_table_rows(&table, &json!(0), false).unwrap();
        let twice = sort_table_rows(&once, &json!(0), false).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn null_cells_sort_as_empty_string_ascending() {
        let table = rows(json!([["b"], [null], ["a"]]));
        let sorted = sort_table_rows(&table, &json!(0), false).unwrap();
        assert_eq!(sorted, rows(json!([[null], ["a"], ["b"]])));
    }

    #[test]
    fn name_sort_requires_header() {
        let table = rows(json!([["a"], ["b"]]));
        let err = sort_table_rows(&table, &json!("Name"), false).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSort);
    }

    #[test]
    fn unknown_column_name_fails() {
        let table = rows(json!([["Name"], ["a"]]));
        let err = sort_table_rows(&table, &json!("Price"), true).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSort);
    }

    #[test]
    fn out_of_range_index_fails() {
        let table = rows(json!([["a", "b"], ["c", "d"]]));
        let err = sort_table_rows(&table, &json!(2), true).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSort);
        let err = sort_table_rows(&table, &json!(-1), true).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSort);
    }
}
