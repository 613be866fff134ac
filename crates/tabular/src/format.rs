use models::{Error, ErrorCode};
use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Per-locale rendering rules. Grouping is delegated to num-format; the
/// decimal separator and currency placement ride alongside.
struct LocaleSpec {
    grouping: Locale,
    decimal_sep: char,
    currency_suffix: bool,
    percent_space: bool,
}

fn locale_spec(locale: &str) -> LocaleSpec {
    match locale {
        "de_DE" => LocaleSpec {
            grouping: Locale::de,
            decimal_sep: ',',
            currency_suffix: true,
            percent_space: true,
        },
        "fr_FR" => LocaleSpec {
            grouping: Locale::fr,
            decimal_sep: ',',
            currency_suffix: true,
            percent_space: true,
        },
        "ja_JP" => LocaleSpec {
            grouping: Locale::ja,
            decimal_sep: '.',
            currency_suffix: false,
            percent_space: false,
        },
        // en_US, en_GB, and anything unrecognised.
        _ => LocaleSpec {
            grouping: Locale::en,
            decimal_sep: '.',
            currency_suffix: false,
            percent_space: false,
        },
    }
}

/// Currency symbol and fraction digits for an ISO-4217 code. Codes outside
/// the table render with the bare code as a prefix.
fn currency_symbol(code: &str) -> (Option<&'static str>, u32) {
    match code {
        "USD" => (Some("$"), 2),
        "EUR" => (Some("€"), 2),
        "GBP" => (Some("£"), 2),
        "JPY" => (Some("¥"), 0),
        "CHF" => (Some("CHF "), 2),
        _ => (None, 2),
    }
}

/// Format a cell value according to a format specification.
///
/// Specs: `currency:<ISO-4217>`, `percent` (input is a fraction), `decimal:<N>`,
/// `integer`, `accounting` (negatives in parentheses, no minus sign).
///
/// Null and empty cells format to the empty string; non-numeric cells pass
/// through unchanged. An invalid spec fails with `INVALID_NUMBER_FORMAT`.
pub fn format_number(
    value: &Value,
    format_spec: Option<&str>,
    locale: &str,
) -> Result<String, Error> {
    match value {
        Value::Null => return Ok(String::new()),
        Value::String(s) if s.is_empty() => return Ok(String::new()),
        _ => (),
    }

    let display = || match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let spec = match format_spec {
        None | Some("") => return Ok(display()),
        Some(s) => s.trim().to_lowercase(),
    };

    let Some(numeric) = numeric_value(value) else {
        // Non-numeric cells pass through untouched.
        return Ok(display());
    };
    let loc = locale_spec(locale);

    if let Some(code) = spec.strip_prefix("currency:") {
        let code = code.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(Error::new(
                ErrorCode::InvalidNumberFormat,
                format!("Invalid currency code: {code}"),
            ));
        }
        let (symbol, places) = currency_symbol(&code);
        let magnitude = decimal_string(numeric.abs(), places, &loc);
        let sign = if numeric < 0.0 { "-" } else { "" };
        return Ok(match symbol {
            Some(symbol) if loc.currency_suffix => format!("{sign}{magnitude} {symbol}"),
            Some(symbol) => format!("{sign}{symbol}{magnitude}"),
            None => format!("{sign}{code} {magnitude}"),
        });
    }

    if let Some(places) = spec.strip_prefix("decimal:") {
        let places: u32 = places.trim().parse().map_err(|_| {
            Error::new(
                ErrorCode::InvalidNumberFormat,
                format!("Invalid decimal format: {spec}"),
            )
        })?;
        return Ok(signed_decimal(numeric, places, &loc));
    }

    match spec.as_str() {
        "percent" => {
            let rendered = signed_decimal(numeric * 100.0, 0, &loc);
            Ok(if loc.percent_space {
                format!("{rendered} %")
            } else {
                format!("{rendered}%")
            })
        }
        "integer" => Ok(signed_decimal(numeric, 0, &loc)),
        "accounting" => {
            let magnitude = decimal_string(numeric.abs(), 2, &loc);
            Ok(if numeric < 0.0 {
                format!("({magnitude})")
            } else {
                magnitude
            })
        }
        _ => Err(Error::new(
            ErrorCode::InvalidNumberFormat,
            format!("Unknown format specification: {spec}"),
        )),
    }
}

/// Whether `spec` is an accepted format specification. Empty specs are
/// accepted and mean pass-through.
pub fn validate_format_spec(spec: &str) -> bool {
    let spec = spec.trim().to_lowercase();
    if spec.is_empty() {
        return true;
    }
    if let Some(code) = spec.strip_prefix("currency:") {
        let code = code.trim();
        return code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic());
    }
    if let Some(places) = spec.strip_prefix("decimal:") {
        return places.trim().parse::<u32>().is_ok();
    }
    matches!(spec.as_str(), "percent" | "integer" | "accounting")
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let parsed = s.trim().replace(',', "").parse::<f64>().ok()?;
            if parsed.is_finite() {
                Some(parsed)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn signed_decimal(value: f64, places: u32, loc: &LocaleSpec) -> String {
    let magnitude = decimal_string(value.abs(), places, loc);
    let rounded_to_zero = !magnitude.contains(|c: char| c.is_ascii_digit() && c != '0');
    if value < 0.0 && !rounded_to_zero {
        format!("-{magnitude}")
    } else {
        magnitude
    }
}

/// Render `value` (non-negative) with `places` fraction digits and grouped
/// thousands.
fn decimal_string(value: f64, places: u32, loc: &LocaleSpec) -> String {
    let scale = 10i128.pow(places);
    let scaled = (value * scale as f64).round() as i128;
    let int_part = (scaled / scale) as u128;
    let frac_part = (scaled % scale) as u128;

    let grouped = int_part.to_formatted_string(&loc.grouping);
    if places == 0 {
        grouped
    } else {
        format!(
            "{grouped}{}{:0width$}",
            loc.decimal_sep,
            frac_part,
            width = places as usize
        )
    }
}
