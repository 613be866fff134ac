use lazy_static::lazy_static;
use models::{Error, ErrorCode};
use regex::Regex;

/// Theme colour names accepted anywhere a colour value appears. The second
/// half are Bootstrap-style semantic names.
pub const THEME_COLORS: &[&str] = &[
    "blue", "orange", "green", "red", "purple", "brown", "pink", "gray", // semantic
    "primary", "success", "warning", "danger", "info", "light", "dark", "muted",
];

lazy_static! {
    static ref HEX_RE: Regex = Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

/// Whether `color` is a theme colour name or a `#RGB`/`#RRGGBB` hex literal.
/// Empty values are accepted and mean "unset".
pub fn validate_color(color: &str) -> bool {
    let color = color.trim();
    if color.is_empty() {
        return true;
    }
    let lower = color.to_lowercase();
    THEME_COLORS.contains(&lower.as_str()) || HEX_RE.is_match(color)
}

/// The CSS value for a validated colour: theme names become CSS variables,
/// hex literals pass through.
pub fn css_color(color: &str) -> Result<String, Error> {
    let trimmed = color.trim();
    let lower = trimmed.to_lowercase();
    if THEME_COLORS.contains(&lower.as_str()) {
        return Ok(format!("var(--folio-{lower})"));
    }
    if HEX_RE.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }
    Err(Error::new(
        ErrorCode::InvalidColor,
        format!("Invalid colour: {color}"),
    ))
}
