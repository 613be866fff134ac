mod color;
mod format;
mod sorter;
mod validate;

pub use color::{css_color, validate_color, THEME_COLORS};
pub use format::{format_number, validate_format_spec};
pub use sorter::{sort_table_rows, SortSpec};
pub use validate::{validate_table, Alignment, BorderStyle, TableSpec};
