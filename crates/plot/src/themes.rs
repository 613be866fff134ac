use serde::{Deserialize, Serialize};

/// The visual theme applied to a rendered chart.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Dark => "dark",
        }
    }

    pub fn palette(&self) -> &'static ThemePalette {
        match self {
            Theme::Default => &LIGHT,
            Theme::Dark => &DARK,
        }
    }
}

/// The colours a backend draws with.
#[derive(Debug)]
pub struct ThemePalette {
    pub background: &'static str,
    pub foreground: &'static str,
    pub grid: &'static str,
    pub series: &'static [&'static str],
}

static LIGHT: ThemePalette = ThemePalette {
    background: "#ffffff",
    foreground: "#1f2430",
    grid: "#d9dce3",
    series: &[
        "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b",
    ],
};

static DARK: ThemePalette = ThemePalette {
    background: "#15181e",
    foreground: "#e6e9ef",
    grid: "#3a4150",
    series: &[
        "#4fa3e3", "#ffa94d", "#51cf66", "#ff6b6b", "#b197fc", "#d0a276",
    ],
};

/// Summary row for the `list_themes` discovery tool.
#[derive(Serialize, Debug, Clone)]
pub struct ThemeInfo {
    pub theme_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn theme_catalog() -> Vec<ThemeInfo> {
    vec![
        ThemeInfo {
            theme_id: "default",
            name: "Default",
            description: "Light background with a muted categorical palette",
        },
        ThemeInfo {
            theme_id: "dark",
            name: "Dark",
            description: "Dark background with brightened series colours",
        },
    ]
}
