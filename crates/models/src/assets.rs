use serde::{Deserialize, Serialize};

use crate::ParameterSpec;

/// TemplateDef is the parsed schema of a template asset: the outer document
/// shell plus the menu of fragment types it admits.
///
/// The `group` and `template_id` must agree with the directory the asset was
/// loaded from; the loader rejects the asset otherwise.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TemplateDef {
    pub template_id: String,
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub global_parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub fragments: Vec<FragmentDef>,
}

impl TemplateDef {
    /// The declared fragment type with this id, if any.
    pub fn fragment(&self, fragment_id: &str) -> Option<&FragmentDef> {
        self.fragments.iter().find(|f| f.fragment_id == fragment_id)
    }
}

/// FragmentDef declares a parameterised content block. Inside a TemplateDef
/// the `group` is inherited and omitted; a standalone fragment asset carries
/// its own.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FragmentDef {
    pub fragment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

/// StyleDef names a CSS stylesheet applied at render time.
/// At most one style per group should be marked `default`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StyleDef {
    pub style_id: String,
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: bool,
}
