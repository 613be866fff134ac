use std::sync::Arc;

use models::{Error, ErrorCode, ParameterMap, ToolResponse};
use serde_json::{json, Value};

use crate::tools::{ok, parse_input};
use crate::App;

#[derive(serde::Deserialize)]
struct ValidateInput {
    template_id: String,
    #[serde(default)]
    fragment_id: Option<String>,
    parameters: ParameterMap,
    group: String,
}

/// Dry-run validation of a parameter map against a template's global schema
/// or one of its fragment schemas. Always succeeds with a verdict; schema
/// violations are data, not errors.
pub(crate) fn validate_parameters(
    app: &Arc<App>,
    arguments: serde_json::Map<String, Value>,
) -> Result<ToolResponse, Error> {
    let input: ValidateInput = parse_input(arguments)?;

    let entry = app
        .registry
        .find_template(&input.template_id, Some(&input.group))
        .or_else(|| app.registry.find_template(&input.template_id, None))
        .ok_or_else(|| {
            Error::new(
                ErrorCode::TemplateNotFound,
                format!("Template '{}' not found", input.template_id),
            )
        })?;

    let specs = match &input.fragment_id {
        None => entry.def.global_parameters.as_slice(),
        Some(fragment_id) => {
            let fragment = entry.def.fragment(fragment_id).ok_or_else(|| {
                Error::new(
                    ErrorCode::FragmentNotFound,
                    format!(
                        "Fragment '{fragment_id}' not found in template '{}'",
                        input.template_id
                    ),
                )
            })?;
            fragment.parameters.as_slice()
        }
    };

    let (valid, errors) = registry::validate_parameters(specs, &input.parameters);
    ok(json!({
        "template_id": input.template_id,
        "fragment_id": input.fragment_id,
        "valid": valid,
        "errors": errors,
    }))
}
