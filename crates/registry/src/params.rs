use models::{ParameterMap, ParameterSpec};

/// Validate a parameter map against declared specs.
///
/// Checks required presence, rejects unexpected keys, and type-checks each
/// value shallowly. Defaults are not applied here; the rendering engine
/// applies them at render time.
///
/// Returns `(is_valid, errors)` so callers can surface every problem at once.
pub fn validate_parameters(specs: &[ParameterSpec], values: &ParameterMap) -> (bool, Vec<String>) {
    let mut errors = Vec::new();

    for spec in specs {
        match values.get(&spec.name) {
            None if spec.required => {
                errors.push(format!(
                    "Missing required parameter '{}' ({})",
                    spec.name, spec.description,
                ));
            }
            None => (),
            Some(value) => {
                if !spec.param_type.matches(value) {
                    errors.push(format!(
                        "Parameter '{}' must be of type {}, got {}",
                        spec.name,
                        spec.param_type,
                        type_name(value),
                    ));
                }
            }
        }
    }

    let expected: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    let unexpected: Vec<&str> = values
        .keys()
        .map(String::as_str)
        .filter(|k| !expected.contains(k))
        .collect();
    if !unexpected.is_empty() {
        errors.push(format!(
            "Unexpected parameters: {}. Expected: {}",
            unexpected.join(", "),
            expected.join(", "),
        ));
    }

    (errors.is_empty(), errors)
}

fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::ParamType;
    use serde_json::json;

    fn specs() -> Vec<ParameterSpec> {
        serde_json::from_value(json!([
            {"name": "subject", "type": "string", "description": "Email subject"},
            {"name": "issue", "type": "integer", "required": false},
            {"name": "urgent", "type": "boolean", "required": false},
        ]))
        .unwrap()
    }

    fn map(v: serde_json::Value) -> ParameterMap {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn accepts_complete_input() {
        let (ok, errors) = validate_parameters(&specs(), &map(json!({"subject": "Q3"})));
        assert!(ok, "{errors:?}");
    }

    #[test]
    fn missing_required_is_reported() {
        let (ok, errors) = validate_parameters(&specs(), &map(json!({"issue": 4})));
        assert!(!ok);
        assert!(errors[0].contains("subject"), "{errors:?}");
    }

    #[test]
    fn unexpected_keys_are_rejected() {
        let (ok, errors) =
            validate_parameters(&specs(), &map(json!({"subject": "Q3", "extra": 1})));
        assert!(!ok);
        assert!(errors[0].contains("extra"), "{errors:?}");
    }

    #[test]
    fn type_mismatches_are_reported() {
        let (ok, errors) =
            validate_parameters(&specs(), &map(json!({"subject": "Q3", "issue": "four"})));
        assert!(!ok);
        assert!(errors[0].contains("integer"), "{errors:?}");
    }

    #[test]
    fn defaults_are_not_applied() {
        let specs: Vec<ParameterSpec> = serde_json::from_value(json!([
            {"name": "tone", "type": "string", "required": false, "default": "neutral"},
        ]))
        .unwrap();
        let (ok, _) = validate_parameters(&specs, &map(json!({})));
        assert!(ok);
        assert_eq!(specs[0].param_type, ParamType::String);
    }
}
