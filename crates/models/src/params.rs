use serde::{Deserialize, Serialize};

/// ParamType is the declared type of a template or fragment parameter.
/// Checks against it are shallow: `array` and `object` accept any JSON
/// array or object without recursing into element shapes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Whether `value` satisfies this declared type.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (ParamType::String, Value::String(_)) => true,
            (ParamType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ParamType::Number, Value::Number(_)) => true,
            (ParamType::Boolean, Value::Bool(_)) => true,
            (ParamType::Array, Value::Array(_)) => true,
            (ParamType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        f.write_str(s)
    }
}

/// ParameterSpec declares a single named parameter of a template or fragment.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: String,
}

fn default_required() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shallow_type_checks() {
        assert!(ParamType::String.matches(&json!("x")));
        assert!(!ParamType::String.matches(&json!(1)));
        assert!(ParamType::Integer.matches(&json!(3)));
        assert!(!ParamType::Integer.matches(&json!(3.5)));
        assert!(ParamType::Number.matches(&json!(3)));
        assert!(ParamType::Number.matches(&json!(3.5)));
        assert!(ParamType::Boolean.matches(&json!(true)));
        assert!(ParamType::Array.matches(&json!([1, "two", null])));
        assert!(ParamType::Object.matches(&json!({"k": [1]})));
        assert!(!ParamType::Object.matches(&json!([])));
    }

    #[test]
    fn spec_defaults_required() {
        let spec: ParameterSpec = serde_json::from_value(json!({
            "name": "date",
            "type": "string",
        }))
        .unwrap();
        assert!(spec.required);
        assert!(spec.default.is_none());
    }
}
