pub(crate) mod discovery;
pub(crate) mod fragments;
pub(crate) mod plots;
pub(crate) mod rendering;
pub(crate) mod sessions;
pub(crate) mod validation;

use models::{Envelope, Error, ErrorCode, ToolContent, ToolResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse a handler's typed input from the (group-injected) argument map.
pub(crate) fn parse_input<T: DeserializeOwned>(
    arguments: serde_json::Map<String, Value>,
) -> Result<T, Error> {
    serde_json::from_value(Value::Object(arguments)).map_err(|err| {
        Error::new(
            ErrorCode::InvalidArguments,
            "Input payload failed validation.",
        )
        .with_details(serde_json::json!({"validation_error": err.to_string()}))
    })
}

pub(crate) fn ok<T: serde::Serialize>(data: T) -> Result<ToolResponse, Error> {
    let data = serde_json::to_value(data)
        .map_err(|err| Error::new(ErrorCode::UnexpectedError, err.to_string()))?;
    Ok(vec![ToolContent::json(&Envelope::success(data))])
}

pub(crate) fn ok_with_message<T: serde::Serialize>(
    data: T,
    message: impl Into<String>,
) -> Result<ToolResponse, Error> {
    let data = serde_json::to_value(data)
        .map_err(|err| Error::new(ErrorCode::UnexpectedError, err.to_string()))?;
    Ok(vec![ToolContent::json(&Envelope::success_with_message(
        data, message,
    ))])
}
