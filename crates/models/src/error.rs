use serde::{Deserialize, Serialize};

/// The closed error-code taxonomy shared by the tool-call and HTTP surfaces.
/// Every failure leaving the service carries exactly one of these codes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthRequired,
    AuthFailed,
    UnknownTool,
    InvalidArguments,
    InvalidOperation,
    TemplateNotFound,
    FragmentNotFound,
    SessionNotFound,
    SessionNotReady,
    RenderFailed,
    InvalidImageUrl,
    ImageUrlNotAccessible,
    InvalidImageContentType,
    ImageTooLarge,
    ImageUrlTimeout,
    ImageValidationError,
    InvalidGraphParams,
    GraphValidationError,
    RenderError,
    PlotStorageNotInitialized,
    ImageNotFound,
    AccessDenied,
    InvalidNumberFormat,
    InvalidColor,
    InvalidTableData,
    InconsistentColumns,
    InvalidHighlight,
    InvalidSort,
    InvalidColumnWidth,
    InvalidWidth,
    InvalidAlignment,
    InvalidBorderStyle,
    UnexpectedError,
}

impl ErrorCode {
    /// The stock recovery hint sent when the raising site doesn't attach a
    /// more specific one.
    pub fn default_recovery(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            AuthRequired => {
                "Add a bearer token via the Authorization header, or an `auth_token` field in \
                 the tool arguments. Discovery tools do not require authentication."
            }
            AuthFailed => "Obtain a fresh authentication token and retry the request.",
            UnknownTool => "Call list_handlers or help to see the available tools; check for typos.",
            InvalidArguments => {
                "Check the tool's input schema for required parameters and their types, correct \
                 the input, and retry."
            }
            InvalidOperation => "Review the error message, adjust the request, and try again.",
            TemplateNotFound => "Call list_templates to see the templates available to your group.",
            FragmentNotFound => {
                "Call list_template_fragments to see the fragment types this template admits."
            }
            SessionNotFound => {
                "Verify the session id or alias is correct. Call list_active_sessions to see \
                 your sessions, or create_document_session to start a new one."
            }
            SessionNotReady => "Call set_global_parameters before rendering.",
            RenderFailed => "Check the style id and session contents, then retry the render.",
            InvalidImageUrl => "Use an HTTPS URL, or set require_https=false for plain HTTP.",
            ImageUrlNotAccessible => {
                "Verify the URL is correct and publicly reachable; test it in a browser."
            }
            InvalidImageContentType => {
                "Ensure the URL points at a PNG, JPEG, GIF, WebP, or SVG image."
            }
            ImageTooLarge => "Use a smaller image, or compress it below the 10 MB limit.",
            ImageUrlTimeout => "The URL was slow or unreachable; retry or use a different host.",
            ImageValidationError => "Check the URL format and try again.",
            InvalidGraphParams => "Review the graph parameter errors and correct the request.",
            GraphValidationError => "Review the series data shapes and correct the request.",
            RenderError => "Check the plot parameters; see details for the backend message.",
            PlotStorageNotInitialized => {
                "The server was started without plot storage; contact the operator."
            }
            ImageNotFound => "Call list_images to see the stored images in your group.",
            AccessDenied => "Request the document with a token for its owning group.",
            InvalidNumberFormat => {
                "Use currency:<ISO-4217>, percent, decimal:<N>, integer, or accounting."
            }
            InvalidColor => {
                "Use a theme colour name (blue, primary, danger, ...) or a #RGB/#RRGGBB hex value."
            }
            InvalidTableData => "Provide rows as a non-empty array of arrays.",
            InconsistentColumns => "Make every row the same length.",
            InvalidHighlight => "Highlight keys must be in-range non-negative row/column indices.",
            InvalidSort => "Sort specs must name an existing column; names require has_header.",
            InvalidColumnWidth => {
                "Column widths are percentage strings keyed by column index, summing to at most 100."
            }
            InvalidWidth => "Width must be 'auto', 'full', or a percentage between 1% and 100%.",
            InvalidAlignment => "Alignments are one of left, center, right, one per column.",
            InvalidBorderStyle => "Border style must be one of full, horizontal, minimal, none.",
            UnexpectedError => "Check server logs for details and retry the request.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Serialize through serde to keep the UPPER_SNAKE wire spelling.
        let s = serde_json::to_value(self).expect("ErrorCode serializes");
        f.write_str(s.as_str().unwrap())
    }
}

/// Error is the one domain error type crossing crate boundaries.
/// It renders into the §7 envelope at the dispatch layer.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub recovery: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            recovery: None,
            details: None,
        }
    }

    pub fn with_recovery(mut self, recovery: impl Into<String>) -> Self {
        self.recovery = Some(recovery.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn recovery_strategy(&self) -> String {
        self.recovery
            .clone()
            .unwrap_or_else(|| self.code.default_recovery().to_string())
    }
}

/// Envelope is the uniform response shape of both transport surfaces.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Envelope {
    Success {
        data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        error_code: ErrorCode,
        message: String,
        recovery_strategy: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

impl Envelope {
    pub fn success(data: serde_json::Value) -> Self {
        Envelope::Success {
            data,
            message: None,
        }
    }

    pub fn success_with_message(data: serde_json::Value, message: impl Into<String>) -> Self {
        Envelope::Success {
            data,
            message: Some(message.into()),
        }
    }
}

impl From<&Error> for Envelope {
    fn from(err: &Error) -> Self {
        Envelope::Error {
            error_code: err.code,
            message: err.message.clone(),
            recovery_strategy: err.recovery_strategy(),
            details: err.details.clone(),
        }
    }
}

/// One part of a tool-call response: a structured JSON text part, or a
/// binary image part (plot rendering only).
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
    Image { data: String, mime_type: String },
}

impl ToolContent {
    /// Render an envelope as the response's single JSON text part.
    pub fn json(envelope: &Envelope) -> Self {
        ToolContent::Text {
            text: serde_json::to_string_pretty(envelope).expect("Envelope serializes"),
        }
    }
}

pub type ToolResponse = Vec<ToolContent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_upper_snake_wire_spelling() {
        for (code, expect) in [
            (ErrorCode::AuthRequired, "AUTH_REQUIRED"),
            (ErrorCode::InvalidImageUrl, "INVALID_IMAGE_URL"),
            (
                ErrorCode::PlotStorageNotInitialized,
                "PLOT_STORAGE_NOT_INITIALIZED",
            ),
            (ErrorCode::InconsistentColumns, "INCONSISTENT_COLUMNS"),
        ] {
            assert_eq!(code.to_string(), expect);
            assert_eq!(serde_json::to_value(code).unwrap(), expect);
        }
    }

    #[test]
    fn error_envelope_shape() {
        let err = Error::new(ErrorCode::SessionNotFound, "Session 'x' not found");
        let value = serde_json::to_value(Envelope::from(&err)).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error_code"], "SESSION_NOT_FOUND");
        assert_eq!(value["message"], "Session 'x' not found");
        assert!(value["recovery_strategy"].as_str().unwrap().len() > 10);
        assert!(value.get("details").is_none());
    }

    #[test]
    fn success_envelope_shape() {
        let value =
            serde_json::to_value(Envelope::success(serde_json::json!({"n": 1}))).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["n"], 1);
    }
}
