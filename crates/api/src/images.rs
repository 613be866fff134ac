use std::time::Duration;

use base64::Engine as _;
use models::{Error, ErrorCode};

/// Content types accepted for image fragments.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A validated, downloaded image ready for embedding.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub url: String,
    pub content_type: String,
    pub data_uri: String,
    pub size: u64,
}

/// ImageValidator checks image URLs at add time, not render time, so the
/// caller gets immediate feedback about scheme, accessibility, content type
/// and size.
pub struct ImageValidator {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ImageValidator {
    pub fn new(timeout: Option<Duration>, max_bytes: Option<u64>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            max_bytes: max_bytes.unwrap_or(DEFAULT_MAX_BYTES),
        }
    }

    /// Validate `url` and download its bytes as a base64 data URI.
    ///
    /// Probes with HEAD first, falling back to GET when the server rejects
    /// the method.
    pub async fn validate_and_fetch(
        &self,
        url: &str,
        require_https: bool,
    ) -> Result<ValidatedImage, Error> {
        let parsed = url::Url::parse(url).map_err(|err| {
            Error::new(
                ErrorCode::InvalidImageUrl,
                format!("Image URL is not a valid URL: {err}"),
            )
        })?;
        match parsed.scheme() {
            "https" => (),
            "http" if !require_https => (),
            "http" => {
                return Err(Error::new(
                    ErrorCode::InvalidImageUrl,
                    "Image URL must use HTTPS protocol (require_https=true)",
                )
                .with_recovery("Use an HTTPS URL or set require_https=false"))
            }
            _ => {
                return Err(Error::new(
                    ErrorCode::InvalidImageUrl,
                    "Image URL must use HTTP or HTTPS protocol",
                ))
            }
        }

        let head = self.client.head(url).send().await;
        let probe = match head {
            Ok(response)
                if response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED
                    || response.status() == reqwest::StatusCode::NOT_IMPLEMENTED =>
            {
                self.client.get(url).send().await
            }
            other => other,
        };

        let response = probe.map_err(|err| transport_error(url, err))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::new(
                ErrorCode::ImageUrlNotAccessible,
                format!("Image URL returned HTTP {}", response.status().as_u16()),
            )
            .with_details(serde_json::json!({"status_code": response.status().as_u16()})));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase())
            .unwrap_or_default();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(Error::new(
                ErrorCode::InvalidImageContentType,
                "URL does not return a valid image content-type",
            )
            .with_details(serde_json::json!({
                "content_type": content_type,
                "allowed_types": ALLOWED_CONTENT_TYPES,
            })));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        // Download. The probe may already have been a GET; re-request keeps
        // the logic uniform and lets servers without HEAD support work.
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| transport_error(url, err))?
            .bytes()
            .await
            .map_err(|err| transport_error(url, err))?;
        self.check_size(bytes.len() as u64)?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(ValidatedImage {
            url: url.to_string(),
            data_uri: format!("data:{content_type};base64,{encoded}"),
            content_type,
            size: bytes.len() as u64,
        })
    }

    fn check_size(&self, size: u64) -> Result<(), Error> {
        if size > self.max_bytes {
            return Err(Error::new(
                ErrorCode::ImageTooLarge,
                "Image size exceeds maximum allowed size",
            )
            .with_details(serde_json::json!({
                "content_length": size,
                "max_size_bytes": self.max_bytes,
            })));
        }
        Ok(())
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return Error::new(
            ErrorCode::ImageUrlTimeout,
            format!("Image URL validation timed out: {url}"),
        );
    }
    if err.is_connect() || err.is_request() {
        return Error::new(
            ErrorCode::ImageUrlNotAccessible,
            format!("Error accessing image URL: {err}"),
        );
    }
    Error::new(
        ErrorCode::ImageValidationError,
        format!("Unexpected error validating image URL: {err}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn https_is_required_by_default() {
        let validator = ImageValidator::new(None, None);
        let err = validator
            .validate_and_fetch("http://example.com/x.png", true)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidImageUrl);
    }

    #[tokio::test]
    async fn non_http_schemes_are_rejected() {
        let validator = ImageValidator::new(None, None);
        let err = validator
            .validate_and_fetch("ftp://example.com/x.png", false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidImageUrl);
    }

    #[test]
    fn size_limit_is_enforced() {
        let validator = ImageValidator::new(None, Some(16));
        assert!(validator.check_size(16).is_ok());
        let err = validator.check_size(17).unwrap_err();
        assert_eq!(err.code, ErrorCode::ImageTooLarge);
    }
}
