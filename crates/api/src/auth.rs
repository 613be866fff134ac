use models::{Error, ErrorCode};
use serde_json::Value;

/// Tools that proceed without a credential, with acting group `public`.
pub const TOKEN_OPTIONAL_TOOLS: &[&str] = &[
    "ping",
    "help",
    "list_templates",
    "get_template_details",
    "list_template_fragments",
    "get_fragment_details",
    "list_styles",
    "list_themes",
    "list_handlers",
];

/// The external auth collaborator: given a bearer token, return the verified
/// group list or fail. The first group is the acting group.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> anyhow::Result<Vec<String>>;
}

/// HS256 JWT verifier, the stock TokenVerifier implementation.
pub struct JwtVerifier {
    decoding_key: jsonwebtoken::DecodingKey,
    validation: jsonwebtoken::Validation,
}

#[derive(Debug, serde::Deserialize)]
struct Claims {
    #[serde(default)]
    groups: Vec<String>,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            decoding_key: jsonwebtoken::DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> anyhow::Result<Vec<String>> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    anyhow::anyhow!("token has expired")
                }
                _ => anyhow::anyhow!("invalid token: {err}"),
            })?;
        anyhow::ensure!(
            !data.claims.groups.is_empty(),
            "invalid token: no groups claim"
        );
        Ok(data.claims.groups)
    }
}

/// Credential material accompanying one request, in resolution order:
/// payload `auth_token`, legacy payload `token`, a bearer forwarded from the
/// HTTP layer, and the legacy `X-Auth-Token: <group>:<token>` header.
#[derive(Debug, Default, Clone)]
pub struct RequestCredentials {
    pub bearer: Option<String>,
    pub legacy_group_token: Option<String>,
}

impl RequestCredentials {
    pub fn from_bearer(bearer: Option<String>) -> Self {
        Self {
            bearer,
            legacy_group_token: None,
        }
    }
}

/// AuthGate resolves a request's credential to an acting group.
pub struct AuthGate {
    verifier: Option<std::sync::Arc<dyn TokenVerifier>>,
}

impl AuthGate {
    pub fn new(verifier: Option<std::sync::Arc<dyn TokenVerifier>>) -> Self {
        Self { verifier }
    }

    pub fn auth_enabled(&self) -> bool {
        self.verifier.is_some()
    }

    /// Resolve the acting group for a tool call. Returns `Ok(None)` when no
    /// credential was presented and none is required; the dispatcher then
    /// applies the `public` default.
    pub fn resolve_tool_call(
        &self,
        arguments: &serde_json::Map<String, Value>,
        credentials: &RequestCredentials,
        require_token: bool,
    ) -> Result<Option<String>, Error> {
        let Some(verifier) = &self.verifier else {
            return Ok(None);
        };

        let payload_token = arguments
            .get("auth_token")
            .or_else(|| arguments.get("token"))
            .and_then(Value::as_str)
            .map(strip_bearer);

        let token = payload_token
            .or(credentials.bearer.as_deref())
            .map(str::to_string)
            .or_else(|| {
                credentials
                    .legacy_group_token
                    .as_deref()
                    .and_then(|v| v.split_once(':'))
                    .map(|(_, token)| token.to_string())
            });

        let Some(token) = token else {
            if require_token {
                return Err(Error::new(
                    ErrorCode::AuthRequired,
                    "This operation requires authentication but no token was provided.",
                ));
            }
            return Ok(None);
        };

        self.verify_to_group(&token).map(Some)
    }

    /// Resolve the acting group for an authenticated HTTP endpoint.
    pub fn resolve_http(&self, credentials: &RequestCredentials) -> Result<String, Error> {
        let Some(_) = &self.verifier else {
            // Auth disabled: the deployment permits unauthenticated requests.
            return Ok(models::DEFAULT_GROUP.to_string());
        };

        let token = credentials
            .bearer
            .clone()
            .or_else(|| {
                credentials
                    .legacy_group_token
                    .as_deref()
                    .and_then(|v| v.split_once(':'))
                    .map(|(_, token)| token.to_string())
            })
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::AuthRequired,
                    "Authentication required. Use Authorization: Bearer <token> or X-Auth-Token: <group>:<token>.",
                )
            })?;

        self.verify_to_group(&token)
    }

    fn verify_to_group(&self, token: &str) -> Result<String, Error> {
        let verifier = self.verifier.as_ref().expect("caller checked");
        match verifier.verify(token) {
            Ok(groups) => groups.into_iter().next().ok_or_else(|| {
                Error::new(ErrorCode::AuthFailed, "token carries no groups")
            }),
            Err(err) => {
                tracing::warn!(error = %err, "token verification failed");
                let reason = err.to_string();
                let lower = reason.to_lowercase();
                let recovery = if lower.contains("expired") {
                    "TOKEN EXPIRED: Your authentication token has expired. Obtain a new token and retry the request."
                } else if lower.contains("invalid") || lower.contains("malformed") {
                    "INVALID TOKEN FORMAT: The token format is incorrect. Verify you're using a valid JWT bearer token."
                } else {
                    "The provided token could not be validated. Obtain a fresh authentication token and retry."
                };
                Err(
                    Error::new(ErrorCode::AuthFailed, format!("Authentication failed: {reason}"))
                        .with_recovery(recovery),
                )
            }
        }
    }
}

fn strip_bearer(token: &str) -> &str {
    token.strip_prefix("Bearer ").unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Mints test tokens against the same HS256 secret the verifier uses.
    pub fn mint(secret: &[u8], groups: &[&str], expires_in: i64) -> String {
        #[derive(serde::Serialize)]
        struct MintClaims<'a> {
            groups: Vec<&'a str>,
            exp: i64,
        }
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &MintClaims {
                groups: groups.to_vec(),
                exp: chrono::Utc::now().timestamp() + expires_in,
            },
            &jsonwebtoken::EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn gate(secret: &[u8]) -> AuthGate {
        AuthGate::new(Some(Arc::new(JwtVerifier::new(secret))))
    }

    fn args(v: serde_json::Value) -> serde_json::Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn payload_auth_token_takes_precedence() {
        let secret = b"s3cret";
        let gate = gate(secret);
        let token = mint(secret, &["finance", "ops"], 600);

        let group = gate
            .resolve_tool_call(
                &args(serde_json::json!({"auth_token": token})),
                &RequestCredentials::default(),
                true,
            )
            .unwrap();
        // The first group is the acting group.
        assert_eq!(group.as_deref(), Some("finance"));
    }

    #[test]
    fn legacy_token_field_and_bearer_prefix_are_tolerated() {
        let secret = b"s3cret";
        let gate = gate(secret);
        let token = mint(secret, &["alpha"], 600);

        let group = gate
            .resolve_tool_call(
                &args(serde_json::json!({"token": format!("Bearer {token}")})),
                &RequestCredentials::default(),
                true,
            )
            .unwrap();
        assert_eq!(group.as_deref(), Some("alpha"));
    }

    #[test]
    fn forwarded_bearer_is_used_when_payload_is_bare() {
        let secret = b"s3cret";
        let gate = gate(secret);
        let token = mint(secret, &["alpha"], 600);

        let group = gate
            .resolve_tool_call(
                &args(serde_json::json!({})),
                &RequestCredentials::from_bearer(Some(token)),
                true,
            )
            .unwrap();
        assert_eq!(group.as_deref(), Some("alpha"));
    }

    #[test]
    fn missing_token_fails_only_when_required() {
        let gate = gate(b"s3cret");
        let err = gate
            .resolve_tool_call(&args(serde_json::json!({})), &RequestCredentials::default(), true)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);

        let group = gate
            .resolve_tool_call(&args(serde_json::json!({})), &RequestCredentials::default(), false)
            .unwrap();
        assert!(group.is_none());
    }

    #[test]
    fn expired_token_recovery_mentions_expiry() {
        let secret = b"s3cret";
        let gate = gate(secret);
        let token = mint(secret, &["alpha"], -600);

        let err = gate
            .resolve_tool_call(
                &args(serde_json::json!({"auth_token": token})),
                &RequestCredentials::default(),
                true,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthFailed);
        assert!(err.recovery_strategy().contains("EXPIRED"), "{err:?}");
    }

    #[test]
    fn garbage_token_recovery_mentions_format() {
        let gate = gate(b"s3cret");
        let err = gate
            .resolve_tool_call(
                &args(serde_json::json!({"auth_token": "not.a.jwt"})),
                &RequestCredentials::default(),
                true,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthFailed);
        assert!(err.recovery_strategy().contains("INVALID TOKEN"), "{err:?}");
    }

    #[test]
    fn legacy_header_carries_token_after_group_hint() {
        let secret = b"s3cret";
        let gate = gate(secret);
        let token = mint(secret, &["finance"], 600);

        let group = gate
            .resolve_http(&RequestCredentials {
                bearer: None,
                legacy_group_token: Some(format!("finance:{token}")),
            })
            .unwrap();
        assert_eq!(group, "finance");
    }
}
