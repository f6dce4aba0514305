//! Service-account credential loading
//!
//! The credential blob arrives as Base64-encoded JSON in the environment. It
//! may be a bare service-account object or nested under
//! `google_play.service_account_json`, and the private key frequently comes
//! through with its newlines escaped once or twice.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

/// Standard alphabet, padding optional
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("malformed private key")]
    MalformedPrivateKey,
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    /// PEM with literal newlines
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountCredentials {
    /// Decode credentials from the raw environment value. Line breaks and
    /// missing padding are tolerated.
    pub fn from_base64(encoded: Option<&str>) -> Result<Self, ConfigurationError> {
        let encoded = encoded
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                error!("GPLAY_SERVICE_ACCOUNT_BASE64 environment variable not found");
                ConfigurationError::MissingCredentials
            })?;

        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        let bytes = LENIENT_BASE64.decode(compact).map_err(|e| {
            error!(error = %e, "Service account blob is not valid Base64");
            ConfigurationError::InvalidConfiguration(format!("base64: {}", e))
        })?;

        let decoded = String::from_utf8(bytes).map_err(|e| {
            error!(error = %e, "Service account blob is not valid UTF-8");
            ConfigurationError::InvalidConfiguration(format!("utf-8: {}", e))
        })?;

        Self::from_json(&decoded)
    }

    /// Parse a decoded JSON document (BOM tolerated)
    pub fn from_json(raw: &str) -> Result<Self, ConfigurationError> {
        let parsed: Value = serde_json::from_str(strip_bom(raw)).map_err(|e| {
            error!(error = %e, "Service account JSON could not be parsed");
            ConfigurationError::InvalidConfiguration(format!("json: {}", e))
        })?;
        info!("Configuration JSON decoded successfully");

        let mut creds = unwrap_nested(parsed)?;

        let normalized = match creds.get("private_key") {
            Some(Value::String(key)) if !key.trim().is_empty() => normalize_private_key(key),
            _ => {
                let keys: Vec<&str> = creds
                    .as_object()
                    .map(|map| map.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                error!(?keys, "Private key field missing or malformed");
                return Err(ConfigurationError::MalformedPrivateKey);
            }
        };
        creds["private_key"] = Value::String(normalized);
        info!("Private key newlines normalized");

        serde_json::from_value(creds).map_err(|e| {
            error!(error = %e, "Service account JSON is missing required fields");
            ConfigurationError::InvalidConfiguration(format!("fields: {}", e))
        })
    }
}

/// Unwrap `google_play.service_account_json` when present. The nested value
/// may be an object or a JSON string.
fn unwrap_nested(parsed: Value) -> Result<Value, ConfigurationError> {
    let nested = parsed
        .get("google_play")
        .and_then(|play| play.get("service_account_json"))
        .filter(|value| !value.is_null())
        .cloned();

    match nested {
        None => Ok(parsed),
        Some(Value::String(inner)) => {
            info!("Accessing nested service_account_json (string)");
            serde_json::from_str(strip_bom(&inner)).map_err(|e| {
                error!(error = %e, "Nested service_account_json could not be parsed");
                ConfigurationError::InvalidConfiguration(format!("nested json: {}", e))
            })
        }
        Some(inner) => {
            info!("Accessing nested service_account_json");
            Ok(inner)
        }
    }
}

/// `str::trim` does not count U+FEFF as whitespace, so a BOM may sit on
/// either side of surrounding blanks.
fn strip_bom(raw: &str) -> &str {
    raw.trim().trim_start_matches('\u{feff}').trim()
}

/// Turn `\\n` and then `\n` escape sequences into literal newlines.
///
/// The double-escaped form must go first, otherwise it would be left as a
/// stray backslash followed by a newline.
pub fn normalize_private_key(key: &str) -> String {
    key.replace("\\\\n", "\n").replace("\\n", "\n")
}
