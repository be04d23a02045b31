use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handler_error::DiscoveryError;

/// The JWKS entry tokens are verified against.
///
/// Source: https://www.rfc-editor.org/rfc/rfc7517.html#section-4
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
  pub kty: String,
  #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
  pub key_use: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kid: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub alg: Option<String>,
  // RSA
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub n: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub e: Option<String>,
  // EC and OKP
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub crv: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub x: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub y: Option<String>
}

/// Pick the active key from a JWKS document: the first entry whose `use`
/// is `sig`, otherwise the first entry of the set.
pub fn select_signing_key(jwks: &Value) -> Result<SigningKey, DiscoveryError> {
  let keys = jwks.get("keys")
    .and_then(Value::as_array)
    .ok_or(DiscoveryError::MissingKeys)?;

  let selected = keys.iter()
    .find(|key| key.get("use").and_then(Value::as_str) == Some("sig"))
    .or_else(|| keys.first())
    .ok_or(DiscoveryError::EmptyKeySet)?;

  SigningKey::deserialize(selected)
    .map_err(|e| DiscoveryError::SigningKey(e.to_string()))
}
