use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use getrandom::getrandom;
use serde_json::{Map, Value};
use surrealdb_jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use crate::{handler_error::{DiscoveryError, VerificationError}, jwks::SigningKey};

/// Claims of a verified token. Nothing beyond validity is consumed, so they
/// are kept as raw JSON.
pub type Claims = Map<String, Value>;

/// A signing key converted into a verification key, built once per
/// discovery.
#[derive(Clone)]
pub struct TokenVerifier {
  key: DecodingKey,
  algorithms: Vec<Algorithm>,
  /// seconds of leeway for `exp` and `nbf`
  leeway: u64
}

impl std::fmt::Debug for TokenVerifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenVerifier")
      .field("algorithms", &self.algorithms)
      .field("leeway", &self.leeway)
      .finish_non_exhaustive()
  }
}

impl TokenVerifier {
  pub fn new(jwk: &SigningKey, leeway: u64) -> Result<Self, DiscoveryError> {
    let algorithms = algorithms(jwk)?;
    let key = decoding_key(jwk)?;

    Ok(TokenVerifier { key, algorithms, leeway })
  }

  pub fn algorithms(&self) -> &[Algorithm] {
    &self.algorithms
  }

  /// Check the signature and the standard time claims. `exp` and `nbf`
  /// are enforced when present but not required.
  pub fn verify(&self, token: &str) -> Result<Claims, VerificationError> {
    let header = decode_header(token)?;

    if !self.algorithms.contains(&header.alg) {
      return Err(VerificationError::AlgorithmMismatch(header.alg))
    }

    let mut validation = Validation::new(header.alg);
    validation.algorithms = vec![header.alg];
    validation.leeway = self.leeway;
    validation.validate_nbf = true;
    validation.required_spec_claims.clear();

    Ok(decode::<Claims>(token, &self.key, &validation)?.claims)
  }
}

/// Algorithms the key may verify. An explicit `alg` wins, otherwise every
/// algorithm of the key type's family is accepted.
fn algorithms(jwk: &SigningKey) -> Result<Vec<Algorithm>, DiscoveryError> {
  if let Some(alg) = &jwk.alg {
    return alg.parse::<Algorithm>()
      .map(|alg| vec![alg])
      .map_err(|_| DiscoveryError::SigningKey(format!("unsupported alg {alg}")))
  }

  match (jwk.kty.as_str(), jwk.crv.as_deref()) {
    ("RSA", _) => Ok(vec![
      Algorithm::RS256,
      Algorithm::RS384,
      Algorithm::RS512,
      Algorithm::PS256,
      Algorithm::PS384,
      Algorithm::PS512
    ]),
    ("EC", Some("P-256")) => Ok(vec![Algorithm::ES256]),
    ("EC", Some("P-384")) => Ok(vec![Algorithm::ES384]),
    ("OKP", Some("Ed25519")) => Ok(vec![Algorithm::EdDSA]),
    (kty, crv) => Err(DiscoveryError::SigningKey(format!(
      "unsupported key type {kty}{crv}",
      crv = crv.map(|crv| format!("/{crv}")).unwrap_or_default()
    )))
  }
}

fn decoding_key(jwk: &SigningKey) -> Result<DecodingKey, DiscoveryError> {
  fn component<'a>(value: &'a Option<String>, name: &str, kty: &str) -> Result<&'a str, DiscoveryError> {
    value.as_deref()
      .ok_or_else(|| DiscoveryError::SigningKey(format!("missing '{name}' in {kty} key")))
  }

  let kty = jwk.kty.as_str();
  let key = match kty {
    "RSA" => DecodingKey::from_rsa_components(
      component(&jwk.n, "n", kty)?,
      component(&jwk.e, "e", kty)?
    ),
    "EC" => DecodingKey::from_ec_components(
      component(&jwk.x, "x", kty)?,
      component(&jwk.y, "y", kty)?
    ),
    "OKP" => DecodingKey::from_ed_components(component(&jwk.x, "x", kty)?),
    other => return Err(DiscoveryError::SigningKey(format!("unsupported key type {other}")))
  };

  key.map_err(|e| DiscoveryError::SigningKey(e.to_string()))
}

/// Random url-safe token of `BYTES` random bytes
pub fn new_token<const BYTES: usize>() -> Result<String, getrandom::Error> {
  let mut rand_buf = [0u8; BYTES];
  getrandom(&mut rand_buf)?;
  Ok(URL_SAFE_NO_PAD.encode(rand_buf))
}
