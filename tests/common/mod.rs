#![allow(dead_code)]

use std::{sync::{atomic::{AtomicBool, AtomicUsize, Ordering}, Arc}, time::Duration};

use chrono::Utc;
use edge_oidc_gateway::{ClientConfig, ConfigSource, DiscoveryError, ExchangeError, Gateway, GatewayOptions, GatewayOutcome, GatewayRequest, GatewayResponse, IdentityProvider, IssuerConfig, TokenSet};
use openidconnect::AuthorizationCode;
use parking_lot::Mutex;
use serde_json::{json, Value};
use surrealdb_jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use url::Url;

pub const IDP_PEM: &str = include_str!("../fixtures/idp_rsa.pem");
pub const OTHER_PEM: &str = include_str!("../fixtures/other_rsa.pem");
pub const IDP_JWK: &str = include_str!("../fixtures/idp_rsa.jwk.json");
pub const OTHER_JWK: &str = include_str!("../fixtures/other_rsa.jwk.json");

pub const LOGIN_LOCATION: &str = "https://idp.example/authorize?client_id=abc&scope=openid&response_type=code&redirect_uri=https%3A%2F%2Fedge.example%2Fcb";

pub fn discovery_document(base: &str) -> Value {
  json!({
    "issuer": base,
    "authorization_endpoint": format!("{base}/authorize"),
    "token_endpoint": format!("{base}/token"),
    "jwks_uri": format!("{base}/jwks"),
    "response_types_supported": ["code"],
    "subject_types_supported": ["public"],
    "id_token_signing_alg_values_supported": ["RS256"]
  })
}

pub fn jwk(fixture: &str) -> Value {
  serde_json::from_str(fixture).unwrap()
}

/// JWKS holding only the key the fake provider signs with
pub fn idp_jwks() -> Value {
  json!({ "keys": [jwk(IDP_JWK)] })
}

pub fn sign(pem: &str, claims: &Value) -> String {
  encode(
    &Header::new(Algorithm::RS256),
    claims,
    &EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap()
  ).unwrap()
}

/// Session token signed by the provider, valid for an hour
pub fn valid_token() -> String {
  sign(IDP_PEM, &json!({
    "iss": "https://idp.example",
    "sub": "user123",
    "exp": Utc::now().timestamp() + 3600
  }))
}

pub fn expired_token() -> String {
  sign(IDP_PEM, &json!({
    "iss": "https://idp.example",
    "sub": "user123",
    "exp": Utc::now().timestamp() - 3600
  }))
}

/// Signed by a key the provider never published
pub fn foreign_token() -> String {
  sign(OTHER_PEM, &json!({
    "iss": "https://idp.example",
    "sub": "user123",
    "exp": Utc::now().timestamp() + 3600
  }))
}

pub struct FakeState {
  pub discover_calls: AtomicUsize,
  pub exchange_calls: AtomicUsize,
  pub fail_discovery: AtomicBool,
  pub discovery_delay: Mutex<Option<Duration>>,
  pub jwks: Mutex<Value>,
  /// `None` makes every exchange fail
  pub tokens: Mutex<Option<TokenSet>>,
  pub codes: Mutex<Vec<String>>
}

/// In-memory provider at `https://idp.example` counting its calls.
#[derive(Clone)]
pub struct FakeProvider {
  pub state: Arc<FakeState>
}

impl Default for FakeProvider {
  fn default() -> Self {
    FakeProvider {
      state: Arc::new(FakeState {
        discover_calls: AtomicUsize::new(0),
        exchange_calls: AtomicUsize::new(0),
        fail_discovery: AtomicBool::new(false),
        discovery_delay: Mutex::new(None),
        jwks: Mutex::new(idp_jwks()),
        tokens: Mutex::new(Some(TokenSet {
          access_token: "tok123".into(),
          id_token: None
        })),
        codes: Mutex::new(Vec::new())
      })
    }
  }
}

impl FakeProvider {
  pub fn with_jwks(self, jwks: Value) -> Self {
    *self.state.jwks.lock() = jwks;
    self
  }

  pub fn with_tokens(self, tokens: Option<TokenSet>) -> Self {
    *self.state.tokens.lock() = tokens;
    self
  }

  pub fn with_discovery_delay(self, delay: Duration) -> Self {
    *self.state.discovery_delay.lock() = Some(delay);
    self
  }

  pub fn failing(self) -> Self {
    self.set_failing(true);
    self
  }

  pub fn set_failing(&self, failing: bool) {
    self.state.fail_discovery.store(failing, Ordering::SeqCst);
  }

  pub fn discover_calls(&self) -> usize {
    self.state.discover_calls.load(Ordering::SeqCst)
  }

  pub fn exchange_calls(&self) -> usize {
    self.state.exchange_calls.load(Ordering::SeqCst)
  }

  pub fn codes(&self) -> Vec<String> {
    self.state.codes.lock().clone()
  }
}

impl IdentityProvider for FakeProvider {
  async fn discover(&self, metadata_url: &Url) -> Result<IssuerConfig, DiscoveryError> {
    self.state.discover_calls.fetch_add(1, Ordering::SeqCst);

    let delay = *self.state.discovery_delay.lock();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    if self.state.fail_discovery.load(Ordering::SeqCst) {
      return Err(DiscoveryError::Status {
        url: metadata_url.to_string(),
        status: 503
      })
    }

    IssuerConfig::from_slice(
      discovery_document("https://idp.example").to_string().as_bytes()
    )
  }

  async fn fetch_jwks(&self, _: &Url) -> Result<Value, DiscoveryError> {
    Ok(self.state.jwks.lock().clone())
  }

  async fn exchange_code(
    &self,
    _: &IssuerConfig,
    _: &ClientConfig,
    code: AuthorizationCode
  ) -> Result<TokenSet, ExchangeError> {
    self.state.exchange_calls.fetch_add(1, Ordering::SeqCst);
    self.state.codes.lock().push(code.secret().clone());

    let tokens = self.state.tokens.lock().clone();
    tokens.ok_or_else(|| ExchangeError::Rejected("invalid_grant".into()))
  }
}

pub fn client_config() -> ClientConfig {
  ClientConfig {
    client_id: "abc".into(),
    client_secret: "shh".into(),
    domain: "https://edge.example".into(),
    idp_metadata_url: Url::parse("https://idp.example").unwrap(),
    scopes: vec!["openid".into()]
  }
}

pub fn gateway(provider: &FakeProvider) -> Gateway<FakeProvider> {
  gateway_with(provider, GatewayOptions::default())
}

pub fn gateway_with(provider: &FakeProvider, options: GatewayOptions) -> Gateway<FakeProvider> {
  Gateway::new(provider.clone(), ConfigSource::Fixed(client_config()), options)
}

pub fn respond(outcome: GatewayOutcome) -> GatewayResponse {
  match outcome {
    GatewayOutcome::Respond(response) => response,
    other => panic!("expected a response, got {other:?}")
  }
}

pub fn forward(outcome: GatewayOutcome) -> GatewayRequest {
  match outcome {
    GatewayOutcome::Forward(request) => request,
    other => panic!("expected a forward, got {other:?}")
  }
}

pub fn with_cookie(path: &str, cookie: &str) -> GatewayRequest {
  GatewayRequest::new(path).with_header("Cookie", cookie)
}
