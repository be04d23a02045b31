use std::sync::Arc;

use axum::http::{header::{InvalidHeaderName, InvalidHeaderValue}, uri::{InvalidUri, InvalidUriParts}};
use openidconnect::core::CoreRequestTokenError;
use surrealdb_jsonwebtoken::{errors::{Error as JwtError, ErrorKind}, Algorithm};

use crate::endpoints::callback_error::ErrorParams;

/// Gateway configuration could not be assembled.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
  #[error("Missing configuration: {}", .0.join(", "))]
  MissingSecrets(Vec<&'static str>),
  #[error(r#"Invalid value "{value}" for "{name}""#)]
  InvalidOption {
    name: &'static str,
    value: String
  },
  #[error(r#"Invalid url for "{name}": {source}"#)]
  Url {
    name: &'static str,
    source: url::ParseError
  },
  #[error("{0}")]
  Scope(String),
  #[error(transparent)]
  HttpClient(#[from] reqwest::Error)
}

/// Provider discovery or signing key selection failed. Cloneable so a
/// single discovery attempt can be shared by every request waiting on it.
#[derive(thiserror::Error, Debug, Clone)]
pub enum DiscoveryError {
  #[error(transparent)]
  Http(Arc<reqwest::Error>),
  #[error("Timed out fetching {0}")]
  Timeout(String),
  #[error("{url} responded with status {status}")]
  Status {
    url: String,
    status: u16
  },
  #[error("Malformed discovery document: {0}")]
  Document(Arc<serde_json::Error>),
  #[error("jwk invalid or missing")]
  MissingKeys,
  #[error("JWKS document contains no keys")]
  EmptyKeySet,
  #[error("Unusable signing key: {0}")]
  SigningKey(String)
}

impl From<reqwest::Error> for DiscoveryError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      DiscoveryError::Timeout(
        err.url()
          .map(ToString::to_string)
          .unwrap_or_default()
      )
    } else {
      DiscoveryError::Http(Arc::new(err))
    }
  }
}

impl From<serde_json::Error> for DiscoveryError {
  fn from(err: serde_json::Error) -> Self {
    DiscoveryError::Document(Arc::new(err))
  }
}

/// The session token is missing or not acceptable. Every variant is
/// answered the same way, the distinction only reaches the logs.
#[derive(thiserror::Error, Debug)]
pub enum VerificationError {
  #[error("No session cookie")]
  MissingToken,
  #[error("Token algorithm {0:?} does not match the signing key")]
  AlgorithmMismatch(Algorithm),
  #[error("Token expired")]
  Expired,
  #[error("Token not yet valid")]
  Immature,
  #[error("Invalid token signature")]
  InvalidSignature,
  #[error("Malformed token: {0}")]
  Malformed(JwtError)
}

impl From<JwtError> for VerificationError {
  fn from(err: JwtError) -> Self {
    match err.kind() {
      ErrorKind::ExpiredSignature => VerificationError::Expired,
      ErrorKind::ImmatureSignature => VerificationError::Immature,
      ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
      _ => VerificationError::Malformed(err)
    }
  }
}

/// The authorization code could not be turned into a session.
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
  #[error("Callback did not include an authorization code")]
  MissingParams,
  #[error("Provider authorize: {0}")]
  Provider(ErrorParams),
  #[error("Callback state does not match the login state")]
  StateMismatch,
  #[error("Provider metadata has no token endpoint")]
  NoTokenEndpoint,
  #[error("Invalid redirect url: {0}")]
  RedirectUrl(#[from] url::ParseError),
  #[error(transparent)]
  Token(#[from] CoreRequestTokenError<reqwest::Error>),
  #[error("Token response did not contain an id_token.")]
  MissingIdToken,
  /// the token endpoint answered with an OAuth error response
  #[error("Token endpoint rejected the code: {0}")]
  Rejected(String)
}

/// A rewritten request could not be applied to the transport's request.
#[derive(thiserror::Error, Debug)]
pub enum RewriteError {
  #[error("Invalid rewritten path: {0}")]
  Path(#[from] InvalidUri),
  #[error("Invalid rewritten uri: {0}")]
  Uri(#[from] InvalidUriParts),
  #[error("Invalid header name: {0}")]
  HeaderName(#[from] InvalidHeaderName),
  #[error("Invalid header value: {0}")]
  HeaderValue(#[from] InvalidHeaderValue)
}
