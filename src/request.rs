use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::SecretSource;

/// One header line, `key` keeps the casing it was sent with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
  pub key: String,
  pub value: String
}

/// Header multimap keyed by lowercase header name, every name holding
/// its lines in the order they were received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Vec<HeaderEntry>>);

impl Headers {
  /// Value of the first `name` line
  pub fn first(&self, name: &str) -> Option<&str> {
    self.get(name)
      .first()
      .map(|entry| entry.value.as_str())
  }

  pub fn get(&self, name: &str) -> &[HeaderEntry] {
    self.0.get(&name.to_ascii_lowercase())
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Replace every `key` line with a single one
  pub fn set(&mut self, key: &str, value: impl Into<String>) {
    self.0.insert(
      key.to_ascii_lowercase(),
      vec![HeaderEntry { key: key.to_string(), value: value.into() }]
    );
  }

  pub fn append(&mut self, key: &str, value: impl Into<String>) {
    self.0.entry(key.to_ascii_lowercase())
      .or_default()
      .push(HeaderEntry { key: key.to_string(), value: value.into() });
  }

  /// Lowercase names of every header present
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.values().all(Vec::is_empty)
  }

  /// Every line, grouped by name
  pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
    self.0.values().flatten()
  }
}

/// Origin custom headers double as a configuration source, see
/// `ConfigSource::OriginHeaders`.
impl SecretSource for Headers {
  fn lookup(&self, name: &str) -> Option<String> {
    self.first(name).map(String::from)
  }
}

/// An inbound request as the gateway sees it. Handlers may rewrite the
/// path and headers before it is forwarded to the origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayRequest {
  pub path: String,
  /// query string without the leading `?`
  pub query: String,
  pub headers: Headers,
  /// custom headers the transport attaches for the origin, only used for
  /// request supplied configuration
  pub origin_headers: Headers
}

impl GatewayRequest {
  pub fn new(path: impl Into<String>) -> Self {
    GatewayRequest {
      path: path.into(),
      ..Default::default()
    }
  }

  pub fn with_query(mut self, query: impl Into<String>) -> Self {
    self.query = query.into();
    self
  }

  pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
    self.headers.append(key, value);
    self
  }
}

/// A response synthesized by the gateway instead of forwarding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayResponse {
  pub status: u16,
  pub body: String,
  pub headers: Headers
}

impl GatewayResponse {
  /// `302 Found` to `location`
  pub fn redirect(location: &str) -> Self {
    GatewayResponse {
      status: 302,
      body: String::new(),
      headers: Headers::default()
    }.with_header("Location", location)
  }

  /// plain text response without headers
  pub fn text(status: u16, body: &str) -> Self {
    GatewayResponse {
      status,
      body: body.to_string(),
      headers: Headers::default()
    }
  }

  pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
    self.headers.append(key, value);
    self
  }
}

/// What the transport should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
  /// send the (possibly rewritten) request on to the origin
  Forward(GatewayRequest),
  /// answer with this response, the origin is never contacted
  Respond(GatewayResponse)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_headers_are_case_insensitive() {
    let mut headers = Headers::default();
    headers.append("Set-Cookie", "a=1");
    headers.append("set-cookie", "b=2");

    assert_eq!(headers.get("SET-COOKIE").len(), 2);
    assert_eq!(headers.first("set-cookie"), Some("a=1"));
    assert_eq!(headers.get("set-cookie")[0].key, "Set-Cookie");
  }

  #[test]
  fn test_set_overwrites_every_line() {
    let mut headers = Headers::default();
    headers.append("authorization", "Basic abc");
    headers.append("Authorization", "Basic def");
    headers.set("Authorization", "Bearer tok123");

    assert_eq!(
      headers.get("authorization"),
      &[HeaderEntry { key: "Authorization".into(), value: "Bearer tok123".into() }]
    );
  }

  #[test]
  fn test_headers_serialize_as_multimap() {
    let mut headers = Headers::default();
    headers.append("Location", "/login");

    assert_eq!(
      serde_json::to_value(&headers).unwrap(),
      serde_json::json!({ "location": [{ "key": "Location", "value": "/login" }] })
    );
  }

  #[test]
  fn test_redirect_response() {
    let response = GatewayResponse::redirect("/login");

    assert_eq!(response.status, 302);
    assert!(response.body.is_empty());
    assert_eq!(response.headers.first("location"), Some("/login"));
  }

  #[test]
  fn test_origin_headers_as_secret_source() {
    let mut headers = Headers::default();
    headers.append("CLIENT_ID", "abc");

    assert_eq!(headers.lookup("client_id").as_deref(), Some("abc"));
    assert_eq!(headers.lookup("CLIENT_SECRET"), None);
  }
}
