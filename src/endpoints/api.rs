use crate::{consts::{API_PREFIX, SESSION_COOKIE}, cookie, request::{GatewayOutcome, GatewayRequest}};

/// Relay an `/api` request to the origin: drop the prefix and present the
/// session cookie as a bearer token. The token is not verified here.
pub fn api(mut request: GatewayRequest) -> GatewayOutcome {
  // leading slashes collapse the way routing sees them, `//api/x` is `/api/x`
  let rest = request.path
    .trim_start_matches('/')
    .strip_prefix(API_PREFIX.trim_start_matches('/'))
    .filter(|rest| rest.is_empty() || rest.starts_with('/'));

  if let Some(rest) = rest {
    request.path = if rest.is_empty() {
      "/".to_string()
    } else {
      rest.to_string()
    };
  }

  if let Some(token) = cookie::from_headers(&request.headers, SESSION_COOKIE) {
    request.headers.set("Authorization", format!("Bearer {token}"));
  }

  GatewayOutcome::Forward(request)
}
