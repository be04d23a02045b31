//! Running the gateway in front of an HTTP origin with `axum` types.

use std::future::Future;

use axum::{body::Body, http::{request::Parts, uri::PathAndQuery, HeaderName, HeaderValue, Request, StatusCode, Uri}, response::{IntoResponse, Response}};
use itertools::Itertools;

use crate::{gateway::Gateway, handler_error::RewriteError, oidc::IdentityProvider, platform::{MaybeSend, MaybeSync}, request::{GatewayOutcome, GatewayRequest, GatewayResponse, Headers}};

/// Where requests go once the gateway lets them through.
pub trait Origin: MaybeSend + MaybeSync + 'static {
  /// Failures are answered by the origin itself, typically with `502`.
  fn forward(&self, request: Request<Body>) -> impl Future<Output = Response> + MaybeSend;
}

impl IntoResponse for GatewayResponse {
  fn into_response(self) -> Response {
    let status = StatusCode::from_u16(self.status)
      .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, self.body).into_response();
    for entry in self.headers.iter() {
      match (
        HeaderName::from_bytes(entry.key.as_bytes()),
        HeaderValue::from_str(&entry.value)
      ) {
        (Ok(name), Ok(value)) => {
          response.headers_mut().append(name, value);
        },
        _ => tracing::warn!(header = %entry.key, "dropping invalid response header")
      }
    }

    response
  }
}

/// What the gateway sees of an http request. Header values that are not
/// valid UTF-8 are lossily converted, they are only ever read.
pub fn gateway_request(parts: &Parts) -> GatewayRequest {
  let mut headers = Headers::default();
  for (name, value) in parts.headers.iter() {
    headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
  }

  GatewayRequest {
    path: parts.uri.path().to_string(),
    query: parts.uri.query().unwrap_or_default().to_string(),
    headers,
    origin_headers: Headers::default()
  }
}

/// Carry the gateway's rewrite over to the outgoing request. Only what the
/// gateway changed is touched, every other header keeps its raw bytes.
pub fn apply_rewrite(
  parts: &mut Parts,
  original: &GatewayRequest,
  rewritten: &GatewayRequest
) -> Result<(), RewriteError> {
  if rewritten.path != original.path || rewritten.query != original.query {
    let path_and_query = if rewritten.query.is_empty() {
      rewritten.path.clone()
    } else {
      format!("{path}?{query}", path = rewritten.path, query = rewritten.query)
    };

    let mut uri = parts.uri.clone().into_parts();
    uri.path_and_query = Some(path_and_query.parse::<PathAndQuery>()?);
    parts.uri = Uri::from_parts(uri)?;
  }

  let changed = rewritten.headers.names()
    .chain(original.headers.names())
    .unique()
    .filter(|name| rewritten.headers.get(name) != original.headers.get(name));

  for name in changed {
    let name = HeaderName::from_bytes(name.as_bytes())?;
    parts.headers.remove(&name);

    for entry in rewritten.headers.get(name.as_str()) {
      parts.headers.append(name.clone(), HeaderValue::from_str(&entry.value)?);
    }
  }

  Ok(())
}

/// Run one request through the gateway, forwarding it to `origin` when it
/// is allowed through.
pub async fn serve<P: IdentityProvider, O: Origin>(
  gateway: &Gateway<P>,
  origin: &O,
  request: Request<Body>
) -> Response {
  let (mut parts, body) = request.into_parts();
  let original = gateway_request(&parts);

  match gateway.handle(original.clone()).await {
    GatewayOutcome::Respond(response) => response.into_response(),
    GatewayOutcome::Forward(rewritten) => {
      if let Err(e) = apply_rewrite(&mut parts, &original, &rewritten) {
        tracing::warn!(error = %e, "rewritten request rejected");
        return StatusCode::BAD_REQUEST.into_response()
      }

      origin.forward(Request::from_parts(parts, body)).await
    }
  }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{router, GatewayService};

#[cfg(not(target_arch = "wasm32"))]
mod native {
  use std::sync::Arc;

  use axum::{body::Body, extract::State, http::Request, response::Response, Router};

  use super::{serve, Origin};
  use crate::{gateway::Gateway, oidc::IdentityProvider};

  /// Router state: the gateway and the origin behind it.
  pub struct GatewayService<P, O> {
    pub gateway: Arc<Gateway<P>>,
    pub origin: Arc<O>
  }

  impl<P, O> Clone for GatewayService<P, O> {
    fn clone(&self) -> Self {
      GatewayService {
        gateway: self.gateway.clone(),
        origin: self.origin.clone()
      }
    }
  }

  /// Every path goes through the gateway, so the whole app is a fallback.
  pub fn router<P: IdentityProvider, O: Origin>(
    gateway: Arc<Gateway<P>>,
    origin: Arc<O>
  ) -> Router {
    Router::new()
      .fallback(proxy::<P, O>)
      .with_state(GatewayService { gateway, origin })
  }

  async fn proxy<P: IdentityProvider, O: Origin>(
    State(service): State<GatewayService<P, O>>,
    request: Request<Body>
  ) -> Response {
    serve(&service.gateway, &*service.origin, request).await
  }
}
