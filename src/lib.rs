mod cache;
mod config;
mod consts;
pub mod cookie;
mod edge_event;
mod endpoints;
mod gateway;
mod handler_error;
mod jwks;
mod oidc;
mod oidc_token;
mod platform;
mod request;
mod route;
mod scope;
mod service;

pub use cache::{MetadataCache, ProviderMetadata};
pub use config::{ApiPolicy, ClientConfig, ConfigSource, GatewayOptions, ProcessEnv, SecretSource, SessionToken};
pub use consts::{Secret, SECRETS_ARRAY};
pub use cookie::{CookieAttributes, SameSite};
pub use edge_event::{handle_event, CloudFrontEvent, CloudFrontRequest, CloudFrontResponse, EventError};
pub use endpoints::callback_error::ErrorParams;
pub use gateway::Gateway;
pub use handler_error::{ConfigError, DiscoveryError, ExchangeError, RewriteError, VerificationError};
pub use jwks::{select_signing_key, SigningKey};
pub use oidc::{authorization_url, discovery_url, IdentityProvider, IssuerConfig, OpenIdConnectProvider, TokenSet};
pub use oidc_token::{new_token, Claims, TokenVerifier};
pub use platform::{BoxFuture, MaybeSend, MaybeSync};
pub use request::{GatewayOutcome, GatewayRequest, GatewayResponse, HeaderEntry, Headers};
pub use route::Route;
pub use service::{apply_rewrite, gateway_request, serve, Origin};

#[cfg(not(target_arch = "wasm32"))]
pub use service::{router, GatewayService};

#[cfg(target_arch = "wasm32")]
mod worker_entry {
  use std::sync::OnceLock;

  use axum::{body::{to_bytes, Body}, http::{Request, Response, StatusCode}, response::IntoResponse, Router};
  use tower_service::Service;
  use tracing_subscriber::prelude::*;
  use worker::{event, send::SendWrapper, Context, Env, Fetch, HttpRequest, Method, RequestInit};

  use crate::{config::{ClientConfig, ConfigSource, SecretSource}, consts::METADATA_ERROR, gateway::Gateway, oidc::OpenIdConnectProvider, request::GatewayResponse, service::{serve, Origin}};

  impl SecretSource for Env {
    fn lookup(&self, name: &str) -> Option<String> {
      self.secret(name)
        .map(|secret| secret.to_string())
        .or_else(|_| self.var(name).map(|var| var.to_string()))
        .ok()
    }
  }

  /// Forwards allowed requests with the Workers `fetch` API.
  struct FetchOrigin;

  impl FetchOrigin {
    async fn fetch(&self, request: Request<Body>) -> worker::Result<Response<Body>> {
      let (parts, body) = request.into_parts();
      let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| worker::Error::RustError(e.to_string()))?;

      let headers = worker::Headers::new();
      for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
          headers.append(name.as_str(), value)?;
        }
      }

      let mut init = RequestInit::new();
      init.with_method(Method::from(parts.method.to_string()))
        .with_headers(headers);
      if !body.is_empty() {
        init.with_body(Some(worker::js_sys::Uint8Array::from(body.as_ref()).into()));
      }

      // the worker sees absolute request urls
      let request = worker::Request::new_with_init(&parts.uri.to_string(), &init)?;
      let mut response = Fetch::Request(request).send().await?;

      let mut builder = Response::builder().status(response.status_code());
      for (name, value) in response.headers().entries() {
        builder = builder.header(name, value);
      }

      builder.body(Body::from(response.bytes().await?))
        .map_err(|e| worker::Error::RustError(e.to_string()))
    }
  }

  impl Origin for FetchOrigin {
    async fn forward(&self, request: Request<Body>) -> Response<Body> {
      match self.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
          tracing::error!(error = %e, "origin fetch failed");
          StatusCode::BAD_GATEWAY.into_response()
        }
      }
    }
  }

  struct WorkerService {
    gateway: Gateway<OpenIdConnectProvider>,
    origin: FetchOrigin
  }

  // SendWrapper docs: https://docs.rs/worker/latest/worker/#send-helpers
  static SERVICE: OnceLock<SendWrapper<WorkerService>> = OnceLock::new();

  /// Built from the worker's secrets and vars on the first request, then
  /// shared by every request the isolate serves.
  fn service(env: &Env) -> Result<&'static WorkerService, crate::ConfigError> {
    if let Some(service) = SERVICE.get() {
      return Ok(&service.0)
    }

    let client = ClientConfig::from_source(env)?;
    let gateway = Gateway::from_source(env, ConfigSource::Fixed(client))?;

    Ok(&SERVICE.get_or_init(|| SendWrapper(WorkerService { gateway, origin: FetchOrigin })).0)
  }

  #[event(start)]
  fn start() {
    console_error_panic_hook::set_once();

    let fmt_layer = tracing_subscriber::fmt::layer()
      .json()
      // Only partially supported across JavaScript runtimes
      .with_ansi(false)
      // std::time is not available in workers
      .without_time()
      .with_writer(tracing_web::MakeWebConsoleWriter::new());
    let perf_layer = tracing_web::performance_layer();

    tracing_subscriber::registry()
      .with(fmt_layer)
      .with(perf_layer)
      .init();
  }

  #[worker::send]
  async fn handle(request: Request<Body>) -> Response<Body> {
    match SERVICE.get() {
      Some(service) => serve(&service.gateway, &service.origin, request).await,
      None => GatewayResponse::text(500, METADATA_ERROR).into_response()
    }
  }

  // Program entrypoint. Essentially the `main` function.
  #[event(fetch)]
  async fn fetch(req: HttpRequest, env: Env, _: Context) -> worker::Result<Response<Body>> {
    if let Err(e) = service(&env) {
      tracing::error!(error = %e, "invalid worker configuration");
      return Ok(GatewayResponse::text(500, METADATA_ERROR).into_response())
    }

    Ok(
      // every path is handled by the gateway
      Router::new()
        .fallback(handle)
        .call(req)
        .await?
    )
  }
}
