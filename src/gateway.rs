use std::{borrow::Cow, sync::{Arc, OnceLock}};

use crate::{cache::MetadataCache, config::{ClientConfig, ConfigSource, GatewayOptions, SecretSource}, consts::METADATA_ERROR, endpoints::{api, callback, login, verify}, handler_error::ConfigError, oidc::{IdentityProvider, OpenIdConnectProvider}, request::{GatewayOutcome, GatewayRequest, GatewayResponse}, route::Route};

/// The authentication gateway: classifies each request, makes sure the
/// provider metadata is available and runs the matching handler.
///
/// Errors never leave `handle`, every request ends in a forward or one of
/// a few fixed responses.
#[derive(Debug)]
pub struct Gateway<P> {
  provider: Arc<P>,
  config: ConfigSource,
  /// request supplied configuration, fixed once a discovery with it succeeded
  origin_config: OnceLock<ClientConfig>,
  options: GatewayOptions,
  cache: MetadataCache
}

impl Gateway<OpenIdConnectProvider> {
  /// Gateway talking to the provider over HTTP, options read from `source`
  pub fn from_source(
    source: &impl SecretSource,
    config: ConfigSource
  ) -> Result<Self, ConfigError> {
    let options = GatewayOptions::from_source(source)?;
    let provider = OpenIdConnectProvider::new(options.http_timeout)?;

    Ok(Gateway::new(provider, config, options))
  }
}

impl<P: IdentityProvider> Gateway<P> {
  pub fn new(provider: P, config: ConfigSource, options: GatewayOptions) -> Self {
    Gateway {
      provider: Arc::new(provider),
      config,
      origin_config: OnceLock::new(),
      cache: MetadataCache::new(options.metadata_ttl, options.clock_skew),
      options
    }
  }

  pub fn cache(&self) -> &MetadataCache {
    &self.cache
  }

  pub fn options(&self) -> &GatewayOptions {
    &self.options
  }

  #[tracing::instrument(name = "gateway", skip_all, fields(path = %request.path))]
  pub async fn handle(&self, request: GatewayRequest) -> GatewayOutcome {
    let route = Route::classify(&request.path);
    tracing::debug!(?route, "dispatching");

    // `/api` relays before anything can fail on the provider side
    if !route.needs_metadata(self.options.api_policy) {
      return api(request)
    }

    let client = match self.client_config(&request) {
      Ok(client) => client,
      Err(e) => {
        tracing::error!(error = %e, "no client configuration");
        return GatewayOutcome::Respond(GatewayResponse::text(500, METADATA_ERROR))
      }
    };

    let metadata = match self.cache.ensure_ready(&self.provider, &client.idp_metadata_url).await {
      Ok(metadata) => metadata,
      Err(e) => {
        tracing::warn!(error = %e, "provider metadata unavailable");
        return GatewayOutcome::Respond(GatewayResponse::text(500, METADATA_ERROR))
      }
    };

    let client = match client {
      Cow::Owned(client) => self.origin_config.get_or_init(|| client),
      Cow::Borrowed(client) => client
    };

    match route {
      Route::Login => GatewayOutcome::Respond(
        login(&metadata.issuer, client, &self.options)
      ),
      Route::Callback => GatewayOutcome::Respond(
        callback(&*self.provider, &metadata, client, &self.options, &request).await
      ),
      Route::Api => api(request),
      Route::Verify => verify(&metadata, request)
    }
  }

  /// Origin headers are read again on every request until discovery with
  /// them succeeds, so a broken configuration can be corrected in place.
  fn client_config(&self, request: &GatewayRequest) -> Result<Cow<'_, ClientConfig>, ConfigError> {
    match (&self.config, self.origin_config.get()) {
      (ConfigSource::Fixed(client), _) => Ok(Cow::Borrowed(client)),
      (ConfigSource::OriginHeaders, Some(client)) => Ok(Cow::Borrowed(client)),
      (ConfigSource::OriginHeaders, None) => ClientConfig::from_source(&request.origin_headers)
        .map(Cow::Owned)
    }
  }
}
