use std::{fmt, future::Future, time::Duration};

use openidconnect::{core::{CoreClient, CoreProviderMetadata}, AuthorizationCode, ClientId, ClientSecret, HttpRequest, HttpResponse, OAuth2TokenResponse, RedirectUrl, RequestTokenError::ServerResponse};
use serde_json::Value;
use url::Url;

use crate::{config::ClientConfig, consts::WELL_KNOWN_PATH, handler_error::{ConfigError, DiscoveryError, ExchangeError}, platform::{MaybeSend, MaybeSync}};

/// Discovered provider endpoints.
///
/// Source: https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderMetadata
#[derive(Debug, Clone)]
pub struct IssuerConfig(CoreProviderMetadata);

impl IssuerConfig {
  pub fn new(metadata: CoreProviderMetadata) -> Self {
    IssuerConfig(metadata)
  }

  pub fn from_slice(document: &[u8]) -> Result<Self, DiscoveryError> {
    Ok(IssuerConfig(serde_json::from_slice(document)?))
  }

  pub fn issuer(&self) -> &Url {
    self.0.issuer().url()
  }

  pub fn authorization_endpoint(&self) -> &Url {
    self.0.authorization_endpoint().url()
  }

  pub fn token_endpoint(&self) -> Option<&Url> {
    self.0.token_endpoint().map(|url| url.url())
  }

  pub fn jwks_uri(&self) -> &Url {
    self.0.jwks_uri().url()
  }

  pub fn metadata(&self) -> &CoreProviderMetadata {
    &self.0
  }
}

/// Tokens returned by the provider's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
  pub access_token: String,
  pub id_token: Option<String>
}

impl fmt::Debug for TokenSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokenSet")
      .field("access_token", &"[redacted]")
      .field("id_token", &self.id_token.as_ref().map(|_| "[redacted]"))
      .finish()
  }
}

/// The OpenID Connect protocol operations the gateway relies on.
pub trait IdentityProvider: MaybeSend + MaybeSync + 'static {
  /// Fetch and parse the discovery document for `metadata_url`
  fn discover(
    &self,
    metadata_url: &Url
  ) -> impl Future<Output = Result<IssuerConfig, DiscoveryError>> + MaybeSend;

  /// Fetch the raw JWKS document
  fn fetch_jwks(
    &self,
    jwks_uri: &Url
  ) -> impl Future<Output = Result<Value, DiscoveryError>> + MaybeSend;

  /// Trade an authorization code for tokens at the token endpoint
  fn exchange_code(
    &self,
    issuer: &IssuerConfig,
    client: &ClientConfig,
    code: AuthorizationCode
  ) -> impl Future<Output = Result<TokenSet, ExchangeError>> + MaybeSend;
}

/// Location of the discovery document. Urls that already point into
/// `/.well-known/` are used as is, anything else is treated as the issuer.
pub fn discovery_url(metadata_url: &Url) -> Url {
  if metadata_url.path().contains("/.well-known/") {
    return metadata_url.clone()
  }

  let mut url = metadata_url.clone();
  let path = format!(
    "{issuer_path}/{WELL_KNOWN_PATH}",
    issuer_path = url.path().trim_end_matches('/')
  );
  url.set_path(&path);
  url
}

/// Authorization request for the code flow.
///
/// Source: https://openid.net/specs/openid-connect-core-1_0.html#AuthRequest
pub fn authorization_url(
  issuer: &IssuerConfig,
  client: &ClientConfig,
  state: Option<&str>
) -> Url {
  let mut url = issuer.authorization_endpoint().clone();

  let mut query = url.query_pairs_mut();
  query.append_pair("client_id", &client.client_id);
  query.append_pair("scope", &client.scopes.join(" "));
  query.append_pair("response_type", "code");
  query.append_pair("redirect_uri", &client.redirect_uri());
  if let Some(state) = state {
    query.append_pair("state", state);
  }
  drop(query);

  url
}

/// `IdentityProvider` over HTTP with `openidconnect` and `reqwest`.
#[derive(Debug, Clone)]
pub struct OpenIdConnectProvider {
  http: reqwest::Client
}

impl OpenIdConnectProvider {
  /// `timeout` bounds every request on native targets. Workers enforce
  /// their own subrequest limits.
  pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
    let builder = reqwest::Client::builder();

    #[cfg(not(target_arch = "wasm32"))]
    let builder = builder.timeout(timeout);
    #[cfg(target_arch = "wasm32")]
    let _ = timeout;

    Ok(OpenIdConnectProvider { http: builder.build()? })
  }

  async fn get(&self, url: &Url) -> Result<Vec<u8>, DiscoveryError> {
    let response = self.http.get(url.clone())
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      return Err(DiscoveryError::Status {
        url: url.to_string(),
        status: status.as_u16()
      })
    }

    Ok(response.bytes().await?.to_vec())
  }
}

impl IdentityProvider for OpenIdConnectProvider {
  async fn discover(&self, metadata_url: &Url) -> Result<IssuerConfig, DiscoveryError> {
    let url = discovery_url(metadata_url);
    tracing::debug!(%url, "fetching discovery document");

    IssuerConfig::from_slice(&self.get(&url).await?)
  }

  async fn fetch_jwks(&self, jwks_uri: &Url) -> Result<Value, DiscoveryError> {
    tracing::debug!(%jwks_uri, "fetching JWKS");

    Ok(serde_json::from_slice(&self.get(jwks_uri).await?)?)
  }

  async fn exchange_code(
    &self,
    issuer: &IssuerConfig,
    client: &ClientConfig,
    code: AuthorizationCode
  ) -> Result<TokenSet, ExchangeError> {
    if issuer.token_endpoint().is_none() {
      return Err(ExchangeError::NoTokenEndpoint)
    }

    let oidc_client = CoreClient::from_provider_metadata(
      issuer.metadata().clone(),
      ClientId::new(client.client_id.clone()),
      Some(ClientSecret::new(client.client_secret.clone()))
    )
    // must match the redirect_uri of the authorization request
    .set_redirect_uri(RedirectUrl::new(client.redirect_uri())?);

    let response = oidc_client.exchange_code(code)
      .request_async(|request| http_client(&self.http, request))
      .await
      .map_err(|e| match e {
        ServerResponse(response) => {
          tracing::warn!(error = %response, "token endpoint rejected the code");
          ExchangeError::Rejected(response.to_string())
        },
        other => ExchangeError::from(other)
      })?;

    Ok(TokenSet {
      access_token: response.access_token().secret().clone(),
      id_token: response.extra_fields()
        .id_token()
        .map(ToString::to_string)
    })
  }
}

/// Run an `oauth2` request on the shared `reqwest` client so the
/// configured timeout applies to the token request as well.
async fn http_client(
  http: &reqwest::Client,
  request: HttpRequest
) -> Result<HttpResponse, reqwest::Error> {
  let response = http.request(request.method, request.url)
    .headers(request.headers)
    .body(request.body)
    .send()
    .await?;

  Ok(HttpResponse {
    status_code: response.status(),
    headers: response.headers().clone(),
    body: response.bytes().await?.to_vec()
  })
}
