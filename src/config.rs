use std::{collections::HashMap, env, fmt, hash::BuildHasher, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use url::Url;

use crate::{consts::{get_secret, validate_secrets, Secret, API_POLICY, CALLBACK_PATH, CLOCK_SKEW_SECS, COOKIE_MAX_AGE_SECS, COOKIE_PATH, COOKIE_SAME_SITE, COOKIE_SECURE, CSRF_STATE, HTTP_TIMEOUT_SECS, METADATA_TTL_SECS, SCOPES, SESSION_TOKEN}, cookie::{CookieAttributes, SameSite}, handler_error::ConfigError, scope::parse_scopes};

/// Anything configuration values can be looked up from by name.
pub trait SecretSource {
  fn lookup(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
  fn lookup(&self, name: &str) -> Option<String> {
    env::var(name).ok()
  }
}

impl<S: BuildHasher> SecretSource for HashMap<String, String, S> {
  fn lookup(&self, name: &str) -> Option<String> {
    self.get(name).cloned()
  }
}

/// Where the gateway gets its `ClientConfig` from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
  /// Loaded once from the environment before the first request.
  Fixed(ClientConfig),
  /// Read from the origin custom headers of each request until a discovery
  /// with them succeeds, then kept for the lifetime of the process.
  OriginHeaders
}

/// OAuth client registration with the identity provider.
#[derive(Clone)]
pub struct ClientConfig {
  pub client_id: String,
  pub client_secret: String,
  /// public base url of the gateway, the callback lives at `{domain}/cb`
  pub domain: String,
  pub idp_metadata_url: Url,
  pub scopes: Vec<String>
}

// keeps client_secret out of logs
impl fmt::Debug for ClientConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClientConfig")
      .field("client_id", &self.client_id)
      .field("domain", &self.domain)
      .field("idp_metadata_url", &self.idp_metadata_url)
      .field("scopes", &self.scopes)
      .finish_non_exhaustive()
  }
}

impl ClientConfig {
  pub fn from_source(source: &impl SecretSource) -> Result<Self, ConfigError> {
    validate_secrets(source)?;

    let metadata_url = get_secret(source, Secret::IDP_METADATA_URL)?;
    let idp_metadata_url = Url::parse(&metadata_url)
      .map_err(|source| ConfigError::Url {
        name: Secret::IDP_METADATA_URL.id(),
        source
      })?;

    let scopes = match source.lookup(SCOPES) {
      Some(scopes) => parse_scopes(&scopes)?,
      None => vec!["openid".to_string()]
    };

    Ok(ClientConfig {
      client_id: get_secret(source, Secret::CLIENT_ID)?,
      client_secret: get_secret(source, Secret::CLIENT_SECRET)?,
      domain: get_secret(source, Secret::DOMAIN)?,
      idp_metadata_url,
      scopes
    })
  }

  /// The redirect uri registered with the provider
  pub fn redirect_uri(&self) -> String {
    format!(
      "{domain}{CALLBACK_PATH}",
      domain = self.domain.trim_end_matches('/')
    )
  }
}

/// How `/api` requests relate to provider discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiPolicy {
  /// `/api` is relayed before discovery, so an unavailable provider never
  /// blocks API traffic.
  #[default]
  BypassDiscovery,
  /// `/api` waits for discovery like every other route.
  AfterDiscovery
}

impl FromStr for ApiPolicy {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "bypass" => Ok(ApiPolicy::BypassDiscovery),
      "after-discovery" => Ok(ApiPolicy::AfterDiscovery),
      _ => Err(())
    }
  }
}

/// Which token from the provider's token response becomes the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionToken {
  #[default]
  AccessToken,
  IdToken
}

impl FromStr for SessionToken {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "access_token" => Ok(SessionToken::AccessToken),
      "id_token" => Ok(SessionToken::IdToken),
      _ => Err(())
    }
  }
}

/// Gateway behavior that does not depend on the client registration.
/// The defaults reproduce the plain flow: an `HttpOnly` only cookie, no
/// `state` parameter and metadata that is discovered once.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
  pub cookie: CookieAttributes,
  pub csrf_state: bool,
  pub metadata_ttl: Option<Duration>,
  pub api_policy: ApiPolicy,
  pub session_token: SessionToken,
  /// leeway in seconds for `exp` and `nbf`
  pub clock_skew: u64,
  pub http_timeout: StdDuration
}

impl Default for GatewayOptions {
  fn default() -> Self {
    GatewayOptions {
      cookie: CookieAttributes::default(),
      csrf_state: false,
      metadata_ttl: None,
      api_policy: ApiPolicy::default(),
      session_token: SessionToken::default(),
      clock_skew: 0,
      http_timeout: StdDuration::from_secs(10)
    }
  }
}

impl GatewayOptions {
  pub fn from_source(source: &impl SecretSource) -> Result<Self, ConfigError> {
    let defaults = GatewayOptions::default();

    Ok(GatewayOptions {
      cookie: CookieAttributes {
        secure: option(source, COOKIE_SECURE)?.unwrap_or(false),
        same_site: option::<SameSite>(source, COOKIE_SAME_SITE)?,
        max_age: option(source, COOKIE_MAX_AGE_SECS)?,
        path: source.lookup(COOKIE_PATH)
      },
      csrf_state: option(source, CSRF_STATE)?.unwrap_or(defaults.csrf_state),
      metadata_ttl: option::<u32>(source, METADATA_TTL_SECS)?
        .map(|secs| Duration::seconds(secs.into())),
      api_policy: option(source, API_POLICY)?.unwrap_or(defaults.api_policy),
      session_token: option(source, SESSION_TOKEN)?.unwrap_or(defaults.session_token),
      clock_skew: option(source, CLOCK_SKEW_SECS)?.unwrap_or(defaults.clock_skew),
      http_timeout: option(source, HTTP_TIMEOUT_SECS)?
        .map(StdDuration::from_secs)
        .unwrap_or(defaults.http_timeout)
    })
  }
}

/// Parse an optional setting, rejecting values that are present but invalid
fn option<T: FromStr>(
  source: &impl SecretSource,
  name: &'static str
) -> Result<Option<T>, ConfigError> {
  source.lookup(name)
    .map(|value| value.trim().parse::<T>()
      .map_err(|_| ConfigError::InvalidOption { name, value })
    )
    .transpose()
}
