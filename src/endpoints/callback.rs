use openidconnect::AuthorizationCode;
use serde::Deserialize;

use crate::{cache::ProviderMetadata, config::{ClientConfig, GatewayOptions, SessionToken}, consts::{CHALLENGE_ERROR, SESSION_COOKIE, STATE_COOKIE}, cookie, handler_error::ExchangeError, oidc::IdentityProvider, request::{GatewayRequest, GatewayResponse}};

use super::{callback_error::ErrorParams, login::state_cookie_attributes};

// Source: https://www.rfc-editor.org/rfc/rfc6749.html#section-4.1.2
#[derive(Deserialize)]
#[serde(untagged)]
pub enum CallbackEnum {
  Callback{
    code: AuthorizationCode
  },
  Error(ErrorParams)
}
#[derive(Deserialize)]
pub struct CallbackParams {
  #[serde(flatten)]
  params: CallbackEnum,
  // only checked when the login sent one
  state: Option<String>,
}

impl CallbackParams {
  fn from_query(query: &str) -> Result<Self, ExchangeError> {
    serde_urlencoded::from_str(query.trim_start_matches('?'))
      .map_err(|_| ExchangeError::MissingParams)
  }
}

/// The provider redirected the browser back to `/cb`. Trade the code for a
/// token and hand it to the browser as the session cookie.
///
/// Every failure is the same `401`, the reason only reaches the logs.
pub async fn callback<P: IdentityProvider>(
  provider: &P,
  metadata: &ProviderMetadata,
  client: &ClientConfig,
  options: &GatewayOptions,
  request: &GatewayRequest
) -> GatewayResponse {
  match callback_result(provider, metadata, client, options, request).await {
    Ok(ok) => ok,
    Err(e) => {
      tracing::warn!(error = %e, "callback rejected");
      GatewayResponse::text(401, CHALLENGE_ERROR)
    }
  }
}

async fn callback_result<P: IdentityProvider>(
  provider: &P,
  metadata: &ProviderMetadata,
  client: &ClientConfig,
  options: &GatewayOptions,
  request: &GatewayRequest
) -> Result<GatewayResponse, ExchangeError> {
  let CallbackParams { params, state } = CallbackParams::from_query(&request.query)?;

  let code = match params {
    CallbackEnum::Callback { code } => code,
    CallbackEnum::Error(params) => return Err(ExchangeError::Provider(params))
  };

  if options.csrf_state {
    let expected = cookie::from_headers(&request.headers, STATE_COOKIE);

    // both must be present, a missing pair is not a match
    if expected.is_none() || expected != state {
      return Err(ExchangeError::StateMismatch)
    }
  }

  let tokens = provider.exchange_code(&metadata.issuer, client, code).await?;

  let session = match options.session_token {
    SessionToken::AccessToken => tokens.access_token,
    SessionToken::IdToken => tokens.id_token.ok_or(ExchangeError::MissingIdToken)?
  };

  let mut response = GatewayResponse::redirect("/")
    .with_header("Set-Cookie", cookie::serialize(SESSION_COOKIE, &session, &options.cookie));

  if options.csrf_state {
    response = response.with_header(
      "Set-Cookie",
      cookie::expired(STATE_COOKIE, &state_cookie_attributes(&options.cookie))
    );
  }

  tracing::debug!("session established");
  Ok(response)
}
