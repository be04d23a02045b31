use crate::{config::{ClientConfig, GatewayOptions}, consts::{LOGIN_ERROR, STATE_COOKIE, STATE_COOKIE_MAX_AGE}, cookie::{self, CookieAttributes}, oidc::{authorization_url, IssuerConfig}, oidc_token::new_token, request::GatewayResponse};

/// Redirect the browser to the provider's authorization endpoint.
///
/// With `CSRF_STATE` enabled a random `state` is sent along and remembered
/// in a short lived cookie for the callback to compare against.
pub fn login(
  issuer: &IssuerConfig,
  client: &ClientConfig,
  options: &GatewayOptions
) -> GatewayResponse {
  if !options.csrf_state {
    return GatewayResponse::redirect(authorization_url(issuer, client, None).as_str())
  }

  // 16 bytes = 1/10^38 guess chance, only valid for 10 minutes
  let state = match new_token::<16>() {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "no randomness for login state");
      return GatewayResponse::text(500, LOGIN_ERROR)
    }
  };

  GatewayResponse::redirect(authorization_url(issuer, client, Some(&state)).as_str())
    .with_header("Set-Cookie", cookie::serialize(
      STATE_COOKIE,
      &state,
      &state_cookie_attributes(&options.cookie)
    ))
}

/// The state cookie follows the session cookie's `Secure` and `Path` but
/// always expires with the login attempt. `Lax` lets it ride along on the
/// provider's top level redirect back to `/cb`.
pub(crate) fn state_cookie_attributes(session: &CookieAttributes) -> CookieAttributes {
  CookieAttributes {
    secure: session.secure,
    same_site: Some(cookie::SameSite::Lax),
    max_age: Some(STATE_COOKIE_MAX_AGE),
    path: Some(session.path.clone().unwrap_or_else(|| "/".to_string()))
  }
}
