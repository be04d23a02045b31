use crate::{cache::ProviderMetadata, consts::{LOGIN_PATH, SESSION_COOKIE}, cookie, handler_error::VerificationError, request::{GatewayOutcome, GatewayRequest, GatewayResponse}};

/// Let the request through untouched when it carries a valid session
/// cookie, otherwise send the browser to `/login`.
pub fn verify(metadata: &ProviderMetadata, request: GatewayRequest) -> GatewayOutcome {
  match verify_session(metadata, &request) {
    Ok(()) => GatewayOutcome::Forward(request),
    Err(VerificationError::MissingToken) => {
      tracing::debug!("no session, redirecting to login");
      GatewayOutcome::Respond(GatewayResponse::redirect(LOGIN_PATH))
    },
    Err(e) => {
      tracing::warn!(error = %e, "session not accepted");
      GatewayOutcome::Respond(GatewayResponse::redirect(LOGIN_PATH))
    }
  }
}

fn verify_session(
  metadata: &ProviderMetadata,
  request: &GatewayRequest
) -> Result<(), VerificationError> {
  let token = cookie::from_headers(&request.headers, SESSION_COOKIE)
    .ok_or(VerificationError::MissingToken)?;

  metadata.verifier.verify(&token)?;
  Ok(())
}
