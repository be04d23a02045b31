use core::fmt;
use std::{borrow::Cow, fmt::{Display, Formatter}};

use openidconnect::core::CoreAuthErrorResponseType;
use serde::{Deserialize, Serialize};

/// Error the provider redirected back with instead of a code.
///
/// Sources:
///   https://www.rfc-editor.org/rfc/rfc6749.html#section-4.1.2.1
///   https://openid.net/specs/openid-connect-core-1_0.html#AuthError
#[derive(Serialize, Deserialize, thiserror::Error, Debug, Clone, PartialEq)]
pub struct ErrorParams {
  // `Extension` keeps non-standard error codes
  pub error: CoreAuthErrorResponseType,
  pub error_description: Option<Cow<'static, str>>,
  pub error_uri: Option<String>
}

impl Display for ErrorParams {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "error: {e}{opt}",
      e = self.error.as_ref(),
      opt = if let Some(desc) = &self.error_description {
        format!(", error_description: {desc}")
      } else {
        "".into()
      }
    )
  }
}
