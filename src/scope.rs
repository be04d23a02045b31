use itertools::Itertools;

use crate::handler_error::ConfigError;

/// Parses the configured space delimited scope list. `openid` is required
/// for the provider to treat the request as an OpenID Connect login.
///
/// Adapted from https://github.com/HeroicKatora/oxide-auth/blob/019b7651e97a3ee2cde40b9806a1ecf37e051942/oxide-auth/src/primitives/scope.rs#L120
pub fn parse_scopes(scopes: &str) -> Result<Vec<String>, ConfigError> {
  let mut invalid = scopes.chars()
    .filter(|chr| invalid_scope_char(*chr))
    .peekable();

  if invalid.peek().is_some() {
    return Err(ConfigError::Scope(format!(
      r#"Encountered invalid character(s) in scope: "{}""#,
      invalid.join(r#"", ""#)
    )))
  }

  let scopes = scopes.split(' ')
    .filter(|s| !s.is_empty())
    .unique()
    .map(String::from)
    .collect::<Vec<_>>();

  // Source: https://openid.net/specs/openid-connect-core-1_0.html#AuthRequestValidation
  if !scopes.iter().any(|s| s == "openid") {
    return Err(ConfigError::Scope(
      r#"scope field must contain "openid""#.into()
    ))
  }

  Ok(scopes)
}

fn invalid_scope_char(ch: char) -> bool {
  match ch {
      '\x21' => false,
      ch if ('\x23'..='\x5b').contains(&ch) => false,
      ch if ('\x5d'..='\x7e').contains(&ch) => false,
      ' ' => false, // Space separator is a valid char
      _ => true,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_scopes_keeps_order() {
    assert_eq!(
      parse_scopes("openid email  profile").unwrap(),
      vec!["openid", "email", "profile"]
    );
  }

  #[test]
  fn test_parse_scopes_drops_duplicates() {
    assert_eq!(parse_scopes("openid openid").unwrap(), vec!["openid"]);
  }

  #[test]
  fn test_parse_scopes_requires_openid() {
    assert!(matches!(parse_scopes("email"), Err(ConfigError::Scope(_))));
  }

  #[test]
  fn test_parse_scopes_rejects_invalid_characters() {
    let err = parse_scopes("openid \"email\"").unwrap_err();
    assert!(err.to_string().contains("invalid character"));
  }
}
