use crate::{config::SecretSource, handler_error::ConfigError};

// ---------- SECRETS ----------

/// Adds all provided secret keys to the public `Secret` enum and
/// an array which is used for validating and looking up their values
macro_rules! secrets {
  (
    // number of secrets
    $count:expr,
    // comma delimited secret names (same as their values)
    $($name:ident),+
    // optional trailing comma
    $(,)?
  ) => {
    #[allow(non_camel_case_types)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Secret {
      // create an enum value for each secret
      $($name,)+
    }

    /// Array of all secrets, in declaration order.
    pub const SECRETS_ARRAY: [Secret; $count] = [$(Secret::$name,)+];

    impl Secret {
      /// Name the secret is stored under in the environment.
      pub const fn id(self) -> &'static str {
        match self {
          $(Secret::$name => stringify!($name),)+
        }
      }
    }
  };
}

// Implicitly creates the public `Secret` enum and `SECRETS_ARRAY`.
secrets!(
  4,
  CLIENT_ID,
  CLIENT_SECRET,
  DOMAIN,
  IDP_METADATA_URL
);

/// Collects every missing secret into a single error
pub fn validate_secrets(source: &impl SecretSource) -> Result<(), ConfigError> {
  let missing = SECRETS_ARRAY.iter()
    .map(|secret| secret.id())
    .filter(|id| source.lookup(id).is_none())
    .collect::<Vec<_>>();

  if missing.is_empty() {
    Ok(())
  } else {
    Err(ConfigError::MissingSecrets(missing))
  }
}

/// Get a required secret
pub fn get_secret(source: &impl SecretSource, id: Secret) -> Result<String, ConfigError> {
  source.lookup(id.id())
    .ok_or_else(|| ConfigError::MissingSecrets(vec![id.id()]))
}

// ---------- CONSTANTS ----------

/// force var name to be the same as its string value
macro_rules! constant {
  ($name:ident) => {
    pub const $name: &str = stringify!($name);
  }
}

// Optional gateway settings, looked up from the same source as the secrets

constant!(SCOPES);
constant!(COOKIE_SECURE);
constant!(COOKIE_SAME_SITE);
constant!(COOKIE_MAX_AGE_SECS);
constant!(COOKIE_PATH);
constant!(CSRF_STATE);
constant!(METADATA_TTL_SECS);
constant!(API_POLICY);
constant!(SESSION_TOKEN);
constant!(CLOCK_SKEW_SECS);
constant!(HTTP_TIMEOUT_SECS);

// ---------- ROUTES ----------

pub const LOGIN_PATH: &str = "/login";
pub const CALLBACK_PATH: &str = "/cb";
pub const API_PREFIX: &str = "/api";

// Source: https://openid.net/specs/openid-connect-discovery-1_0.html#ProviderConfig
pub const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

// ---------- COOKIES ----------

pub const SESSION_COOKIE: &str = "authorization";
pub const STATE_COOKIE: &str = "oidc_state";
/// seconds the login `state` stays valid
pub const STATE_COOKIE_MAX_AGE: u64 = 600;

// ---------- RESPONSE BODIES ----------

pub const METADATA_ERROR: &str = "Error fetch metadata IDP";
pub const CHALLENGE_ERROR: &str = "Challenge not valid";
pub const LOGIN_ERROR: &str = "Error starting login";
