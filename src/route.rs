use crate::config::ApiPolicy;

/// The handler a request path is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// `/login`
  Login,
  /// `/cb`
  Callback,
  /// `/api/...`
  Api,
  /// everything else
  Verify
}

impl Route {
  /// Dispatch on the first non-empty path segment
  pub fn classify(path: &str) -> Self {
    match path.split('/').find(|segment| !segment.is_empty()) {
      Some("login") => Route::Login,
      Some("cb") => Route::Callback,
      Some("api") => Route::Api,
      _ => Route::Verify
    }
  }

  /// Whether provider metadata has to be ready before the handler runs.
  /// `/api` only relays the session cookie, so by default it never waits
  /// on the provider.
  pub fn needs_metadata(self, policy: ApiPolicy) -> bool {
    !matches!((self, policy), (Route::Api, ApiPolicy::BypassDiscovery))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_classify() {
    assert_eq!(Route::classify("/login"), Route::Login);
    assert_eq!(Route::classify("/cb"), Route::Callback);
    assert_eq!(Route::classify("/api/route"), Route::Api);
    assert_eq!(Route::classify("/"), Route::Verify);
    assert_eq!(Route::classify(""), Route::Verify);
    assert_eq!(Route::classify("/index.html"), Route::Verify);
  }

  #[test]
  fn test_classify_uses_first_non_empty_segment() {
    assert_eq!(Route::classify("//login"), Route::Login);
    assert_eq!(Route::classify("/login/extra"), Route::Login);
    assert_eq!(Route::classify("/static/login"), Route::Verify);
    assert_eq!(Route::classify("/apis"), Route::Verify);
  }

  #[test]
  fn test_needs_metadata() {
    assert!(!Route::Api.needs_metadata(ApiPolicy::BypassDiscovery));
    assert!(Route::Api.needs_metadata(ApiPolicy::AfterDiscovery));
    assert!(Route::Login.needs_metadata(ApiPolicy::BypassDiscovery));
    assert!(Route::Callback.needs_metadata(ApiPolicy::BypassDiscovery));
    assert!(Route::Verify.needs_metadata(ApiPolicy::BypassDiscovery));
  }
}
