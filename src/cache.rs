use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::{future::Shared, FutureExt};
use parking_lot::Mutex;
use url::Url;

use crate::{handler_error::DiscoveryError, jwks::{select_signing_key, SigningKey}, oidc::{IdentityProvider, IssuerConfig}, oidc_token::TokenVerifier, platform::BoxFuture};

/// Everything one discovery produced. Always replaced as a whole, so an
/// issuer is never paired with a key from another discovery.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
  pub issuer: IssuerConfig,
  pub signing_key: SigningKey,
  pub verifier: TokenVerifier,
  pub fetched_at: DateTime<Utc>
}

type DiscoveryResult = Result<Arc<ProviderMetadata>, DiscoveryError>;
type Discovery = Shared<BoxFuture<'static, DiscoveryResult>>;

#[derive(Default)]
enum Slot {
  #[default]
  Empty,
  /// a discovery is in flight, later callers await the same future
  Pending {
    generation: u64,
    discovery: Discovery
  },
  Ready(Arc<ProviderMetadata>)
}

#[derive(Default)]
struct CacheState {
  slot: Slot,
  /// bumped for every discovery so a stale attempt never overwrites the
  /// slot of a newer one
  generation: u64
}

/// Process-wide provider metadata, populated lazily by the first request
/// that needs it.
///
/// At most one discovery is in flight at a time. A failed discovery leaves
/// the cache empty so the next request retries. Without a TTL a populated
/// cache is never refreshed.
#[derive(Clone)]
pub struct MetadataCache {
  state: Arc<Mutex<CacheState>>,
  ttl: Option<Duration>,
  /// leeway handed to every verifier this cache builds
  clock_skew: u64
}

impl std::fmt::Debug for MetadataCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetadataCache")
      .field("ttl", &self.ttl)
      .field("ready", &self.is_ready())
      .finish_non_exhaustive()
  }
}

impl MetadataCache {
  pub fn new(ttl: Option<Duration>, clock_skew: u64) -> Self {
    MetadataCache {
      state: Arc::default(),
      ttl,
      clock_skew
    }
  }

  /// Populated and not older than the TTL
  pub fn is_ready(&self) -> bool {
    self.current().is_some()
  }

  /// The cached metadata, if it is usable
  pub fn current(&self) -> Option<Arc<ProviderMetadata>> {
    match &self.state.lock().slot {
      Slot::Ready(metadata) if !self.is_stale(metadata) => Some(metadata.clone()),
      _ => None
    }
  }

  /// Return the cached metadata, discovering it first when the cache is
  /// empty or stale. Concurrent callers share one discovery.
  pub async fn ensure_ready<P: IdentityProvider>(
    &self,
    provider: &Arc<P>,
    metadata_url: &Url
  ) -> Result<Arc<ProviderMetadata>, DiscoveryError> {
    let discovery = {
      let mut guard = self.state.lock();
      let state = &mut *guard;

      match &state.slot {
        Slot::Ready(metadata) if !self.is_stale(metadata) => return Ok(metadata.clone()),
        Slot::Pending { discovery, .. } => discovery.clone(),
        // empty, or stale and discarded
        _ => {
          state.generation += 1;
          let generation = state.generation;

          let discovery = self.start(generation, provider.clone(), metadata_url.clone());
          state.slot = Slot::Pending { generation, discovery: discovery.clone() };
          discovery
        }
      }
    };

    discovery.await
  }

  fn start<P: IdentityProvider>(
    &self,
    generation: u64,
    provider: Arc<P>,
    metadata_url: Url
  ) -> Discovery {
    let state = self.state.clone();
    let clock_skew = self.clock_skew;

    let future: BoxFuture<'static, DiscoveryResult> = Box::pin(async move {
      let result = discover(&*provider, &metadata_url, clock_skew)
        .await
        .map(Arc::new);

      let mut state = state.lock();
      // only the attempt that owns the slot may settle it
      if matches!(state.slot, Slot::Pending { generation: pending, .. } if pending == generation) {
        state.slot = match &result {
          Ok(metadata) => {
            tracing::info!(
              issuer = %metadata.issuer.issuer(),
              kid = metadata.signing_key.kid.as_deref(),
              "provider metadata discovered"
            );
            Slot::Ready(metadata.clone())
          },
          Err(e) => {
            tracing::error!(error = %e, "provider discovery failed");
            Slot::Empty
          }
        };
      }

      result
    });

    let discovery = future.shared();
    Self::detach(discovery.clone());
    discovery
  }

  /// Keep discovery running when every waiting request goes away. Without
  /// a runtime the pending future stays in the slot and the next caller
  /// resumes it.
  #[cfg(not(target_arch = "wasm32"))]
  fn detach(discovery: Discovery) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
      handle.spawn(discovery);
    }
  }

  #[cfg(target_arch = "wasm32")]
  fn detach(_: Discovery) {}

  fn is_stale(&self, metadata: &ProviderMetadata) -> bool {
    self.ttl.is_some_and(|ttl| Utc::now() - metadata.fetched_at >= ttl)
  }
}

/// Discovery document, then JWKS, then the signing key
async fn discover<P: IdentityProvider>(
  provider: &P,
  metadata_url: &Url,
  clock_skew: u64
) -> Result<ProviderMetadata, DiscoveryError> {
  let issuer = provider.discover(metadata_url).await?;
  let jwks = provider.fetch_jwks(issuer.jwks_uri()).await?;
  let signing_key = select_signing_key(&jwks)?;
  let verifier = TokenVerifier::new(&signing_key, clock_skew)?;

  Ok(ProviderMetadata {
    issuer,
    signing_key,
    verifier,
    fetched_at: Utc::now()
  })
}
