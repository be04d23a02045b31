mod common;

use std::{sync::Arc, time::Duration};

use chrono::Duration as ChronoDuration;
use common::*;
use edge_oidc_gateway::{DiscoveryError, MetadataCache};
use futures::future::join_all;
use serde_json::json;
use url::Url;

fn metadata_url() -> Url {
  Url::parse("https://idp.example").unwrap()
}

#[tokio::test]
async fn test_ensure_ready_is_idempotent() {
  let provider = Arc::new(FakeProvider::default());
  let cache = MetadataCache::new(None, 0);
  assert!(!cache.is_ready());

  let first = cache.ensure_ready(&provider, &metadata_url()).await.unwrap();
  let second = cache.ensure_ready(&provider, &metadata_url()).await.unwrap();

  assert!(cache.is_ready());
  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(provider.discover_calls(), 1);
  assert_eq!(first.issuer.issuer().as_str(), "https://idp.example/");
}

#[tokio::test]
async fn test_signing_key_prefers_sig_use() {
  let mut encryption = jwk(OTHER_JWK);
  encryption["use"] = json!("enc");
  let provider = Arc::new(
    FakeProvider::default().with_jwks(json!({ "keys": [encryption, jwk(IDP_JWK)] }))
  );
  let cache = MetadataCache::new(None, 0);

  let metadata = cache.ensure_ready(&provider, &metadata_url()).await.unwrap();

  assert_eq!(metadata.signing_key.kid.as_deref(), Some("idp_rsa"));
  assert!(metadata.verifier.verify(&valid_token()).is_ok());
}

#[tokio::test]
async fn test_malformed_jwks_leaves_cache_empty() {
  let cases = [
    (json!({}), "missing"),
    (json!({ "keys": "nope" }), "missing"),
    (json!({ "keys": [] }), "empty"),
    (json!({ "keys": [{ "use": "sig" }] }), "key")
  ];

  for (jwks, kind) in cases {
    let provider = Arc::new(FakeProvider::default().with_jwks(jwks));
    let cache = MetadataCache::new(None, 0);

    let err = cache.ensure_ready(&provider, &metadata_url()).await.unwrap_err();
    match kind {
      "missing" => assert!(matches!(err, DiscoveryError::MissingKeys), "{err}"),
      "empty" => assert!(matches!(err, DiscoveryError::EmptyKeySet), "{err}"),
      _ => assert!(matches!(err, DiscoveryError::SigningKey(_)), "{err}")
    }
    assert!(!cache.is_ready());
  }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_discovery() {
  let provider = Arc::new(
    FakeProvider::default().with_discovery_delay(Duration::from_millis(50))
  );
  let cache = MetadataCache::new(None, 0);
  let url = metadata_url();

  let results = join_all(
    (0..8).map(|_| cache.ensure_ready(&provider, &url))
  ).await;

  assert_eq!(provider.discover_calls(), 1);
  let first = results[0].as_ref().unwrap();
  for result in &results {
    assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
  }
}

#[tokio::test]
async fn test_concurrent_callers_share_one_failure() {
  let provider = Arc::new(
    FakeProvider::default()
      .with_discovery_delay(Duration::from_millis(50))
      .failing()
  );
  let cache = MetadataCache::new(None, 0);
  let url = metadata_url();

  let results = join_all(
    (0..4).map(|_| cache.ensure_ready(&provider, &url))
  ).await;

  assert_eq!(provider.discover_calls(), 1);
  assert!(results.iter().all(|result| matches!(result, Err(DiscoveryError::Status { status: 503, .. }))));
  assert!(!cache.is_ready());
}

#[tokio::test]
async fn test_abandoned_discovery_still_completes() {
  let provider = Arc::new(
    FakeProvider::default().with_discovery_delay(Duration::from_millis(20))
  );
  let cache = MetadataCache::new(None, 0);

  let abandoned = tokio::time::timeout(
    Duration::from_millis(1),
    cache.ensure_ready(&provider, &metadata_url())
  ).await;
  assert!(abandoned.is_err());

  tokio::time::sleep(Duration::from_millis(100)).await;

  assert!(cache.is_ready());
  cache.ensure_ready(&provider, &metadata_url()).await.unwrap();
  assert_eq!(provider.discover_calls(), 1);
}

#[tokio::test]
async fn test_failed_discovery_is_retried() {
  let provider = Arc::new(FakeProvider::default().failing());
  let cache = MetadataCache::new(None, 0);

  assert!(cache.ensure_ready(&provider, &metadata_url()).await.is_err());
  assert!(cache.ensure_ready(&provider, &metadata_url()).await.is_err());
  assert_eq!(provider.discover_calls(), 2);

  provider.set_failing(false);
  cache.ensure_ready(&provider, &metadata_url()).await.unwrap();
  assert!(cache.is_ready());
  assert_eq!(provider.discover_calls(), 3);
}

#[tokio::test]
async fn test_stale_metadata_is_rediscovered() {
  let provider = Arc::new(FakeProvider::default());
  let cache = MetadataCache::new(Some(ChronoDuration::zero()), 0);

  let first = cache.ensure_ready(&provider, &metadata_url()).await.unwrap();
  assert!(!cache.is_ready());

  let second = cache.ensure_ready(&provider, &metadata_url()).await.unwrap();
  assert!(!Arc::ptr_eq(&first, &second));
  assert_eq!(provider.discover_calls(), 2);
}

#[tokio::test]
async fn test_fresh_metadata_is_kept() {
  let provider = Arc::new(FakeProvider::default());
  let cache = MetadataCache::new(Some(ChronoDuration::hours(1)), 0);

  cache.ensure_ready(&provider, &metadata_url()).await.unwrap();
  cache.ensure_ready(&provider, &metadata_url()).await.unwrap();

  assert!(cache.is_ready());
  assert_eq!(provider.discover_calls(), 1);
}

#[tokio::test]
async fn test_clock_skew_reaches_verifier() {
  let provider = Arc::new(FakeProvider::default());
  let cache = MetadataCache::new(None, 7200);

  let metadata = cache.ensure_ready(&provider, &metadata_url()).await.unwrap();

  // expired an hour ago, inside the two hour leeway
  assert!(metadata.verifier.verify(&expired_token()).is_ok());
}
