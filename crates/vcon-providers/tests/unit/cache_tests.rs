//! Moka cache provider behavior.

use std::time::Duration;

use vcon_providers::cache::MokaCacheProvider;

use vcon_domain::ports::cache::{CacheEntryConfig, CacheProvider};
use vcon_domain::registry::cache::{CacheProviderConfig, resolve_cache_provider};

#[tokio::test]
async fn set_get_delete_round_trip() {
    let cache = MokaCacheProvider::new(100, Duration::from_secs(60));
    cache
        .set_json("vcon:a", r#"{"x":1}"#, CacheEntryConfig::default())
        .await
        .unwrap();
    assert_eq!(
        cache.get_json("vcon:a").await.unwrap().as_deref(),
        Some(r#"{"x":1}"#)
    );

    assert!(cache.delete("vcon:a").await.unwrap());
    assert_eq!(cache.get_json("vcon:a").await.unwrap(), None);
    assert!(!cache.delete("vcon:a").await.unwrap());
}

#[tokio::test]
async fn per_entry_ttl_expires() {
    let cache = MokaCacheProvider::new(100, Duration::from_secs(3600));
    cache
        .set_json(
            "vcon:short",
            "{}",
            CacheEntryConfig::with_ttl(Duration::from_millis(10)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(cache.get_json("vcon:short").await.unwrap(), None);
}

#[tokio::test]
async fn stats_count_hits_and_misses() {
    let cache = MokaCacheProvider::new(100, Duration::from_secs(60));
    cache
        .set_json("vcon:a", "{}", CacheEntryConfig::default())
        .await
        .unwrap();
    let _ = cache.get_json("vcon:a").await.unwrap();
    let _ = cache.get_json("vcon:missing").await.unwrap();

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn registry_resolves_moka_by_name() {
    let provider = resolve_cache_provider(&CacheProviderConfig {
        provider: "moka".to_owned(),
        uri: None,
        max_capacity: Some(10),
        ttl_secs: Some(60),
    })
    .unwrap();
    assert_eq!(provider.provider_name(), "moka");
}

#[test]
fn registry_rejects_unknown_names() {
    let err = resolve_cache_provider(&CacheProviderConfig {
        provider: "memcached".to_owned(),
        ..CacheProviderConfig::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("memcached"));
}
